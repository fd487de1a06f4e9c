use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// A single spot-price source
#[async_trait]
pub trait PriceTracker: Send + Sync {
    fn symbol(&self) -> &str;

    /// Latest traded price. Zero is an invalid response and must be an error.
    async fn fetch_price(&self) -> Result<Decimal>;
}
