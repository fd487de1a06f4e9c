use crate::core::market::PriceTracker;
use crate::utils::retry::{RetryConfig, retry_async};
use anyhow::Result;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Last good price of one tracker, refreshed in the background
pub struct PriceFeed {
    tracker: Arc<dyn PriceTracker>,
    price: RwLock<Decimal>,
    refresh_interval: Duration,
}

impl PriceFeed {
    /// Block until the tracker answers once, retrying every `startup_retry`.
    pub async fn bootstrap(
        tracker: Arc<dyn PriceTracker>,
        startup_retry: Duration,
        refresh_interval: Duration,
    ) -> Result<Arc<Self>> {
        let label = format!("{} price bootstrap", tracker.symbol());
        let price = retry_async(
            &label,
            || tracker.fetch_price(),
            RetryConfig::forever(startup_retry),
        )
        .await?;
        info!(symbol = tracker.symbol(), %price, "💱 Initial price loaded");

        Ok(Arc::new(Self {
            tracker,
            price: RwLock::new(price),
            refresh_interval,
        }))
    }

    pub fn symbol(&self) -> &str {
        self.tracker.symbol()
    }

    pub fn price(&self) -> Decimal {
        *self.price.read()
    }

    /// Fetch once. A failure leaves the cached price untouched.
    pub async fn refresh(&self) -> Result<Decimal> {
        let price = self.tracker.fetch_price().await?;
        *self.price.write() = price;
        Ok(price)
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(symbol = self.symbol(), "Price feed shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.refresh_interval) => {}
            }

            match self.refresh().await {
                Ok(price) => debug!(symbol = self.symbol(), %price, "Price refreshed"),
                Err(e) => warn!(
                    symbol = self.symbol(),
                    kept = %self.price(),
                    "⚠️ Price refresh failed: {:#}",
                    e
                ),
            }
        }
    }
}
