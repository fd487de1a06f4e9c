use crate::config::MarketConfig;
use crate::core::market::PriceTracker;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Both exchanges answer with at least `{"last": "<decimal>"}`
#[derive(Deserialize, Debug)]
struct TickerResponse {
    last: Decimal,
}

/// Spot ticker over HTTP
pub struct HttpTicker {
    symbol: String,
    url: String,
    http: Client,
}

impl HttpTicker {
    pub fn new(symbol: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build ticker HTTP client")?;
        Ok(Self {
            symbol: symbol.into(),
            url: url.into(),
            http,
        })
    }

    /// NAS/USDT from the OKEx spot ticker
    pub fn nas(cfg: &MarketConfig) -> Result<Self> {
        Self::new("NAS", &cfg.nas_ticker_url, Duration::from_secs(cfg.timeout_secs))
    }

    /// NAX/USDT from the Gate ticker
    pub fn nax(cfg: &MarketConfig) -> Result<Self> {
        Self::new("NAX", &cfg.nax_ticker_url, Duration::from_secs(cfg.timeout_secs))
    }
}

pub(crate) fn parse_ticker(body: &str) -> Result<Decimal> {
    let ticker: TickerResponse =
        serde_json::from_str(body).context("Failed to decode ticker response")?;
    if ticker.last.is_zero() {
        bail!("Invalid ticker response: zero price");
    }
    Ok(ticker.last)
}

#[async_trait]
impl PriceTracker for HttpTicker {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn fetch_price(&self) -> Result<Decimal> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("{} ticker request failed", self.symbol))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("{} ticker returned bad status code: {}", self.symbol, status);
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read {} ticker body", self.symbol))?;
        parse_ticker(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_string_and_number_prices() {
        let okex = r#"{"instrument_id":"NAS-USDT","last":"0.3412","best_bid":"0.34"}"#;
        assert_eq!(parse_ticker(okex).unwrap(), dec!(0.3412));

        let gate = r#"{"result":"true","last":0.0156}"#;
        assert_eq!(parse_ticker(gate).unwrap(), dec!(0.0156));
    }

    #[test]
    fn zero_or_missing_price_is_invalid() {
        assert!(parse_ticker(r#"{"last":"0"}"#).is_err());
        assert!(parse_ticker(r#"{"high":"1"}"#).is_err());
    }
}
