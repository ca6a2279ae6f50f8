//! Binance ticker source.
//!
//! API: `https://api.binance.com/api/v3/ticker/price?symbol=SUIUSDT`
//! The price comes back as a decimal string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{checked_price, PriceSource};

const NAME: &str = "Binance";

/// `{"symbol":"SUIUSDT","price":"3.25000000"}`
#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    price: Option<String>,
}

pub struct BinanceSource {
    http: Client,
    url: String,
}

impl BinanceSource {
    pub fn new(http: Client, url: &str) -> Self {
        Self { http, url: url.to_string() }
    }

    fn extract_price(body: &TickerResponse) -> Result<f64> {
        let raw = body.price.as_deref().context("Binance response missing price")?;
        let price: f64 = raw.trim().parse()
            .with_context(|| format!("Binance price is not a number: {raw}"))?;
        checked_price(NAME, price)
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_price(&self) -> Result<f64> {
        let resp = self.http.get(&self.url).send().await
            .context("Binance request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Binance API error: {status}");
        }

        let body: TickerResponse = resp.json().await
            .context("Failed to parse Binance response")?;
        Self::extract_price(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price() {
        let body: TickerResponse =
            serde_json::from_str(r#"{"symbol":"SUIUSDT","price":"3.41230000"}"#).unwrap();
        assert_eq!(BinanceSource::extract_price(&body).unwrap(), 3.4123);
    }

    #[test]
    fn test_malformed_price() {
        let body: TickerResponse = serde_json::from_str(r#"{"price":"n/a"}"#).unwrap();
        assert!(BinanceSource::extract_price(&body).is_err());
        let body: TickerResponse = serde_json::from_str(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap();
        assert!(BinanceSource::extract_price(&body).is_err());
    }
}
