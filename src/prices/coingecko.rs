//! CoinGecko simple-price source (highest priority).
//!
//! API: `https://api.coingecko.com/api/v3/simple/price?ids=sui&vs_currencies=usd`
//! Auth: None for the public tier. Rate limits are tight, hence the fallthrough.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{checked_price, PriceSource};

const NAME: &str = "CoinGecko";

/// `{"sui": {"usd": 3.25}}`
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    #[serde(default)]
    sui: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    #[serde(default)]
    usd: Option<f64>,
}

pub struct CoinGeckoSource {
    http: Client,
    url: String,
}

impl CoinGeckoSource {
    pub fn new(http: Client, url: &str) -> Self {
        Self { http, url: url.to_string() }
    }

    fn extract_price(body: &SimplePriceResponse) -> Result<f64> {
        let price = body
            .sui
            .as_ref()
            .and_then(|q| q.usd)
            .context("CoinGecko response missing sui.usd")?;
        checked_price(NAME, price)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_price(&self) -> Result<f64> {
        let resp = self.http.get(&self.url).send().await
            .context("CoinGecko request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("CoinGecko API error: {status}");
        }

        let body: SimplePriceResponse = resp.json().await
            .context("Failed to parse CoinGecko response")?;
        Self::extract_price(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price() {
        let body: SimplePriceResponse = serde_json::from_str(r#"{"sui":{"usd":3.25}}"#).unwrap();
        assert_eq!(CoinGeckoSource::extract_price(&body).unwrap(), 3.25);
    }

    #[test]
    fn test_missing_field() {
        let body: SimplePriceResponse = serde_json::from_str(r#"{"bitcoin":{"usd":60000}}"#).unwrap();
        assert!(CoinGeckoSource::extract_price(&body).is_err());
        let body: SimplePriceResponse = serde_json::from_str(r#"{"sui":{}}"#).unwrap();
        assert!(CoinGeckoSource::extract_price(&body).is_err());
    }

    #[test]
    fn test_zero_price_rejected() {
        let body: SimplePriceResponse = serde_json::from_str(r#"{"sui":{"usd":0}}"#).unwrap();
        assert!(CoinGeckoSource::extract_price(&body).is_err());
    }
}
