//! Kraken public ticker source (lowest priority).
//!
//! API: `https://api.kraken.com/0/public/Ticker?pair=SUIUSD`
//! The last trade price is `result.<PAIR>.c[0]`, as a string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{checked_price, PriceSource};

const NAME: &str = "Kraken";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, TickerInfo>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    /// Last trade closed: [price, lot volume].
    #[serde(default)]
    c: Vec<String>,
}

pub struct KrakenSource {
    http: Client,
    url: String,
    pair: String,
}

impl KrakenSource {
    pub fn new(http: Client, url: &str, pair: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            pair: pair.to_string(),
        }
    }

    fn extract_price(body: &TickerResponse, pair: &str) -> Result<f64> {
        if !body.error.is_empty() {
            anyhow::bail!("Kraken API error: {}", body.error.join(", "));
        }
        let raw = body
            .result
            .get(pair)
            .and_then(|t| t.c.first())
            .with_context(|| format!("Kraken response missing result.{pair}.c[0]"))?;
        let price: f64 = raw.trim().parse()
            .with_context(|| format!("Kraken price is not a number: {raw}"))?;
        checked_price(NAME, price)
    }
}

#[async_trait]
impl PriceSource for KrakenSource {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_price(&self) -> Result<f64> {
        let resp = self.http.get(&self.url).send().await
            .context("Kraken request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Kraken API error: {status}");
        }

        let body: TickerResponse = resp.json().await
            .context("Failed to parse Kraken response")?;
        Self::extract_price(&body, &self.pair)
    }
}
