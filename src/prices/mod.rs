//! Price feeds.
//!
//! Defines the `PriceSource` trait implemented by each external ticker,
//! the `PriceAggregator` that consults them in priority order, and the
//! `PriceFeed` abstraction the monitor polls.

pub mod binance;
pub mod coingecko;
pub mod kraken;
pub mod monitor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PriceFeedConfig;
use crate::types::{PriceSample, CACHED_SOURCE};

pub use binance::BinanceSource;
pub use coingecko::CoinGeckoSource;
pub use kraken::KrakenSource;
pub use monitor::PriceMonitor;

/// A single external ticker for the base asset's USD price.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source label recorded on samples.
    fn name(&self) -> &'static str;

    /// Fetch the current price. Any failure (timeout, non-2xx, malformed
    /// body, non-positive price) is an error.
    async fn fetch_price(&self) -> Result<f64>;
}

/// What the monitor polls. The aggregator never fails, but other feeds may.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Produce the best available sample; `last_known` is returned as a
    /// cached sample when nothing fresher can be obtained.
    async fn latest(&self, last_known: f64) -> Result<PriceSample>;
}

/// Build the HTTP client shared by the sources.
pub fn http_client(config: &PriceFeedConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .context("Failed to build price feed HTTP client")
}

/// Reject prices that can't be used downstream.
pub(crate) fn checked_price(source: &str, price: f64) -> Result<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        anyhow::bail!("{source} returned unusable price {price}")
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Ranked list of price sources; first success wins, no merging.
pub struct PriceAggregator {
    sources: Vec<Box<dyn PriceSource>>,
}

impl PriceAggregator {
    pub fn new(sources: Vec<Box<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    /// CoinGecko, then Binance, then Kraken.
    pub fn from_config(config: &PriceFeedConfig) -> Result<Self> {
        let http = http_client(config)?;
        Ok(Self::new(vec![
            Box::new(CoinGeckoSource::new(http.clone(), &config.coingecko_url)),
            Box::new(BinanceSource::new(http.clone(), &config.binance_url)),
            Box::new(KrakenSource::new(http, &config.kraken_url, &config.kraken_pair)),
        ]))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Query sources in order. Never fails: on exhaustion returns
    /// `last_known` tagged as cached.
    pub async fn fetch(&self, last_known: f64) -> PriceSample {
        for source in &self.sources {
            match source.fetch_price().await {
                Ok(price) => {
                    debug!(source = source.name(), price, "Price fetched");
                    return PriceSample::new(price, source.name());
                }
                Err(e) => warn!(source = source.name(), error = %e, "Price source failed"),
            }
        }
        debug!(price = last_known, "All price sources failed, using cached price");
        PriceSample::new(last_known, CACHED_SOURCE)
    }
}

#[async_trait]
impl PriceFeed for PriceAggregator {
    async fn latest(&self, last_known: f64) -> Result<PriceSample> {
        Ok(self.fetch(last_known).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted source that counts how often it's called.
    struct ScriptedSource {
        name: &'static str,
        price: Option<f64>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_price(&self) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.price {
                Some(p) => checked_price(self.name, p),
                None => anyhow::bail!("{} timed out", self.name),
            }
        }
    }

    fn source(name: &'static str, price: Option<f64>) -> (Box<dyn PriceSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(ScriptedSource { name, price, calls: calls.clone() }), calls)
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (a, a_calls) = source("A", Some(3.10));
        let (b, b_calls) = source("B", Some(3.50));
        let agg = PriceAggregator::new(vec![a, b]);

        let sample = agg.fetch(1.0).await;
        assert_eq!(sample.price, 3.10);
        assert_eq!(sample.source, "A");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0, "later sources must not be consulted");
    }

    #[tokio::test]
    async fn test_falls_through_failures() {
        let (a, _) = source("A", None);
        let (b, _) = source("B", Some(0.0)); // non-positive counts as failure
        let (c, _) = source("C", Some(2.75));
        let agg = PriceAggregator::new(vec![a, b, c]);

        let sample = agg.fetch(1.0).await;
        assert_eq!(sample.price, 2.75);
        assert_eq!(sample.source, "C");
    }

    #[tokio::test]
    async fn test_exhaustion_returns_cached() {
        let (a, _) = source("A", None);
        let (b, _) = source("B", Some(f64::NAN));
        let agg = PriceAggregator::new(vec![a, b]);

        let sample = agg.latest(3.25).await.unwrap();
        assert_eq!(sample.price, 3.25);
        assert_eq!(sample.source, CACHED_SOURCE);
    }

    #[tokio::test]
    async fn test_empty_aggregator_returns_cached() {
        let agg = PriceAggregator::new(Vec::new());
        let sample = agg.fetch(4.0).await;
        assert_eq!(sample.source, CACHED_SOURCE);
    }

    #[test]
    fn test_default_source_order() {
        let agg = PriceAggregator::from_config(&PriceFeedConfig::default()).unwrap();
        assert_eq!(agg.source_names(), vec!["CoinGecko", "Binance", "Kraken"]);
    }

    #[test]
    fn test_checked_price() {
        assert!(checked_price("X", 1.0).is_ok());
        assert!(checked_price("X", 0.0).is_err());
        assert!(checked_price("X", -2.0).is_err());
        assert!(checked_price("X", f64::INFINITY).is_err());
    }
}
