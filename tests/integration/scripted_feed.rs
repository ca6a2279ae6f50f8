//! Deterministic price feed for driving the monitor.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use momentum::prices::PriceFeed;
use momentum::types::PriceSample;

/// Replays a fixed price path, one price per poll. Polls past the end
/// of the path fail, as an unreachable feed would.
pub struct ScriptedFeed {
    prices: Mutex<VecDeque<f64>>,
}

impl ScriptedFeed {
    pub fn new(prices: &[f64]) -> Self {
        Self { prices: Mutex::new(prices.iter().copied().collect()) }
    }

    pub fn remaining(&self) -> usize {
        self.prices.lock().len()
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn latest(&self, _last_known: f64) -> Result<PriceSample> {
        let price = self.prices.lock().pop_front().ok_or_else(|| anyhow!("script exhausted"))?;
        Ok(PriceSample::new(price, "Scripted"))
    }
}
