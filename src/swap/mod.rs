//! Swap engine.
//!
//! `SwapEngine` ties quoting, transaction construction, and execution
//! together for the single configured pool. Callers speak in coin types
//! and smallest-unit amounts.

pub mod builder;
pub mod executor;
pub mod quote;

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::prices::PriceMonitor;
use crate::sui::types::{same_coin_type, SUI_COIN_TYPE};
use crate::sui::{LedgerClient, ObjectInfo};
use crate::types::{MomentumError, Quote, TradingPair};

pub use builder::{InputCoin, SwapTransactionBuilder};
pub use executor::{SwapExecutor, SwapOutcome};
pub use quote::QuoteEngine;

pub struct SwapEngine {
    ledger: Arc<dyn LedgerClient>,
    pair: TradingPair,
    quotes: QuoteEngine,
    builder: SwapTransactionBuilder,
    executor: SwapExecutor,
    swap_count: AtomicU64,
}

impl SwapEngine {
    pub fn new(
        config: &AppConfig,
        ledger: Arc<dyn LedgerClient>,
        monitor: Option<Arc<PriceMonitor>>,
    ) -> Result<Self> {
        let pair = config.pool.pair();
        let builder = SwapTransactionBuilder::from_config(&config.pool)
            .context("Invalid pool configuration")?;
        let quotes = QuoteEngine::new(pair.clone(), config.quote.clone(), config.slippage.clone(), monitor);
        let executor = SwapExecutor::new(
            Arc::clone(&ledger),
            pair.clone(),
            config.swap.gas_budget,
            config.swap.dry_run,
        );
        Ok(Self {
            ledger,
            pair,
            quotes,
            builder,
            executor,
            swap_count: AtomicU64::new(0),
        })
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn swap_count(&self) -> u64 {
        self.swap_count.load(Ordering::Relaxed)
    }

    pub fn get_quote(&self, from: &str, to: &str, amount_in: u64) -> Option<Quote> {
        self.quotes.get_quote(from, to, amount_in)
    }

    pub fn calculate_min_amount_out(&self, amount_out: u64, custom_slippage: Option<f64>) -> u64 {
        self.quotes.calculate_min_amount_out(amount_out, custom_slippage)
    }

    /// Build and submit one leg. Errors only if the pair is unsupported,
    /// the input coins can't be gathered, or submission fails.
    pub async fn execute_swap(
        &self,
        from: &str,
        to: &str,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<SwapOutcome> {
        let direction = self.pair.direction(from, to).ok_or_else(|| MomentumError::UnsupportedPair {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        let n = self.swap_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(swap = n, label = %self.pair.label(direction), amount_in, min_amount_out, "Executing swap");

        let input_asset = self.pair.input(direction);
        let input = if same_coin_type(&input_asset.coin_type, SUI_COIN_TYPE) {
            InputCoin::Gas
        } else {
            let coins = self.ledger.get_coins(&input_asset.coin_type).await?;
            if coins.is_empty() {
                return Err(MomentumError::NoCoins(input_asset.symbol.clone()).into());
            }
            let refs = coins
                .iter()
                .map(|c| c.object_ref())
                .collect::<Result<Vec<_>, _>>()?;
            InputCoin::Coins(refs)
        };

        let tx = self.builder.build(direction, amount_in, input, self.ledger.address())?;
        self.executor.execute(tx, direction, amount_in, min_amount_out).await
    }

    /// Fetch the pool object for a startup sanity log. Failures are logged
    /// and swallowed.
    pub async fn pool_info(&self) -> Option<ObjectInfo> {
        let pool_id = self.builder.pool_id();
        match self.ledger.get_object(pool_id).await {
            Ok(info) => {
                info!(
                    pool = %pool_id,
                    pool_type = info.object_type.as_deref().unwrap_or("unknown"),
                    version = %info.version,
                    "Pool info"
                );
                Some(info)
            }
            Err(e) => {
                warn!(pool = %pool_id, error = %e, "Pool lookup failed");
                None
            }
        }
    }
}
