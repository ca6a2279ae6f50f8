//! Console reporting: wallet portfolio and end-of-run statistics.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::sui::{LedgerClient, SuiAddress};
use crate::types::{Asset, CycleState, TradingPair};

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Holding {
    pub asset: Asset,
    /// Smallest units.
    pub balance: u64,
    pub value_usd: f64,
}

impl Holding {
    pub fn display_amount(&self) -> f64 {
        self.asset.to_display(self.balance)
    }
}

/// Wallet holdings of the pair valued at the current base price.
/// The quote asset is treated as a USD stablecoin.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub address: SuiAddress,
    pub base: Holding,
    pub quote: Holding,
    pub base_price: f64,
    pub taken_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn new(address: SuiAddress, pair: &TradingPair, base_balance: u64, quote_balance: u64, base_price: f64) -> Self {
        let base_value = pair.base.to_display(base_balance) * base_price;
        let quote_value = pair.quote.to_display(quote_balance);
        Self {
            address,
            base: Holding { asset: pair.base.clone(), balance: base_balance, value_usd: base_value },
            quote: Holding { asset: pair.quote.clone(), balance: quote_balance, value_usd: quote_value },
            base_price,
            taken_at: Utc::now(),
        }
    }

    /// Read both balances from the ledger.
    pub async fn capture(ledger: &dyn LedgerClient, pair: &TradingPair, base_price: f64) -> Self {
        let base = ledger.get_balance(&pair.base.coin_type).await;
        let quote = ledger.get_balance(&pair.quote.coin_type).await;
        Self::new(ledger.address(), pair, base, quote, base_price)
    }

    pub fn total_usd(&self) -> f64 {
        self.base.value_usd + self.quote.value_usd
    }
}

impl fmt::Display for PortfolioSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Portfolio Status")?;
        writeln!(f, "  Address: {}", self.address)?;
        writeln!(
            f,
            "  {}: {:.4} (${:.2} @ ${:.4})",
            self.base.asset, self.base.display_amount(), self.base.value_usd, self.base_price
        )?;
        writeln!(
            f,
            "  {}: {:.6} (${:.2})",
            self.quote.asset, self.quote.display_amount(), self.quote.value_usd
        )?;
        write!(f, "  Total Value: ${:.2}", self.total_usd())
    }
}

// ---------------------------------------------------------------------------
// Final statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FinalStatistics {
    pub duration_secs: f64,
    pub cycles: u32,
    pub target_cycles: u32,
    pub successful_swaps: u64,
    pub failed_swaps: u64,
    pub volume_usd: f64,
}

impl FinalStatistics {
    pub fn from_state(state: &CycleState, now: DateTime<Utc>) -> Self {
        let elapsed = now.signed_duration_since(state.started_at);
        Self {
            duration_secs: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
            cycles: state.current_cycle,
            target_cycles: state.target_cycles,
            successful_swaps: state.successful_swaps,
            failed_swaps: state.failed_swaps,
            volume_usd: state.volume_usd,
        }
    }
}

impl fmt::Display for FinalStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FINAL STATISTICS")?;
        writeln!(f, "  Total Duration: {:.2} seconds", self.duration_secs)?;
        writeln!(f, "  Total Swap Cycles: {}/{}", self.cycles, self.target_cycles)?;
        writeln!(f, "  Successful Swaps: {}", self.successful_swaps)?;
        writeln!(f, "  Failed Swaps: {}", self.failed_swaps)?;
        write!(f, "  Volume: ${:.2}", self.volume_usd)
    }
}
