//! Shared types for the MOMENTUM agent.
//!
//! These types form the data model used across all modules.
//! They are kept free of I/O so that the price, swap, and engine
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Assets & pair
// ---------------------------------------------------------------------------

/// A coin on the ledger, identified by its fully-qualified Move type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Display symbol, e.g. "SUI".
    pub symbol: String,
    /// Move coin type, e.g. `0x2::sui::SUI`.
    pub coin_type: String,
    /// Number of decimals in the smallest unit.
    pub decimals: u32,
}

impl Asset {
    pub fn new(symbol: &str, coin_type: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            coin_type: coin_type.to_string(),
            decimals,
        }
    }

    /// 10^decimals as a float, for display conversion.
    pub fn unit(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }

    /// 10^decimals as an exact decimal.
    pub fn unit_decimal(&self) -> Decimal {
        Decimal::from(10u64.pow(self.decimals))
    }

    /// Convert a smallest-unit amount to a human-readable float.
    pub fn to_display(&self, amount: u64) -> f64 {
        amount as f64 / self.unit()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// The single fixed pool pair. `base` is the pool's X type (SUI, priced in
/// USD by the monitor), `quote` is the Y type (USDC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: Asset,
    pub quote: Asset,
}

impl TradingPair {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// Resolve a (from, to) coin-type pair into a direction.
    /// Returns `None` for anything other than the two supported directions.
    pub fn direction(&self, from: &str, to: &str) -> Option<SwapDirection> {
        if from == self.base.coin_type && to == self.quote.coin_type {
            Some(SwapDirection::BaseToQuote)
        } else if from == self.quote.coin_type && to == self.base.coin_type {
            Some(SwapDirection::QuoteToBase)
        } else {
            None
        }
    }

    /// The asset spent in a given direction.
    pub fn input(&self, direction: SwapDirection) -> &Asset {
        match direction {
            SwapDirection::BaseToQuote => &self.base,
            SwapDirection::QuoteToBase => &self.quote,
        }
    }

    /// The asset received in a given direction.
    pub fn output(&self, direction: SwapDirection) -> &Asset {
        match direction {
            SwapDirection::BaseToQuote => &self.quote,
            SwapDirection::QuoteToBase => &self.base,
        }
    }

    /// Human-readable label such as "SUI→USDC".
    pub fn label(&self, direction: SwapDirection) -> String {
        format!("{}→{}", self.input(direction), self.output(direction))
    }
}

/// Swap direction within the fixed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    /// X → Y (SUI → USDC).
    BaseToQuote,
    /// Y → X (USDC → SUI).
    QuoteToBase,
}

impl SwapDirection {
    /// The pool's `a2b` flag.
    pub fn is_x_to_y(&self) -> bool {
        matches!(self, SwapDirection::BaseToQuote)
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::BaseToQuote => write!(f, "base→quote"),
            SwapDirection::QuoteToBase => write!(f, "quote→base"),
        }
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Source label used when every live feed failed.
pub const CACHED_SOURCE: &str = "Cached";

/// Source label of the seed price before the first poll.
pub const DEFAULT_SOURCE: &str = "Default";

/// A single observed base-asset price in USD. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub source: String,
    pub captured_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(price: f64, source: &str) -> Self {
        Self {
            price,
            source: source.to_string(),
            captured_at: Utc::now(),
        }
    }

    /// Whether this sample carries a usable price.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

impl fmt::Display for PriceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4} [{}]", self.price, self.source)
    }
}

/// One entry of the rolling price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Fractional change from the previous sample.
    pub change: f64,
    /// Volatility including this record.
    pub volatility: f64,
}

/// Coarse market regime derived from recent price changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Bull,
    Bear,
    Neutral,
}

impl Sentiment {
    /// Multiplier applied to a base trade size in this regime.
    pub fn size_multiplier(&self) -> f64 {
        match self {
            Sentiment::Bull => 1.5,
            Sentiment::Bear => 0.5,
            Sentiment::Neutral => 1.0,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Bull => write!(f, "BULL"),
            Sentiment::Bear => write!(f, "BEAR"),
            Sentiment::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Summary statistics over the price history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStats {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub volatility: f64,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

impl fmt::Display for PriceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current=${:.4} min=${:.4} max=${:.4} avg=${:.4} vol={:.4}% [{}]",
            self.current,
            self.min,
            self.max,
            self.avg,
            self.volatility * 100.0,
            self.source,
        )
    }
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// How a quote was priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteMode {
    /// Derived from the monitor's current price.
    RealTime,
    /// Derived from a static historical rate.
    Fallback,
}

/// Expected output of a swap. Produced fresh per request, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Expected output, smallest unit of the output asset.
    pub amount_out: u64,
    /// Fee, smallest unit.
    pub fee: u64,
    /// Placeholder, not modelled from pool depth.
    pub price_impact: f64,
    pub route: String,
    pub current_price: Option<f64>,
    pub fee_rate: Decimal,
    pub mode: QuoteMode,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "out={} fee={} rate={} via {} ({:?})",
            self.amount_out, self.fee, self.fee_rate, self.route, self.mode,
        )
    }
}

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Progress of the swap-and-swapback schedule. Owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleState {
    pub current_cycle: u32,
    pub target_cycles: u32,
    pub running: bool,
    pub successful_swaps: u64,
    pub failed_swaps: u64,
    /// Cumulative USD notional of successful swap inputs.
    pub volume_usd: f64,
    pub started_at: DateTime<Utc>,
}

impl CycleState {
    pub fn new(target_cycles: u32) -> Self {
        Self {
            current_cycle: 0,
            target_cycles,
            running: false,
            successful_swaps: 0,
            failed_swaps: 0,
            volume_usd: 0.0,
            started_at: Utc::now(),
        }
    }

    pub fn target_reached(&self) -> bool {
        self.current_cycle >= self.target_cycles
    }

    pub fn remaining(&self) -> u32 {
        self.target_cycles.saturating_sub(self.current_cycle)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {}/{} | ok={} failed={} | volume=${:.2}{}",
            self.current_cycle,
            self.target_cycles,
            self.successful_swaps,
            self.failed_swaps,
            self.volume_usd,
            if self.running { " | running" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for MOMENTUM.
#[derive(Debug, thiserror::Error)]
pub enum MomentumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid private key: {0}")]
    KeyFormat(String),

    #[error("RPC error ({method}): {message}")]
    Rpc { method: String, message: String },

    #[error("Unsupported swap pair: {from} -> {to}")]
    UnsupportedPair { from: String, to: String },

    #[error("No {0} coins found in wallet")]
    NoCoins(String),

    #[error("Transaction build error: {0}")]
    Build(String),

    #[error("Invalid Move type or address: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
