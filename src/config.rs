//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads an optional `momentum.toml` and deserializes into strongly-typed
//! structs; every field has a default, so a missing file is fine. The
//! environment (including a `.env` file loaded in `main`) then overrides
//! the tunables operators usually touch. The resulting `AppConfig` is
//! built once at startup and shared immutably.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::types::{Asset, MomentumError, TradingPair};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    pub pool: PoolConfig,
    pub slippage: SlippageConfig,
    pub swap: SwapConfig,
    pub monitor: MonitorConfig,
    pub feeds: PriceFeedConfig,
    pub quote: QuoteConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://fullnode.mainnet.sui.io".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WalletConfig {
    /// File holding the private key. `SUI_PRIVATE_KEY` takes precedence.
    pub key_file: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { key_file: "privkey.txt".to_string() }
    }
}

/// On-chain identifiers of the Momentum pool and helpers.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    pub package_id: String,
    pub pool_id: String,
    /// Protocol version object passed to flash_swap / repay_flash_swap.
    pub pool_config_id: String,
    pub clock_id: String,
    pub slippage_check_package: String,
    pub base: Asset,
    pub quote: Asset,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            package_id: "0xc84b1ef2ac2ba5c3018e2b8c956ba5d0391e0e46d1daa1926d5a99a6a42526b4".to_string(),
            pool_id: "0x455cf8d2ac91e7cb883f515874af750ed3cd18195c970b7a2d46235ac2b0c388".to_string(),
            pool_config_id: "0x2375a0b1ec12010aaea3b2545acfa2ad34cfbba03ce4b59f4c39e1e25eed1b2a".to_string(),
            clock_id: "0x0000000000000000000000000000000000000000000000000000000000000006".to_string(),
            slippage_check_package: "0x8add2f0f8bc9748687639d7eb59b2172ba09a0172d9e63c029e23a7dbdb6abe6".to_string(),
            base: Asset::new("SUI", "0x2::sui::SUI", 9),
            quote: Asset::new(
                "USDC",
                "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
                6,
            ),
        }
    }
}

impl PoolConfig {
    pub fn pair(&self) -> TradingPair {
        TradingPair::new(self.base.clone(), self.quote.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SlippageConfig {
    /// Floor of the dynamic slippage tolerance.
    pub min: f64,
    /// Ceiling of the dynamic slippage tolerance.
    pub max: f64,
    /// Used when no price monitor is attached.
    pub fallback: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self { min: 0.001, max: 0.01, fallback: 0.02 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SwapConfig {
    /// Share of the base balance swapped in the first leg.
    pub first_leg_fraction: f64,
    /// Below this many smallest units a leg is not attempted.
    pub dust_threshold: u64,
    /// Advisory lower bound for suggested trade sizes.
    pub min_swap_amount: u64,
    /// Advisory upper bound for suggested trade sizes.
    pub max_swap_amount: u64,
    pub gas_budget: u64,
    /// Pause after each leg to let chain state settle.
    pub settlement_delay_ms: u64,
    /// Period of the cycle timer.
    pub swap_interval_ms: u64,
    /// Delay between a price-change event and the cycle attempt it triggers.
    pub price_trigger_delay_ms: u64,
    /// Dry-run transactions instead of executing them.
    pub dry_run: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            first_leg_fraction: 0.8,
            dust_threshold: 10_000,
            min_swap_amount: 10_000_000,
            max_swap_amount: 1_000_000_000,
            gas_budget: 15_000_000,
            settlement_delay_ms: 5_000,
            swap_interval_ms: 45_000,
            price_trigger_delay_ms: 1_000,
            dry_run: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    /// Absolute fractional change that notifies subscribers.
    pub price_change_threshold: f64,
    pub bull_threshold: f64,
    pub bear_threshold: f64,
    pub history_capacity: usize,
    pub volatility_window: usize,
    pub sentiment_window: usize,
    pub max_consecutive_errors: u32,
    /// Seed price used before the first successful poll.
    pub initial_price: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            price_change_threshold: 0.02,
            bull_threshold: 0.05,
            bear_threshold: -0.03,
            history_capacity: 100,
            volatility_window: 10,
            sentiment_window: 5,
            max_consecutive_errors: 5,
            initial_price: 3.25,
        }
    }
}

/// External price endpoints, consulted in declaration order.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PriceFeedConfig {
    pub coingecko_url: String,
    pub binance_url: String,
    pub kraken_url: String,
    /// Key of the ticker inside Kraken's `result` object.
    pub kraken_pair: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            coingecko_url: "https://api.coingecko.com/api/v3/simple/price?ids=sui&vs_currencies=usd".to_string(),
            binance_url: "https://api.binance.com/api/v3/ticker/price?symbol=SUIUSDT".to_string(),
            kraken_url: "https://api.kraken.com/0/public/Ticker?pair=SUIUSD".to_string(),
            kraken_pair: "SUIUSD".to_string(),
            timeout_secs: 5,
            user_agent: "Momentum-Bot/1.0".to_string(),
        }
    }
}

/// Quoting constants.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QuoteConfig {
    /// Fee rate charged on real-time quotes.
    pub fee_rate: Decimal,
    /// Fee rate charged on fallback-rate quotes.
    pub fallback_fee_rate: Decimal,
    /// Smallest-unit quote received per smallest-unit base spent.
    pub fallback_base_to_quote_rate: Decimal,
    /// Smallest-unit base received per smallest-unit quote spent.
    pub fallback_quote_to_base_rate: Decimal,
    pub price_impact: f64,
    pub route: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.003),
            fallback_fee_rate: dec!(0.0016),
            fallback_base_to_quote_rate: dec!(0.00357794),
            fallback_quote_to_base_rate: dec!(279.4),
            price_impact: 0.001,
            route: "Momentum Protocol".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration: optional TOML file, then process environment.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, falling back to defaults when it doesn't exist.
    pub fn from_file(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            debug!(path, "No config file found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUI_RPC_URL").filter(|v| !v.trim().is_empty()) {
            self.network.rpc_url = url.trim().to_string();
        }
        if let Some(path) = lookup("SUI_KEY_FILE").filter(|v| !v.trim().is_empty()) {
            self.wallet.key_file = path.trim().to_string();
        }

        override_from(&lookup, "SLIPPAGE_TOLERANCE", &mut self.slippage.fallback);
        override_from(&lookup, "MIN_SLIPPAGE", &mut self.slippage.min);
        override_from(&lookup, "MAX_SLIPPAGE", &mut self.slippage.max);

        override_from(&lookup, "MIN_SWAP_AMOUNT", &mut self.swap.min_swap_amount);
        override_from(&lookup, "MAX_SWAP_AMOUNT", &mut self.swap.max_swap_amount);
        override_from(&lookup, "SWAP_INTERVAL", &mut self.swap.swap_interval_ms);
        override_from(&lookup, "DRY_RUN", &mut self.swap.dry_run);

        override_from(&lookup, "PRICE_UPDATE_INTERVAL", &mut self.monitor.poll_interval_ms);
        override_from(&lookup, "PRICE_CHANGE_THRESHOLD", &mut self.monitor.price_change_threshold);
        override_from(&lookup, "BULL_MARKET_THRESHOLD", &mut self.monitor.bull_threshold);
        override_from(&lookup, "BEAR_MARKET_THRESHOLD", &mut self.monitor.bear_threshold);
    }

    /// Reject combinations the rest of the agent can't honour.
    pub fn validate(&self) -> Result<(), MomentumError> {
        let s = &self.slippage;
        for (name, v) in [("min", s.min), ("max", s.max), ("fallback", s.fallback)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(MomentumError::Config(format!("slippage.{name} must be within [0, 1], got {v}")));
            }
        }
        if s.min > s.max {
            return Err(MomentumError::Config(format!(
                "slippage.min ({}) exceeds slippage.max ({})",
                s.min, s.max
            )));
        }

        let f = self.swap.first_leg_fraction;
        if !(f > 0.0 && f <= 1.0) {
            return Err(MomentumError::Config(format!("swap.first_leg_fraction must be in (0, 1], got {f}")));
        }
        if self.swap.swap_interval_ms == 0 || self.monitor.poll_interval_ms == 0 {
            return Err(MomentumError::Config("intervals must be greater than zero".into()));
        }
        if self.swap.min_swap_amount > self.swap.max_swap_amount {
            return Err(MomentumError::Config("swap.min_swap_amount exceeds swap.max_swap_amount".into()));
        }

        let m = &self.monitor;
        if m.bear_threshold > m.bull_threshold {
            return Err(MomentumError::Config(format!(
                "monitor.bear_threshold ({}) exceeds monitor.bull_threshold ({})",
                m.bear_threshold, m.bull_threshold
            )));
        }
        if m.history_capacity == 0 || m.volatility_window == 0 || m.sentiment_window == 0 {
            return Err(MomentumError::Config("monitor windows and history capacity must be non-zero".into()));
        }
        if self.pool.base.coin_type == self.pool.quote.coin_type {
            return Err(MomentumError::Config("pool base and quote coin types must differ".into()));
        }
        // 10^decimals must fit the u64 smallest-unit arithmetic.
        for asset in [&self.pool.base, &self.pool.quote] {
            if asset.decimals > 18 {
                return Err(MomentumError::Config(format!(
                    "pool asset {} decimals must be at most 18, got {}",
                    asset.symbol, asset.decimals
                )));
            }
        }
        Ok(())
    }
}

/// Parse `key` into `target` if set; keep the default and warn otherwise.
fn override_from<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else { return };
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }
    match raw.parse::<T>() {
        Ok(v) => *target = v,
        Err(_) => warn!(key, value = raw, "Ignoring unparseable environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.network.rpc_url, "https://fullnode.mainnet.sui.io");
        assert_eq!(cfg.slippage.min, 0.001);
        assert_eq!(cfg.slippage.max, 0.01);
        assert_eq!(cfg.swap.gas_budget, 15_000_000);
        assert_eq!(cfg.monitor.history_capacity, 100);
        assert_eq!(cfg.quote.fee_rate, dec!(0.003));
        assert_eq!(cfg.quote.fallback_fee_rate, dec!(0.0016));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[
            ("SUI_RPC_URL", "https://fullnode.testnet.sui.io"),
            ("MIN_SLIPPAGE", "0.002"),
            ("MAX_SLIPPAGE", "0.02"),
            ("SWAP_INTERVAL", "60000"),
            ("PRICE_UPDATE_INTERVAL", "5000"),
            ("BEAR_MARKET_THRESHOLD", "-0.04"),
            ("DRY_RUN", "true"),
        ]));
        assert_eq!(cfg.network.rpc_url, "https://fullnode.testnet.sui.io");
        assert_eq!(cfg.slippage.min, 0.002);
        assert_eq!(cfg.slippage.max, 0.02);
        assert_eq!(cfg.swap.swap_interval_ms, 60_000);
        assert_eq!(cfg.monitor.poll_interval_ms, 5_000);
        assert_eq!(cfg.monitor.bear_threshold, -0.04);
        assert!(cfg.swap.dry_run);
    }

    #[test]
    fn test_bad_env_value_keeps_default() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("PRICE_CHANGE_THRESHOLD", "lots"), ("MIN_SWAP_AMOUNT", "")]));
        assert_eq!(cfg.monitor.price_change_threshold, 0.02);
        assert_eq!(cfg.swap.min_swap_amount, 10_000_000);
    }

    #[test]
    fn test_validate_rejects_inverted_slippage() {
        let mut cfg = AppConfig::default();
        cfg.slippage.min = 0.05;
        cfg.slippage.max = 0.01;
        assert!(matches!(cfg.validate(), Err(MomentumError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let mut cfg = AppConfig::default();
        cfg.swap.first_leg_fraction = 0.0;
        assert!(cfg.validate().is_err());
        cfg.swap.first_leg_fraction = 1.2;
        assert!(cfg.validate().is_err());
        cfg.swap.first_leg_fraction = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_sentiment_thresholds() {
        let mut cfg = AppConfig::default();
        cfg.monitor.bear_threshold = 0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_decimals() {
        let mut cfg = AppConfig::default();
        cfg.pool.quote.decimals = 20;
        assert!(matches!(cfg.validate(), Err(MomentumError::Config(_))));
        cfg.pool.quote.decimals = 18;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [network]
            rpc_url = "http://127.0.0.1:9000"

            [swap]
            first_leg_fraction = 0.5
            dry_run = true

            [quote]
            fee_rate = 0.0025
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.rpc_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.network.request_timeout_secs, 30);
        assert_eq!(cfg.swap.first_leg_fraction, 0.5);
        assert!(cfg.swap.dry_run);
        assert_eq!(cfg.swap.dust_threshold, 10_000);
        assert!((cfg.quote.fee_rate - dec!(0.0025)).abs() < dec!(0.0000001));
        assert_eq!(cfg.pool.base.symbol, "SUI");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = AppConfig::from_file("/tmp/momentum_does_not_exist_xyz.toml").unwrap();
        assert_eq!(cfg.swap.swap_interval_ms, 45_000);
    }

    #[test]
    fn test_pool_pair() {
        let pair = AppConfig::default().pool.pair();
        assert_eq!(pair.base.decimals, 9);
        assert_eq!(pair.quote.decimals, 6);
        assert!(pair.quote.coin_type.ends_with("::usdc::USDC"));
    }
}
