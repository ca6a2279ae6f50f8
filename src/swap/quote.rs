//! Swap quoting.
//!
//! Real-time quotes convert the input through the monitor's current price
//! and charge the protocol fee on the output. Without a usable price the
//! engine falls back to fixed historical rates with their own fee rate.
//! Amounts are computed in `Decimal` and truncated at the output asset's
//! smallest unit.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{QuoteConfig, SlippageConfig};
use crate::prices::PriceMonitor;
use crate::types::{MomentumError, Quote, QuoteMode, SwapDirection, TradingPair};

pub struct QuoteEngine {
    pair: TradingPair,
    config: QuoteConfig,
    slippage: SlippageConfig,
    monitor: Option<Arc<PriceMonitor>>,
}

impl QuoteEngine {
    pub fn new(
        pair: TradingPair,
        config: QuoteConfig,
        slippage: SlippageConfig,
        monitor: Option<Arc<PriceMonitor>>,
    ) -> Self {
        Self { pair, config, slippage, monitor }
    }

    /// Quote `amount_in` of `from` into `to`. `None` for any pair other
    /// than the two supported directions.
    pub fn get_quote(&self, from: &str, to: &str, amount_in: u64) -> Option<Quote> {
        let Some(direction) = self.pair.direction(from, to) else {
            warn!(from, to, "No quote for unsupported pair");
            return None;
        };

        if let Some(price) = self.live_price() {
            match self.real_time_quote(direction, amount_in, price) {
                Ok(quote) => return Some(quote),
                Err(e) => warn!(error = %e, "Real-time quote failed, using fallback rate"),
            }
        }

        match self.fallback_quote(direction, amount_in) {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!(error = %e, "Fallback quote failed");
                None
            }
        }
    }

    /// `floor(amount_out × (1 − slippage))`. Slippage is `custom` if given,
    /// else the monitor's dynamic slippage, else the configured fallback.
    pub fn calculate_min_amount_out(&self, amount_out: u64, custom: Option<f64>) -> u64 {
        let slippage = custom
            .unwrap_or_else(|| match &self.monitor {
                Some(m) => m.dynamic_slippage(),
                None => self.slippage.fallback,
            });
        let slippage = if slippage.is_finite() { slippage.clamp(0.0, 1.0) } else { self.slippage.fallback };

        let min_out = (amount_out as f64 * (1.0 - slippage)).floor() as u64;
        info!(
            slippage_pct = format!("{:.3}%", slippage * 100.0),
            min_out,
            "Minimum output computed"
        );
        min_out
    }

    fn live_price(&self) -> Option<f64> {
        let price = self.monitor.as_ref()?.current_price();
        (price.is_finite() && price > 0.0).then_some(price)
    }

    fn real_time_quote(
        &self,
        direction: SwapDirection,
        amount_in: u64,
        price: f64,
    ) -> Result<Quote, MomentumError> {
        let price_dec = Decimal::from_f64(price)
            .ok_or_else(|| MomentumError::Build(format!("price {price} not representable")))?;
        let input = self.pair.input(direction);
        let output = self.pair.output(direction);

        let human_in = Decimal::from(amount_in) / input.unit_decimal();
        let human_out = match direction {
            SwapDirection::BaseToQuote => human_in * price_dec,
            SwapDirection::QuoteToBase => human_in / price_dec,
        };
        let units = (human_out * output.unit_decimal()).floor();
        let fee = (units * self.config.fee_rate).floor();

        let units = to_amount(units)?;
        let fee = to_amount(fee)?;
        let quote = Quote {
            amount_out: units.saturating_sub(fee),
            fee,
            price_impact: self.config.price_impact,
            route: self.config.route.clone(),
            current_price: Some(price),
            fee_rate: self.config.fee_rate,
            mode: QuoteMode::RealTime,
        };
        debug!(label = %self.pair.label(direction), amount_in, %quote, "Real-time quote");
        Ok(quote)
    }

    fn fallback_quote(&self, direction: SwapDirection, amount_in: u64) -> Result<Quote, MomentumError> {
        let rate = match direction {
            SwapDirection::BaseToQuote => self.config.fallback_base_to_quote_rate,
            SwapDirection::QuoteToBase => self.config.fallback_quote_to_base_rate,
        };
        let amount = Decimal::from(amount_in);
        let gross = to_amount((amount * rate).floor())?;
        let fee = to_amount((amount * self.config.fallback_fee_rate).floor())?;

        let quote = Quote {
            amount_out: gross.saturating_sub(fee),
            fee,
            price_impact: self.config.price_impact,
            route: self.config.route.clone(),
            current_price: None,
            fee_rate: self.config.fallback_fee_rate,
            mode: QuoteMode::Fallback,
        };
        debug!(label = %self.pair.label(direction), amount_in, %quote, "Fallback quote");
        Ok(quote)
    }
}

fn to_amount(d: Decimal) -> Result<u64, MomentumError> {
    d.to_u64()
        .ok_or_else(|| MomentumError::Build(format!("amount {d} out of range")))
}
