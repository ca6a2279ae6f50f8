//! Cycle orchestrator.
//!
//! Drives swap-then-swap-back cycles up to a target count. Each cycle
//! sells a fraction of the base balance for the quote asset, waits for the
//! chain to settle, then sells the whole quote balance back.
//!
//! Attempts come from the periodic timer in `main` and from price-change
//! notifications. At most one cycle is in flight: `running` is taken by
//! compare-and-set and released by a drop guard on every exit path.

use anyhow::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::report::{FinalStatistics, PortfolioSnapshot};
use crate::config::SwapConfig;
use crate::prices::PriceMonitor;
use crate::sui::LedgerClient;
use crate::swap::{SwapEngine, SwapOutcome};
use crate::types::{CycleState, SwapDirection};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a cycle stopped early without counting as a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// Leg amount below the dust threshold.
    Dust { asset: String, amount: u64 },
    /// No quote for the leg.
    QuoteUnavailable { label: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Dust { asset, amount } => write!(f, "{asset} amount {amount} below dust threshold"),
            AbortReason::QuoteUnavailable { label } => write!(f, "no quote for {label}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another cycle was in flight.
    Busy,
    /// Nothing left to do.
    TargetReached,
    Completed { cycle: u32 },
    Aborted { cycle: u32, reason: AbortReason },
    Failed { cycle: u32, error: String },
}

/// Clears the running flag when an attempt ends, however it ends.
struct RunningGuard<'a>(&'a CycleOrchestrator);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().running = false;
        self.0.running.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct CycleOrchestrator {
    engine: Arc<SwapEngine>,
    ledger: Arc<dyn LedgerClient>,
    monitor: Arc<PriceMonitor>,
    config: SwapConfig,
    running: AtomicBool,
    state: Mutex<CycleState>,
    done: watch::Sender<bool>,
}

impl CycleOrchestrator {
    pub fn new(
        engine: Arc<SwapEngine>,
        ledger: Arc<dyn LedgerClient>,
        monitor: Arc<PriceMonitor>,
        config: SwapConfig,
        target_cycles: u32,
    ) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            engine,
            ledger,
            monitor,
            config,
            running: AtomicBool::new(false),
            state: Mutex::new(CycleState::new(target_cycles)),
            done,
        }
    }

    /// Resolves to `true` once the target cycle count has been reached.
    pub fn subscribe_done(&self) -> watch::Receiver<bool> {
        self.done.subscribe()
    }

    pub fn snapshot(&self) -> CycleState {
        self.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn target_reached(&self) -> bool {
        self.state.lock().target_reached()
    }

    pub fn final_statistics(&self) -> FinalStatistics {
        FinalStatistics::from_state(&self.state.lock(), chrono::Utc::now())
    }

    pub async fn portfolio(&self) -> PortfolioSnapshot {
        PortfolioSnapshot::capture(self.ledger.as_ref(), self.engine.pair(), self.monitor.current_price()).await
    }

    // -- Triggers ---------------------------------------------------------

    /// Attempt a cycle on its own task after `delay`.
    pub fn spawn_attempt(self: &Arc<Self>, delay: Duration) -> JoinHandle<CycleOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            this.attempt_cycle().await
        })
    }

    /// Let large price moves pre-empt the timer.
    pub fn subscribe_to(self: &Arc<Self>, monitor: &PriceMonitor) {
        let weak = Arc::downgrade(self);
        let delay = Duration::from_millis(self.config.price_trigger_delay_ms);
        monitor.on_price_change(move |change, sample| {
            let Some(this) = weak.upgrade() else {
                return Ok(());
            };
            info!(
                change_pct = format!("{:.2}%", change * 100.0),
                price = format!("${:.4}", sample.price),
                sentiment = %this.monitor.market_sentiment(),
                "Price movement"
            );
            if !this.is_running() && !this.target_reached() {
                this.spawn_attempt(delay);
            }
            Ok(())
        });
    }

    // -- Cycle ------------------------------------------------------------

    pub async fn attempt_cycle(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Cycle already running, trigger ignored");
            return CycleOutcome::Busy;
        }
        let guard = RunningGuard(self);

        let started = {
            let mut state = self.state.lock();
            if state.target_reached() {
                None
            } else {
                state.current_cycle += 1;
                state.running = true;
                Some((state.current_cycle, state.target_cycles))
            }
        };
        let Some((cycle, target)) = started else {
            drop(guard);
            self.signal_done();
            return CycleOutcome::TargetReached;
        };

        info!(cycle, target, "Starting swap cycle");
        let outcome = match self.run_cycle().await {
            Ok(None) => {
                let remaining = self.state.lock().remaining();
                println!("{}", self.portfolio().await);
                info!(cycle, remaining, "Swap cycle complete");
                CycleOutcome::Completed { cycle }
            }
            Ok(Some(reason)) => {
                warn!(cycle, reason = %reason, "Swap cycle aborted");
                CycleOutcome::Aborted { cycle, reason }
            }
            Err(e) => {
                self.state.lock().failed_swaps += 1;
                error!(cycle, error = %e, "Swap cycle failed");
                CycleOutcome::Failed { cycle, error: e.to_string() }
            }
        };
        drop(guard);

        if self.target_reached() {
            self.signal_done();
        }
        outcome
    }

    fn signal_done(&self) {
        let changed = self.done.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        });
        if changed {
            let state = self.state.lock();
            info!(cycles = state.current_cycle, target = state.target_cycles, "Target reached");
        }
    }

    async fn run_cycle(&self) -> Result<Option<AbortReason>> {
        let before = self.portfolio().await;
        info!(
            base = format!("{:.4}", before.base.display_amount()),
            quote = format!("{:.6}", before.quote.display_amount()),
            "Balances before swap"
        );

        let first_leg = (before.base.balance as f64 * self.config.first_leg_fraction).floor() as u64;
        if let Some(reason) = self.run_leg(SwapDirection::BaseToQuote, first_leg).await? {
            return Ok(Some(reason));
        }
        self.settle().await;

        let quote_type = self.engine.pair().quote.coin_type.clone();
        let second_leg = self.ledger.get_balance(&quote_type).await;
        if let Some(reason) = self.run_leg(SwapDirection::QuoteToBase, second_leg).await? {
            return Ok(Some(reason));
        }
        self.settle().await;
        Ok(None)
    }

    async fn run_leg(&self, direction: SwapDirection, amount: u64) -> Result<Option<AbortReason>> {
        let pair = self.engine.pair();
        let input = pair.input(direction);
        let output = pair.output(direction);
        let label = pair.label(direction);

        if amount < self.config.dust_threshold {
            return Ok(Some(AbortReason::Dust { asset: input.symbol.clone(), amount }));
        }

        let suggested = self
            .monitor
            .suggested_trade_size(amount)
            .max(self.config.min_swap_amount)
            .min(self.config.max_swap_amount);
        debug!(label = %label, sentiment = %self.monitor.market_sentiment(), suggested, "Advisory trade size");

        let Some(quote) = self.engine.get_quote(&input.coin_type, &output.coin_type, amount) else {
            return Ok(Some(AbortReason::QuoteUnavailable { label }));
        };
        let min_out = self.engine.calculate_min_amount_out(quote.amount_out, None);

        info!(
            label = %label,
            amount = format!("{:.6} {}", input.to_display(amount), input),
            expected_out = quote.amount_out,
            min_out,
            "Swapping"
        );
        let outcome = self
            .engine
            .execute_swap(&input.coin_type, &output.coin_type, amount, min_out)
            .await?;
        self.record(&outcome);
        Ok(None)
    }

    fn record(&self, outcome: &SwapOutcome) {
        let mut state = self.state.lock();
        if !outcome.success {
            state.failed_swaps += 1;
            return;
        }
        state.successful_swaps += 1;
        let pair = self.engine.pair();
        state.volume_usd += match outcome.direction {
            SwapDirection::BaseToQuote => pair.base.to_display(outcome.amount_in) * self.monitor.current_price(),
            SwapDirection::QuoteToBase => pair.quote.to_display(outcome.amount_in),
        };
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.settlement_delay_ms)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
