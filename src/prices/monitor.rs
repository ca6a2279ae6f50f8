//! Price monitor.
//!
//! Polls a `PriceFeed` on a fixed period, keeps a bounded history of
//! samples, and derives volatility, market sentiment, and the dynamic
//! slippage tolerance used by the swap engine. Subscribers registered
//! with `on_price_change` are notified when a poll moves the price by
//! more than the configured threshold.

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::PriceFeed;
use crate::config::{MonitorConfig, SlippageConfig};
use crate::types::{PriceRecord, PriceSample, PriceStats, Sentiment, DEFAULT_SOURCE};

/// Subscriber invoked with `(fractional_change, new_sample)`.
pub type PriceChangeHandler = Arc<dyn Fn(f64, &PriceSample) -> Result<()> + Send + Sync>;

struct MonitorState {
    current: PriceSample,
    volatility: f64,
    history: VecDeque<PriceRecord>,
    consecutive_errors: u32,
}

pub struct PriceMonitor {
    feed: Arc<dyn PriceFeed>,
    config: MonitorConfig,
    slippage: SlippageConfig,
    state: RwLock<MonitorState>,
    handlers: Mutex<Vec<PriceChangeHandler>>,
    monitoring: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceMonitor {
    pub fn new(feed: Arc<dyn PriceFeed>, config: MonitorConfig, slippage: SlippageConfig) -> Self {
        let state = MonitorState {
            current: PriceSample::new(config.initial_price, DEFAULT_SOURCE),
            volatility: 0.0,
            history: VecDeque::with_capacity(config.history_capacity),
            consecutive_errors: 0,
        };
        Self {
            feed,
            config,
            slippage,
            state: RwLock::new(state),
            handlers: Mutex::new(Vec::new()),
            monitoring: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Poll once immediately, then every `poll_interval_ms` until stopped.
    /// No-op if already monitoring.
    pub async fn start_monitoring(self: &Arc<Self>) {
        if self
            .monitoring
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Price monitoring already running");
            return;
        }
        info!(interval_ms = self.config.poll_interval_ms, "Starting price monitoring");

        self.update_prices().await;
        self.arm_poller();
    }

    /// Spawn the polling task unless monitoring was stopped meanwhile.
    /// The task slot stays locked from the check to the store, so a
    /// concurrent `stop_monitoring` either prevents the spawn or aborts
    /// the stored task.
    fn arm_poller(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if !self.monitoring.load(Ordering::SeqCst) {
            return false;
        }
        let period = Duration::from_millis(self.config.poll_interval_ms);
        let monitor = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.update_prices().await;
            }
        }));
        true
    }

    /// Disarm the polling timer. Idempotent.
    pub fn stop_monitoring(&self) {
        let was_running = self.monitoring.swap(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        if was_running {
            info!("Price monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    // -- Polling ----------------------------------------------------------

    /// One poll of the feed. Errors are counted, never propagated.
    pub async fn update_prices(&self) {
        let last_known = self.current_price();
        match self.feed.latest(last_known).await {
            Ok(sample) => {
                self.record_sample(sample);
            }
            Err(e) => self.record_error(&e),
        }
    }

    /// Apply a sample. Returns the fractional change, or `None` if the
    /// sample carried no usable price and was ignored.
    pub fn record_sample(&self, sample: PriceSample) -> Option<f64> {
        if !sample.is_valid() {
            debug!(price = sample.price, source = %sample.source, "Ignoring unusable price sample");
            return None;
        }

        let (change, volatility) = {
            let mut state = self.state.write();
            let old = state.current.price;
            let change = if old > 0.0 { (sample.price - old) / old } else { 0.0 };

            // Mean |change| over the records already held; the new change
            // alone only while the history is empty.
            let volatility = if state.history.is_empty() {
                change.abs()
            } else {
                let window: Vec<f64> = state
                    .history
                    .iter()
                    .rev()
                    .take(self.config.volatility_window)
                    .map(|r| r.change.abs())
                    .collect();
                window.iter().sum::<f64>() / window.len() as f64
            };

            state.history.push_back(PriceRecord {
                timestamp: sample.captured_at,
                price: sample.price,
                change,
                volatility,
            });
            while state.history.len() > self.config.history_capacity {
                state.history.pop_front();
            }

            state.volatility = volatility;
            state.current = sample.clone();
            state.consecutive_errors = 0;
            (change, volatility)
        };

        info!(
            price = format!("${:.4}", sample.price),
            change_pct = format!("{:.2}%", change * 100.0),
            volatility = format!("{:.4}%", volatility * 100.0),
            source = %sample.source,
            "Price updated"
        );

        if change.abs() > self.config.price_change_threshold {
            self.notify(change, &sample);
        }
        Some(change)
    }

    fn record_error(&self, err: &anyhow::Error) {
        let mut state = self.state.write();
        state.consecutive_errors += 1;
        warn!(
            errors = state.consecutive_errors,
            max = self.config.max_consecutive_errors,
            error = %err,
            "Price update failed"
        );
        if state.consecutive_errors >= self.config.max_consecutive_errors {
            warn!("Too many price update errors, continuing on cached price");
            state.consecutive_errors = 0;
        }
    }

    // -- Observers --------------------------------------------------------

    /// Register a subscriber. Handlers run in registration order.
    pub fn on_price_change<F>(&self, handler: F)
    where
        F: Fn(f64, &PriceSample) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// A handler that errors or panics is logged and skipped.
    fn notify(&self, change: f64, sample: &PriceSample) {
        let handlers: Vec<PriceChangeHandler> = self.handlers.lock().clone();
        for (index, handler) in handlers.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(change, sample))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(handler = index, error = %e, "Price change handler failed"),
                Err(payload) => error!(handler = index, panic = panic_message(&*payload), "Price change handler panicked"),
            }
        }
    }

    // -- Queries ----------------------------------------------------------

    pub fn current_sample(&self) -> PriceSample {
        self.state.read().current.clone()
    }

    pub fn current_price(&self) -> f64 {
        self.state.read().current.price
    }

    pub fn volatility(&self) -> f64 {
        self.state.read().volatility
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.state.read().consecutive_errors
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<PriceRecord> {
        self.state.read().history.iter().cloned().collect()
    }

    /// BULL / BEAR / NEUTRAL from the mean change of the last
    /// `sentiment_window` records.
    pub fn market_sentiment(&self) -> Sentiment {
        let state = self.state.read();
        let window = self.config.sentiment_window;
        if state.history.len() < window {
            return Sentiment::Neutral;
        }
        let skip = state.history.len() - window;
        let mean = state.history.iter().skip(skip).map(|r| r.change).sum::<f64>() / window as f64;

        if mean > self.config.bull_threshold {
            Sentiment::Bull
        } else if mean < self.config.bear_threshold {
            Sentiment::Bear
        } else {
            Sentiment::Neutral
        }
    }

    /// Slippage tolerance scaled by volatility, within `[min, max]`.
    pub fn dynamic_slippage(&self) -> f64 {
        let base = self.slippage.min;
        let multiplier = (self.volatility() * 10.0).min(5.0);
        (base + multiplier * base).min(self.slippage.max)
    }

    /// Advisory trade size for the current sentiment.
    pub fn suggested_trade_size(&self, base_amount: u64) -> u64 {
        let multiplier = self.market_sentiment().size_multiplier();
        (base_amount as f64 * multiplier).floor() as u64
    }

    pub fn price_stats(&self) -> Option<PriceStats> {
        let state = self.state.read();
        if state.history.is_empty() {
            return None;
        }
        let prices = state.history.iter().map(|r| r.price);
        let min = prices.clone().fold(f64::INFINITY, f64::min);
        let max = prices.clone().fold(f64::NEG_INFINITY, f64::max);
        let avg = prices.sum::<f64>() / state.history.len() as f64;

        Some(PriceStats {
            current: state.current.price,
            min,
            max,
            avg,
            volatility: state.volatility,
            source: state.current.source.clone(),
            last_updated: state.current.captured_at,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl Drop for PriceMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
