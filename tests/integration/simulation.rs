//! Price-path simulations through the monitor.
//!
//! Each test replays a scripted path one poll at a time and checks the
//! derived market view: history, volatility, sentiment, slippage, and
//! change notifications.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use momentum::config::{MonitorConfig, SlippageConfig};
use momentum::prices::PriceMonitor;
use momentum::types::Sentiment;

use crate::scripted_feed::ScriptedFeed;

fn monitor(feed: Arc<ScriptedFeed>) -> Arc<PriceMonitor> {
    let config = MonitorConfig { poll_interval_ms: 10, ..MonitorConfig::default() };
    Arc::new(PriceMonitor::new(feed, config, SlippageConfig::default()))
}

/// Poll `n` times and count change notifications.
async fn replay(m: &PriceMonitor, n: usize) -> usize {
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    m.on_price_change(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    for _ in 0..n {
        m.update_prices().await;
    }
    notified.load(Ordering::SeqCst)
}

#[tokio::test]
async fn test_rally_turns_bull() {
    let path = [3.25, 3.45, 3.70, 3.95, 4.20, 4.50];
    let m = monitor(Arc::new(ScriptedFeed::new(&path)));
    let notified = replay(&m, path.len()).await;

    assert_eq!(notified, 5, "every step of the rally exceeds the threshold");
    assert_eq!(m.history().len(), 6);
    assert_eq!(m.current_price(), 4.50);
    assert_eq!(m.market_sentiment(), Sentiment::Bull);
    assert_eq!(m.suggested_trade_size(1_000_000_000), 1_500_000_000);

    let vol = m.volatility();
    assert!(vol > 0.05 && vol < 0.06, "volatility {vol}");
    let slippage = m.dynamic_slippage();
    assert!(slippage > 0.001 && slippage < 0.01, "slippage {slippage}");

    let stats = m.price_stats().expect("history is populated");
    assert_eq!(stats.min, 3.25);
    assert_eq!(stats.max, 4.50);
    assert_eq!(stats.current, 4.50);
    assert_eq!(stats.source, "Scripted");
}

#[tokio::test]
async fn test_selloff_turns_bear() {
    let path = [3.25, 3.10, 2.95, 2.80, 2.65, 2.50];
    let m = monitor(Arc::new(ScriptedFeed::new(&path)));
    let notified = replay(&m, path.len()).await;

    assert_eq!(notified, 5);
    assert_eq!(m.market_sentiment(), Sentiment::Bear);
    assert_eq!(m.suggested_trade_size(1_000_000_000), 500_000_000);
    assert!(m.history().iter().skip(1).all(|r| r.change < 0.0));
}

#[tokio::test]
async fn test_choppy_market_stays_quiet() {
    let path = [3.25, 3.27, 3.24, 3.26, 3.25, 3.26];
    let m = monitor(Arc::new(ScriptedFeed::new(&path)));
    let notified = replay(&m, path.len()).await;

    assert_eq!(notified, 0);
    assert_eq!(m.market_sentiment(), Sentiment::Neutral);
    assert!(m.volatility() < 0.01);
    assert_eq!(m.suggested_trade_size(1_000_000_000), 1_000_000_000);
}

#[tokio::test]
async fn test_feed_outage_keeps_cached_price() {
    let m = monitor(Arc::new(ScriptedFeed::new(&[])));
    for _ in 0..3 {
        m.update_prices().await;
    }
    assert_eq!(m.consecutive_errors(), 3);
    assert_eq!(m.current_price(), 3.25);
    assert!(m.history().is_empty());
    assert!(m.price_stats().is_none());

    // The counter resets once the limit is hit.
    m.update_prices().await;
    m.update_prices().await;
    assert_eq!(m.consecutive_errors(), 0);
    assert_eq!(m.current_price(), 3.25);
}

#[tokio::test]
async fn test_recovery_after_outage_resets_errors() {
    let feed = Arc::new(ScriptedFeed::new(&[3.30]));
    let m = monitor(Arc::clone(&feed));
    m.update_prices().await;
    m.update_prices().await;
    assert_eq!(m.consecutive_errors(), 1);
    assert_eq!(m.current_price(), 3.30);
}

#[tokio::test]
async fn test_polling_loop_lifecycle() {
    let feed = Arc::new(ScriptedFeed::new(&[3.25, 3.26, 3.27, 3.28]));
    let m = monitor(Arc::clone(&feed));

    m.start_monitoring().await;
    assert!(m.is_monitoring());
    assert_eq!(feed.remaining(), 3, "first poll happens before start returns");

    tokio::time::timeout(Duration::from_secs(5), async {
        while feed.remaining() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("poller should drain the script");

    m.stop_monitoring();
    assert!(!m.is_monitoring());
    let polled = m.history().len();
    assert_eq!(polled, 4);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(m.history().len(), polled, "no polls after stop");
}
