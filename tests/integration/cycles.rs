//! Swap-and-swapback cycles driven end to end through the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use momentum::config::AppConfig;
use momentum::engine::{AbortReason, CycleOrchestrator, CycleOutcome};
use momentum::prices::PriceMonitor;
use momentum::sui::LedgerClient;
use momentum::swap::SwapEngine;

use crate::mock_ledger::{MockLedger, GAS_FEE};
use crate::scripted_feed::ScriptedFeed;

const SUI: u64 = 1_000_000_000;

fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.swap.settlement_delay_ms = 10;
    cfg.swap.price_trigger_delay_ms = 10;
    cfg.swap.swap_interval_ms = 20;
    cfg.monitor.poll_interval_ms = 20;
    cfg
}

struct Harness {
    ledger: Arc<MockLedger>,
    monitor: Arc<PriceMonitor>,
    orchestrator: Arc<CycleOrchestrator>,
}

fn harness(cfg: &AppConfig, ledger: MockLedger, prices: &[f64], target: u32) -> Harness {
    let ledger = Arc::new(ledger);
    let dyn_ledger: Arc<dyn LedgerClient> = ledger.clone();
    let monitor = Arc::new(PriceMonitor::new(
        Arc::new(ScriptedFeed::new(prices)),
        cfg.monitor.clone(),
        cfg.slippage.clone(),
    ));
    let engine = SwapEngine::new(cfg, Arc::clone(&dyn_ledger), Some(Arc::clone(&monitor))).unwrap();
    let orchestrator = Arc::new(CycleOrchestrator::new(
        Arc::new(engine),
        dyn_ledger,
        Arc::clone(&monitor),
        cfg.swap.clone(),
        target,
    ));
    Harness { ledger, monitor, orchestrator }
}

#[tokio::test]
async fn test_three_cycles_round_trip() {
    let h = harness(&config(), MockLedger::new(10 * SUI, 0, 3.25), &[3.25], 3);
    let done = h.orchestrator.subscribe_done();

    for cycle in 1..=3 {
        assert_eq!(h.orchestrator.attempt_cycle().await, CycleOutcome::Completed { cycle });
    }
    assert!(*done.borrow());
    assert_eq!(h.orchestrator.attempt_cycle().await, CycleOutcome::TargetReached);

    let submitted = h.ledger.submitted();
    assert_eq!(submitted.len(), 6);
    assert_eq!(submitted[0], (true, 8 * SUI), "first leg sells 80% of SUI");
    assert!(submitted.iter().enumerate().all(|(i, (b2q, _))| *b2q == (i % 2 == 0)));

    // Every swap-back sells the full USDC balance.
    assert_eq!(h.ledger.usdc(), 0);
    let sui = h.ledger.sui();
    assert!(sui < 10 * SUI, "fees and gas are paid");
    assert!(sui > 9 * SUI, "round trips keep most of the balance, got {sui}");

    let state = h.orchestrator.snapshot();
    assert_eq!(state.successful_swaps, 6);
    assert_eq!(state.failed_swaps, 0);
    assert!(state.volume_usd > 0.0);

    let stats = h.orchestrator.final_statistics();
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.target_cycles, 3);
}

#[tokio::test]
async fn test_portfolio_reflects_ledger() {
    let h = harness(&config(), MockLedger::new(2 * SUI, 1_500_000, 3.25), &[3.25], 1);
    let snapshot = h.orchestrator.portfolio().await;
    assert_eq!(snapshot.base.balance, 2 * SUI);
    assert_eq!(snapshot.quote.balance, 1_500_000);
    assert!((snapshot.total_usd() - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_settled_failures_do_not_stop_swap_back() {
    let ledger = MockLedger::new(5 * SUI, 2_000_000, 3.25);
    ledger.abort_with(Some("MoveAbort(assert_slippage) 1"));
    let h = harness(&config(), ledger, &[3.25], 2);

    assert_eq!(h.orchestrator.attempt_cycle().await, CycleOutcome::Completed { cycle: 1 });
    let state = h.orchestrator.snapshot();
    assert_eq!(state.successful_swaps, 0);
    assert_eq!(state.failed_swaps, 2);
    assert_eq!(state.volume_usd, 0.0);

    assert_eq!(h.ledger.submitted().len(), 2);
    assert_eq!(h.ledger.usdc(), 2_000_000);
    assert_eq!(h.ledger.sui(), 5 * SUI - 2 * GAS_FEE);
}

#[tokio::test]
async fn test_submission_error_then_recovery() {
    let ledger = MockLedger::new(5 * SUI, 0, 3.25);
    ledger.reject_with(Some("connection reset by peer"));
    let h = harness(&config(), ledger, &[3.25], 2);

    match h.orchestrator.attempt_cycle().await {
        CycleOutcome::Failed { cycle, error } => {
            assert_eq!(cycle, 1);
            assert!(error.contains("connection reset"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.orchestrator.snapshot().failed_swaps, 1);
    assert_eq!(h.ledger.sui(), 5 * SUI);
    assert!(!h.orchestrator.is_running());

    h.ledger.reject_with(None);
    assert_eq!(h.orchestrator.attempt_cycle().await, CycleOutcome::Completed { cycle: 2 });
    assert!(h.orchestrator.target_reached());
}

#[tokio::test]
async fn test_dry_run_leaves_balances_untouched() {
    let mut cfg = config();
    cfg.swap.dry_run = true;
    let h = harness(&cfg, MockLedger::new(5 * SUI, 0, 3.25), &[3.25], 1);

    let outcome = h.orchestrator.attempt_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Aborted {
            cycle: 1,
            reason: AbortReason::Dust { asset: "USDC".into(), amount: 0 }
        }
    );
    assert_eq!(h.ledger.sui(), 5 * SUI);
    assert!(h.ledger.submitted().is_empty());
    assert_eq!(h.orchestrator.snapshot().successful_swaps, 1);
}

#[tokio::test]
async fn test_empty_wallet_aborts_every_cycle() {
    let h = harness(&config(), MockLedger::new(0, 0, 3.25), &[3.25], 2);
    for cycle in 1..=2 {
        match h.orchestrator.attempt_cycle().await {
            CycleOutcome::Aborted { cycle: c, reason: AbortReason::Dust { asset, .. } } => {
                assert_eq!(c, cycle);
                assert_eq!(asset, "SUI");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(h.orchestrator.target_reached());
    assert_eq!(h.orchestrator.snapshot().failed_swaps, 0);
}

#[tokio::test]
async fn test_timer_driven_run_reaches_target() {
    let h = harness(&config(), MockLedger::new(10 * SUI, 0, 3.25), &[3.25], 2);
    let mut done = h.orchestrator.subscribe_done();

    let orchestrator = Arc::clone(&h.orchestrator);
    let timer = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(20));
        loop {
            tick.tick().await;
            if !orchestrator.is_running() && !orchestrator.target_reached() {
                orchestrator.spawn_attempt(Duration::ZERO);
            }
        }
    });

    tokio::time::timeout(Duration::from_secs(10), done.wait_for(|reached| *reached))
        .await
        .expect("target should be reached")
        .unwrap();
    timer.abort();

    // Let any in-flight attempt finish.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = h.orchestrator.snapshot();
    assert_eq!(state.current_cycle, 2);
    assert_eq!(h.ledger.submitted().len(), 4);
}

#[tokio::test]
async fn test_price_jump_triggers_cycle() {
    let h = harness(&config(), MockLedger::new(10 * SUI, 0, 3.25), &[3.25, 3.25, 3.60], 1);
    h.orchestrator.subscribe_to(&h.monitor);
    let mut done = h.orchestrator.subscribe_done();

    h.monitor.start_monitoring().await;
    tokio::time::timeout(Duration::from_secs(5), done.wait_for(|reached| *reached))
        .await
        .expect("price jump should drive a cycle")
        .unwrap();
    h.monitor.stop_monitoring();

    assert!(h.monitor.current_price() > 3.5);
    assert_eq!(h.orchestrator.snapshot().current_cycle, 1);
    assert!(!h.ledger.submitted().is_empty());
}
