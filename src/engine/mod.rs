//! Cycle engine: the swap-and-swapback schedule and its console reports.

pub mod orchestrator;
pub mod report;

pub use orchestrator::{AbortReason, CycleOrchestrator, CycleOutcome};
pub use report::{FinalStatistics, PortfolioSnapshot};
