//! End-to-end tests: full swap cycles against an in-memory ledger, and
//! price-path simulations through the monitor.

mod cycles;
mod mock_ledger;
mod scripted_feed;
mod simulation;
