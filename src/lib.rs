//! MOMENTUM: volatility-adaptive swap-and-swapback agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod prices;
pub mod sui;
pub mod swap;
pub mod engine;
