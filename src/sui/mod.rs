//! Sui ledger access.
//!
//! The swap engine only talks to the chain through `LedgerClient`, so
//! tests can substitute an in-memory ledger for the JSON-RPC client.

pub mod keys;
pub mod rpc;
pub mod transaction;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use keys::SuiKeypair;
pub use rpc::SuiRpcClient;
pub use transaction::{TransactionBlock, TxInput};
pub use types::{CoinObject, ObjectId, ObjectInfo, SuiAddress, TransactionResponse};

/// Read balances and objects for the signer, and submit its transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The signer's address.
    fn address(&self) -> SuiAddress;

    /// Total balance of `coin_type` in smallest units. Returns 0 on any
    /// failure instead of erroring.
    async fn get_balance(&self, coin_type: &str) -> u64;

    /// All coin objects of `coin_type` owned by the signer.
    async fn get_coins(&self, coin_type: &str) -> Result<Vec<CoinObject>>;

    async fn get_object(&self, id: ObjectId) -> Result<ObjectInfo>;

    /// Sign, submit, and wait for local execution.
    async fn execute(&self, tx: TransactionBlock, gas_budget: u64) -> Result<TransactionResponse>;

    /// Simulate without committing.
    async fn dry_run(&self, tx: TransactionBlock, gas_budget: u64) -> Result<TransactionResponse>;
}
