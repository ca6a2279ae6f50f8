//! Sui full-node JSON-RPC client.
//!
//! Docs: https://docs.sui.io/sui-api-ref
//! Auth: none. Transactions are signed locally with the wallet key.
//!
//! Submission resolves every object input against the node, pays gas with
//! all of the sender's SUI coins at the reference gas price, BCS-encodes
//! and intent-signs the transaction data.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::keys::SuiKeypair;
use super::transaction::{TransactionBlock, TxInput};
use super::types::{
    Balance, CallArg, CoinObject, CoinPage, GasData, ObjectArg, ObjectId, ObjectInfo, ObjectRef,
    ObjectResponse, ProgrammableTransaction, SuiAddress, TransactionData, TransactionResponse,
    SUI_COIN_TYPE,
};
use super::LedgerClient;
use crate::types::MomentumError;

/// Upper bound on gas payment objects per transaction.
const MAX_GAS_OBJECTS: usize = 255;

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SuiRpcClient {
    http: Client,
    url: String,
    keypair: SuiKeypair,
    next_id: AtomicU64,
}

impl SuiRpcClient {
    pub fn new(url: &str, timeout_secs: u64, keypair: SuiKeypair) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Momentum-Bot/1.0")
            .build()
            .context("Failed to build RPC HTTP client")?;
        Ok(Self {
            http,
            url: url.to_string(),
            keypair,
            next_id: AtomicU64::new(1),
        })
    }

    /// Build the client and confirm the node answers. Failure here is a
    /// bootstrap error.
    pub async fn connect(url: &str, timeout_secs: u64, keypair: SuiKeypair) -> Result<Self> {
        let client = Self::new(url, timeout_secs, keypair)?;
        let chain: String = client
            .call("sui_getChainIdentifier", json!([]))
            .await
            .with_context(|| format!("Cannot reach Sui RPC at {url}"))?;
        info!(url, chain = %chain, "Connected to Sui RPC");
        Ok(client)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let resp = self.http.post(&self.url).json(&body).send().await
            .with_context(|| format!("{method} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Sui RPC error ({method}): {status}");
        }

        let envelope: RpcResponse = resp.json().await
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(err) = envelope.error {
            return Err(MomentumError::Rpc {
                method: method.to_string(),
                message: format!("{} (code {})", err.message, err.code),
            }
            .into());
        }
        let result = envelope.result.ok_or_else(|| MomentumError::Rpc {
            method: method.to_string(),
            message: "empty result".into(),
        })?;
        serde_json::from_value(result).with_context(|| format!("Unexpected {method} result shape"))
    }

    pub async fn reference_gas_price(&self) -> Result<u64> {
        let raw: Value = self.call("suix_getReferenceGasPrice", json!([])).await?;
        parse_u64(&raw).context("Reference gas price is not an integer")
    }

    // -- Submission -------------------------------------------------------

    async fn resolve_input(&self, input: TxInput) -> Result<CallArg> {
        Ok(match input {
            TxInput::Pure(bytes) => CallArg::Pure(bytes),
            TxInput::OwnedRef(obj_ref) => CallArg::Object(ObjectArg::ImmOrOwnedObject(obj_ref)),
            TxInput::Object { id, mutable } => {
                let info = self.get_object(id).await?;
                match info.initial_shared_version() {
                    Some(initial_shared_version) => CallArg::Object(ObjectArg::SharedObject {
                        id,
                        initial_shared_version,
                        mutable,
                    }),
                    None => CallArg::Object(ObjectArg::ImmOrOwnedObject(info.object_ref()?)),
                }
            }
        })
    }

    /// All SUI coins not already used as inputs, largest first.
    async fn gas_payment(&self, inputs: &[CallArg], gas_budget: u64) -> Result<Vec<ObjectRef>> {
        let used: HashSet<ObjectId> = inputs
            .iter()
            .filter_map(|arg| match arg {
                CallArg::Object(ObjectArg::ImmOrOwnedObject((id, _, _))) => Some(*id),
                _ => None,
            })
            .collect();

        let mut coins = self.get_coins(SUI_COIN_TYPE).await?;
        coins.sort_by_key(|c| std::cmp::Reverse(c.balance()));

        let mut payment = Vec::new();
        let mut total: u128 = 0;
        for coin in coins.iter().take(MAX_GAS_OBJECTS) {
            let obj_ref = coin.object_ref()?;
            if used.contains(&obj_ref.0) {
                continue;
            }
            total += coin.balance() as u128;
            payment.push(obj_ref);
        }

        if total < gas_budget as u128 {
            anyhow::bail!("Insufficient SUI for gas: have {total}, budget {gas_budget}");
        }
        Ok(payment)
    }

    async fn prepare(&self, tx: TransactionBlock, gas_budget: u64) -> Result<Vec<u8>> {
        let (inputs, commands) = tx.into_parts();
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            resolved.push(self.resolve_input(input).await?);
        }

        let price = self.reference_gas_price().await?;
        let payment = self.gas_payment(&resolved, gas_budget).await?;
        debug!(inputs = resolved.len(), commands = commands.len(), gas_objects = payment.len(), price, "Transaction resolved");

        let data = TransactionData::new(
            ProgrammableTransaction { inputs: resolved, commands },
            self.keypair.address(),
            GasData {
                payment,
                owner: self.keypair.address(),
                price,
                budget: gas_budget,
            },
        );
        Ok(data.to_bcs()?)
    }
}

fn parse_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

// ---------------------------------------------------------------------------
// LedgerClient impl
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerClient for SuiRpcClient {
    fn address(&self) -> SuiAddress {
        self.keypair.address()
    }

    async fn get_balance(&self, coin_type: &str) -> u64 {
        let owner = self.address().to_hex();
        let result: Result<Balance> = self.call("suix_getBalance", json!([owner, coin_type])).await;
        match result {
            Ok(b) => b.total_balance.parse().unwrap_or_else(|_| {
                warn!(coin_type, raw = %b.total_balance, "Unparseable balance");
                0
            }),
            Err(e) => {
                warn!(coin_type, error = %e, "Balance lookup failed");
                0
            }
        }
    }

    async fn get_coins(&self, coin_type: &str) -> Result<Vec<CoinObject>> {
        let owner = self.address().to_hex();
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: CoinPage = self
                .call("suix_getCoins", json!([owner, coin_type, cursor, Value::Null]))
                .await?;
            coins.extend(page.data);
            match page.next_cursor {
                Some(next) if page.has_next_page => cursor = Some(next),
                _ => break,
            }
        }
        debug!(coin_type, count = coins.len(), "Coins fetched");
        Ok(coins)
    }

    async fn get_object(&self, id: ObjectId) -> Result<ObjectInfo> {
        let options = json!({ "showType": true, "showOwner": true, "showContent": true });
        let resp: ObjectResponse = self.call("sui_getObject", json!([id.to_hex(), options])).await?;
        match resp.data {
            Some(info) => Ok(info),
            None => Err(MomentumError::Rpc {
                method: "sui_getObject".into(),
                message: format!("object {id} unavailable: {}", resp.error.unwrap_or(Value::Null)),
            }
            .into()),
        }
    }

    async fn execute(&self, tx: TransactionBlock, gas_budget: u64) -> Result<TransactionResponse> {
        let bytes = self.prepare(tx, gas_budget).await?;
        let signature = self.keypair.sign_transaction(&bytes);
        let options = json!({
            "showEffects": true,
            "showObjectChanges": true,
            "showBalanceChanges": true,
            "showEvents": true,
        });
        self.call(
            "sui_executeTransactionBlock",
            json!([STANDARD.encode(&bytes), [signature], options, "WaitForLocalExecution"]),
        )
        .await
    }

    async fn dry_run(&self, tx: TransactionBlock, gas_budget: u64) -> Result<TransactionResponse> {
        let bytes = self.prepare(tx, gas_budget).await?;
        self.call("sui_dryRunTransactionBlock", json!([STANDARD.encode(&bytes)])).await
    }
}
