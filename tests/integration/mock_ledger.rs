//! In-memory ledger for integration testing.
//!
//! Holds SUI and USDC balances for one address and settles flash-swap
//! transactions at a fixed SUI price, charging a flat gas fee. Failures
//! can be injected either as settled failure statuses or as submission
//! errors.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

use momentum::config::PoolConfig;
use momentum::sui::transaction::TxInput;
use momentum::sui::types::{Argument, Command, SUI_COIN_TYPE};
use momentum::sui::{CoinObject, LedgerClient, ObjectId, ObjectInfo, SuiAddress, TransactionBlock, TransactionResponse};

pub const GAS_FEE: u64 = 2_000_000;

pub struct MockLedger {
    address: SuiAddress,
    usdc_type: String,
    /// USD per SUI used to settle swaps.
    price: f64,
    balances: Mutex<HashMap<String, u64>>,
    submitted: Mutex<Vec<(bool, u64)>>,
    /// Settled failure reason for subsequent transactions.
    abort_with: Mutex<Option<String>>,
    /// Submission error for subsequent transactions.
    reject_with: Mutex<Option<String>>,
}

impl MockLedger {
    pub fn new(sui: u64, usdc: u64, price: f64) -> Self {
        let usdc_type = PoolConfig::default().quote.coin_type;
        let mut balances = HashMap::new();
        balances.insert(SUI_COIN_TYPE.to_string(), sui);
        balances.insert(usdc_type.clone(), usdc);
        Self {
            address: "0x5ee".parse().expect("valid address"),
            usdc_type,
            price,
            balances: Mutex::new(balances),
            submitted: Mutex::new(Vec::new()),
            abort_with: Mutex::new(None),
            reject_with: Mutex::new(None),
        }
    }

    pub fn sui(&self) -> u64 {
        self.balances.lock()[SUI_COIN_TYPE]
    }

    pub fn usdc(&self) -> u64 {
        self.balances.lock()[&self.usdc_type]
    }

    pub fn abort_with(&self, reason: Option<&str>) {
        *self.abort_with.lock() = reason.map(str::to_string);
    }

    pub fn reject_with(&self, reason: Option<&str>) {
        *self.reject_with.lock() = reason.map(str::to_string);
    }

    /// `(base_to_quote, amount_in)` for every settled submission.
    pub fn submitted(&self) -> Vec<(bool, u64)> {
        self.submitted.lock().clone()
    }

    /// Direction and amount as encoded by the swap builder.
    fn decode(tx: &TransactionBlock) -> Result<(bool, u64)> {
        let base_to_quote = match tx.commands().first() {
            Some(Command::SplitCoins(Argument::GasCoin, _)) => true,
            Some(_) => false,
            None => return Err(anyhow!("empty transaction")),
        };
        let amount = match tx.inputs().first() {
            Some(TxInput::Pure(bytes)) => bcs::from_bytes::<u64>(bytes)?,
            _ => return Err(anyhow!("amount input missing")),
        };
        Ok((base_to_quote, amount))
    }

    fn settle(&self, tx: &TransactionBlock, apply: bool) -> Result<TransactionResponse> {
        if let Some(reason) = self.reject_with.lock().clone() {
            return Err(anyhow!(reason));
        }
        let (base_to_quote, amount) = Self::decode(tx)?;
        let owner = json!({"AddressOwner": self.address.to_hex()});
        let digest = format!("tx{}", self.submitted.lock().len() + 1);

        if let Some(reason) = self.abort_with.lock().clone() {
            if apply {
                self.submitted.lock().push((base_to_quote, amount));
                *self.balances.lock().entry(SUI_COIN_TYPE.to_string()).or_default() -= GAS_FEE;
            }
            return Ok(serde_json::from_value(json!({
                "digest": digest,
                "effects": {"status": {"status": "failure", "error": reason}},
                "balanceChanges": [
                    {"owner": owner, "coinType": SUI_COIN_TYPE, "amount": format!("-{GAS_FEE}")}
                ]
            }))?);
        }

        let price = self.price;
        let (sui_delta, usdc_delta) = if base_to_quote {
            let out = (amount as f64 * price / 1_000.0 * 0.997).floor() as i128;
            (-(amount as i128) - GAS_FEE as i128, out)
        } else {
            let out = (amount as f64 / price * 1_000.0 * 0.997).floor() as i128;
            (out - GAS_FEE as i128, -(amount as i128))
        };

        if apply {
            let mut balances = self.balances.lock();
            for (coin_type, delta) in [(SUI_COIN_TYPE.to_string(), sui_delta), (self.usdc_type.clone(), usdc_delta)] {
                let balance = balances.entry(coin_type).or_default();
                *balance = u64::try_from(*balance as i128 + delta).map_err(|_| anyhow!("insufficient balance"))?;
            }
            self.submitted.lock().push((base_to_quote, amount));
        }

        Ok(serde_json::from_value(json!({
            "digest": digest,
            "effects": {"status": {"status": "success"}, "gasUsed": {}},
            "balanceChanges": [
                {"owner": owner, "coinType": SUI_COIN_TYPE, "amount": sui_delta.to_string()},
                {"owner": owner, "coinType": self.usdc_type, "amount": usdc_delta.to_string()}
            ],
            "events": [
                {"type": "0xc84b::trade::SwapEvent", "parsedJson": {"amount_y": usdc_delta.abs().to_string()}}
            ]
        }))?)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn address(&self) -> SuiAddress {
        self.address
    }

    async fn get_balance(&self, coin_type: &str) -> u64 {
        self.balances.lock().get(coin_type).copied().unwrap_or(0)
    }

    async fn get_coins(&self, coin_type: &str) -> Result<Vec<CoinObject>> {
        let balance = self.balances.lock().get(coin_type).copied().unwrap_or(0);
        if balance == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![CoinObject {
            coin_type: coin_type.to_string(),
            coin_object_id: "0xc011".to_string(),
            version: "7".to_string(),
            digest: bs58::encode([9u8; 32]).into_string(),
            balance: balance.to_string(),
        }])
    }

    async fn get_object(&self, id: ObjectId) -> Result<ObjectInfo> {
        Ok(serde_json::from_value(json!({
            "objectId": id.to_hex(),
            "version": "1",
            "digest": bs58::encode([1u8; 32]).into_string(),
            "type": "0xc84b::pool::Pool",
            "owner": {"Shared": {"initial_shared_version": 1}}
        }))?)
    }

    async fn execute(&self, tx: TransactionBlock, _gas_budget: u64) -> Result<TransactionResponse> {
        self.settle(&tx, true)
    }

    async fn dry_run(&self, tx: TransactionBlock, _gas_budget: u64) -> Result<TransactionResponse> {
        let mut response = self.settle(&tx, false)?;
        response.digest.clear();
        Ok(response)
    }
}
