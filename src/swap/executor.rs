//! Transaction submission and result interpretation.
//!
//! A transaction that settles with a failure status is not an error here:
//! it comes back as a `SwapOutcome` with `success == false` and the
//! chain-provided reason. Only build or submission failures propagate.

use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::sui::transaction::TransactionBlock;
use crate::sui::types::{same_coin_type, SuiEvent, TransactionResponse};
use crate::sui::{LedgerClient, SuiAddress};
use crate::types::{SwapDirection, TradingPair};

const EXPLORER_TX_URL: &str = "https://suiscan.xyz/mainnet/tx";

/// A swap-related event emitted by the transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapEventSummary {
    pub event_type: String,
    /// `amount_y` from the event payload, when present.
    pub amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub digest: String,
    pub success: bool,
    pub error: Option<String>,
    pub direction: SwapDirection,
    pub amount_in: u64,
    pub min_amount_out: u64,
    /// Signer's net change in the input asset (gas included for SUI).
    pub input_delta: i128,
    /// Signer's net change in the output asset.
    pub output_delta: i128,
    pub events: Vec<SwapEventSummary>,
    pub dry_run: bool,
}

impl SwapOutcome {
    pub fn realized_out(&self) -> u64 {
        u64::try_from(self.output_delta.max(0)).unwrap_or(u64::MAX)
    }

    pub fn meets_min_out(&self) -> bool {
        self.realized_out() >= self.min_amount_out
    }

    pub fn explorer_url(&self) -> String {
        format!("{EXPLORER_TX_URL}/{}", self.digest)
    }
}

impl fmt::Display for SwapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "success" } else { "failure" };
        write!(
            f,
            "{} [{}] in={} out={} min_out={}",
            self.digest, status, self.amount_in, self.realized_out(), self.min_amount_out
        )?;
        if let Some(err) = &self.error {
            write!(f, " error={err}")?;
        }
        Ok(())
    }
}

pub struct SwapExecutor {
    ledger: Arc<dyn LedgerClient>,
    pair: TradingPair,
    gas_budget: u64,
    dry_run: bool,
}

impl SwapExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, pair: TradingPair, gas_budget: u64, dry_run: bool) -> Self {
        Self { ledger, pair, gas_budget, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Submit with the fixed gas budget and wait for settlement.
    pub async fn execute(
        &self,
        tx: TransactionBlock,
        direction: SwapDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<SwapOutcome> {
        info!(
            label = %self.pair.label(direction),
            amount_in,
            gas_budget = self.gas_budget,
            dry_run = self.dry_run,
            "Submitting swap transaction"
        );
        let response = if self.dry_run {
            self.ledger.dry_run(tx, self.gas_budget).await?
        } else {
            self.ledger.execute(tx, self.gas_budget).await?
        };
        Ok(self.interpret(&response, direction, amount_in, min_amount_out))
    }

    pub fn interpret(
        &self,
        response: &TransactionResponse,
        direction: SwapDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> SwapOutcome {
        let status = response.status();
        let input = self.pair.input(direction);
        let output = self.pair.output(direction);
        let owner = self.ledger.address();

        let delta_of = |coin_type: &str| -> i128 {
            response
                .balance_changes
                .iter()
                .filter(|c| is_owner(c.owner_address(), &owner) && same_coin_type(&c.coin_type, coin_type))
                .map(|c| c.amount())
                .sum()
        };

        let outcome = SwapOutcome {
            digest: response.digest.clone(),
            success: status.is_success(),
            error: if status.is_success() { None } else { status.error.clone().or(Some(status.status.clone())) },
            direction,
            amount_in,
            min_amount_out,
            input_delta: delta_of(&input.coin_type),
            output_delta: delta_of(&output.coin_type),
            events: response.events.iter().filter_map(swap_event).collect(),
            dry_run: self.dry_run,
        };

        if !outcome.success {
            error!(
                digest = %outcome.digest,
                reason = outcome.error.as_deref().unwrap_or("unknown"),
                "Transaction failed"
            );
            return outcome;
        }

        info!(digest = %outcome.digest, url = %outcome.explorer_url(), dry_run = self.dry_run, "Transaction executed");
        for (asset, delta) in [(input, outcome.input_delta), (output, outcome.output_delta)] {
            info!(
                asset = %asset,
                change = format!("{:.6}", delta as f64 / asset.unit()),
                "Balance change"
            );
        }
        for event in &outcome.events {
            info!(event_type = %event.event_type, amount = event.amount.as_deref().unwrap_or("-"), "Swap event");
        }

        if outcome.meets_min_out() {
            info!(realized = outcome.realized_out(), min_out = min_amount_out, "Swap output confirmed");
        } else {
            warn!(
                realized = outcome.realized_out(),
                min_out = min_amount_out,
                "Realized output below minimum"
            );
        }
        outcome
    }
}

fn is_owner(owner: Option<&str>, expected: &SuiAddress) -> bool {
    owner
        .and_then(|o| o.parse::<SuiAddress>().ok())
        .is_some_and(|a| a == *expected)
}

fn swap_event(event: &SuiEvent) -> Option<SwapEventSummary> {
    let t = &event.event_type;
    if !(t.contains("SwapEvent") || t.contains("::trade::")) {
        return None;
    }
    let amount = match event.parsed_json.get("amount_y") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Some(SwapEventSummary { event_type: t.clone(), amount })
}
