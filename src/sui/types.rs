//! Sui wire types.
//!
//! Two families live here: the BCS-serialized transaction structures
//! (variant order is part of the wire format and must not change), and
//! the JSON-RPC response shapes returned by a full node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::MomentumError;

// ---------------------------------------------------------------------------
// Addresses, objects, digests
// ---------------------------------------------------------------------------

/// Native coin; gas is paid in it.
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// 32-byte account or object address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SuiAddress(pub [u8; 32]);

/// Objects share the address space.
pub type ObjectId = SuiAddress;

impl SuiAddress {
    pub const ZERO: SuiAddress = SuiAddress([0u8; 32]);

    /// Canonical `0x` + 64 hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for SuiAddress {
    type Err = MomentumError;

    /// Accepts short forms such as `0x2` by left-padding with zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim().strip_prefix("0x").unwrap_or(s.trim());
        if body.is_empty() || body.len() > 64 {
            return Err(MomentumError::Parse(format!("bad address length: {s}")));
        }
        let padded = format!("{body:0>64}");
        let bytes = hex::decode(&padded).map_err(|e| MomentumError::Parse(format!("{s}: {e}")))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(SuiAddress(out))
    }
}

impl fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Object digest; serialized length-prefixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDigest(pub Vec<u8>);

impl ObjectDigest {
    /// Decode the base58 form used by JSON-RPC.
    pub fn from_base58(s: &str) -> Result<Self, MomentumError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| MomentumError::Parse(format!("digest {s}: {e}")))?;
        if bytes.len() != 32 {
            return Err(MomentumError::Parse(format!("digest {s} is {} bytes", bytes.len())));
        }
        Ok(ObjectDigest(bytes))
    }
}

/// `(id, version, digest)`.
pub type ObjectRef = (ObjectId, u64, ObjectDigest);

// ---------------------------------------------------------------------------
// Move types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructTag {
    pub address: SuiAddress,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

impl FromStr for TypeTag {
    type Err = MomentumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let primitive = match s {
            "bool" => Some(TypeTag::Bool),
            "u8" => Some(TypeTag::U8),
            "u16" => Some(TypeTag::U16),
            "u32" => Some(TypeTag::U32),
            "u64" => Some(TypeTag::U64),
            "u128" => Some(TypeTag::U128),
            "u256" => Some(TypeTag::U256),
            "address" => Some(TypeTag::Address),
            "signer" => Some(TypeTag::Signer),
            _ => None,
        };
        if let Some(tag) = primitive {
            return Ok(tag);
        }
        if let Some(inner) = s.strip_prefix("vector<").and_then(|r| r.strip_suffix('>')) {
            return Ok(TypeTag::Vector(Box::new(inner.parse()?)));
        }
        Ok(TypeTag::Struct(Box::new(s.parse()?)))
    }
}

impl FromStr for StructTag {
    type Err = MomentumError;

    /// `addr::module::Name` or `addr::module::Name<T1, T2>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (head, params) = match s.find('<') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix('>')
                    .ok_or_else(|| MomentumError::Parse(format!("unbalanced type: {s}")))?;
                (&s[..open], split_type_params(inner)?)
            }
            None => (s, Vec::new()),
        };

        let mut parts = head.split("::");
        let (Some(address), Some(module), Some(name), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(MomentumError::Parse(format!("expected addr::module::Name, got {s}")));
        };

        let type_params = params
            .into_iter()
            .map(|p| p.parse())
            .collect::<Result<Vec<TypeTag>, _>>()?;

        Ok(StructTag {
            address: address.parse()?,
            module: module.to_string(),
            name: name.to_string(),
            type_params,
        })
    }
}

/// Split `A, B<C, D>, E` at top-level commas.
fn split_type_params(s: &str) -> Result<Vec<&str>, MomentumError> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                out.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err(MomentumError::Parse(format!("unbalanced type params: {s}")));
        }
    }
    if depth != 0 {
        return Err(MomentumError::Parse(format!("unbalanced type params: {s}")));
    }
    out.push(s[start..].trim());
    Ok(out.into_iter().filter(|p| !p.is_empty()).collect())
}

/// Compare coin types regardless of address padding
/// (`0x2::sui::SUI` vs `0x000…0002::sui::SUI`).
pub fn same_coin_type(a: &str, b: &str) -> bool {
    match (a.parse::<TypeTag>(), b.parse::<TypeTag>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Programmable transactions (BCS)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(ObjectRef),
    SharedObject {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    /// The `index`-th value of a multi-value command result.
    /// Anything other than `Result` is returned unchanged.
    pub fn nested(self, index: u16) -> Argument {
        match self {
            Argument::Result(cmd) => Argument::NestedResult(cmd, index),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasData {
    pub payment: Vec<ObjectRef>,
    pub owner: SuiAddress,
    pub price: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionExpiration {
    None,
    Epoch(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: SuiAddress,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

impl TransactionData {
    pub fn new(pt: ProgrammableTransaction, sender: SuiAddress, gas_data: GasData) -> Self {
        TransactionData::V1(TransactionDataV1 {
            kind: TransactionKind::ProgrammableTransaction(pt),
            sender,
            gas_data,
            expiration: TransactionExpiration::None,
        })
    }

    pub fn to_bcs(&self) -> Result<Vec<u8>, MomentumError> {
        bcs::to_bytes(self).map_err(|e| MomentumError::Build(format!("BCS encoding failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub coin_type: String,
    #[serde(default)]
    pub coin_object_count: u64,
    pub total_balance: String,
}

/// One coin object owned by the sender.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinObject {
    pub coin_type: String,
    pub coin_object_id: String,
    pub version: String,
    pub digest: String,
    pub balance: String,
}

impl CoinObject {
    pub fn balance(&self) -> u64 {
        self.balance.parse().unwrap_or(0)
    }

    pub fn object_ref(&self) -> Result<ObjectRef, MomentumError> {
        let version = self
            .version
            .parse()
            .map_err(|_| MomentumError::Parse(format!("coin version {}", self.version)))?;
        Ok((self.coin_object_id.parse()?, version, ObjectDigest::from_base58(&self.digest)?))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPage {
    #[serde(default)]
    pub data: Vec<CoinObject>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// `sui_getObject` result with owner and type shown.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectResponse {
    pub data: Option<ObjectInfo>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub object_id: String,
    pub version: String,
    pub digest: String,
    #[serde(rename = "type", default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub owner: Option<serde_json::Value>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl ObjectInfo {
    /// `Some(initial_shared_version)` for shared objects.
    pub fn initial_shared_version(&self) -> Option<u64> {
        let v = self.owner.as_ref()?.get("Shared")?.get("initial_shared_version")?;
        v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    }

    pub fn object_ref(&self) -> Result<ObjectRef, MomentumError> {
        let version = self
            .version
            .parse()
            .map_err(|_| MomentumError::Parse(format!("object version {}", self.version)))?;
        Ok((self.object_id.parse()?, version, ObjectDigest::from_base58(&self.digest)?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionStatus {
    pub status: String,
    pub error: Option<String>,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
    pub gas_used: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub owner: serde_json::Value,
    pub coin_type: String,
    /// Signed decimal string.
    pub amount: String,
}

impl BalanceChange {
    pub fn amount(&self) -> i128 {
        self.amount.parse().unwrap_or(0)
    }

    pub fn owner_address(&self) -> Option<&str> {
        self.owner.get("AddressOwner").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub parsed_json: serde_json::Value,
}

/// Result of `sui_executeTransactionBlock` or `sui_dryRunTransactionBlock`.
/// Dry runs carry no digest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionResponse {
    pub digest: String,
    pub effects: Option<TransactionEffects>,
    pub events: Vec<SuiEvent>,
    pub balance_changes: Vec<BalanceChange>,
    pub object_changes: Vec<serde_json::Value>,
}

impl TransactionResponse {
    pub fn status(&self) -> ExecutionStatus {
        self.effects.as_ref().map(|e| e.status.clone()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
