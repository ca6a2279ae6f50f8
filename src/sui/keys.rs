//! Ed25519 key material.
//!
//! Accepted formats, detected in this order:
//! - `suiprivkey1…` bech32 (flag byte + 32-byte secret, Ed25519 only)
//! - `0x` + 64 hex characters
//! - a BIP-39 mnemonic (anything containing a space), derived along
//!   `m/44'/784'/0'/0'/0'` with SLIP-0010
//! - base64 of the 32-byte secret, optionally prefixed with the flag byte

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use blake2::{digest::consts::U32, Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;
use std::fmt;
use std::fs;
use tracing::info;

use super::types::SuiAddress;
use crate::types::MomentumError;

type Blake2b256 = Blake2b<U32>;

const ED25519_FLAG: u8 = 0x00;
const BECH32_HRP: &str = "suiprivkey";
/// m/44'/784'/0'/0'/0'
const DERIVATION_PATH: [u32; 5] = [44, 784, 0, 0, 0];
const HARDENED: u32 = 0x8000_0000;

/// Which encoding a key was supplied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Bech32,
    Hex,
    Mnemonic,
    Base64,
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Bech32 => write!(f, "Sui bech32"),
            KeyFormat::Hex => write!(f, "hex"),
            KeyFormat::Mnemonic => write!(f, "mnemonic"),
            KeyFormat::Base64 => write!(f, "base64"),
        }
    }
}

pub struct SuiKeypair {
    signing: SigningKey,
    address: SuiAddress,
    format: KeyFormat,
}

impl fmt::Debug for SuiKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiKeypair")
            .field("address", &self.address)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl SuiKeypair {
    /// Read key text from `env_key` if present, else from `key_file`.
    pub fn load(env_key: Option<SecretString>, key_file: &str) -> Result<Self> {
        let secret = match env_key {
            Some(k) => k,
            None => {
                let text = fs::read_to_string(key_file)
                    .with_context(|| format!("No SUI_PRIVATE_KEY set and cannot read key file {key_file}"))?;
                SecretString::new(text)
            }
        };
        let keypair = Self::parse(secret.expose_secret())?;
        info!(format = %keypair.format, address = %keypair.address, "Wallet loaded");
        Ok(keypair)
    }

    pub fn parse(text: &str) -> Result<Self, MomentumError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MomentumError::KeyFormat("empty key".into()));
        }

        if text.starts_with(BECH32_HRP) {
            Ok(Self::from_secret(decode_bech32(text)?, KeyFormat::Bech32))
        } else if let Some(hex_body) = text.strip_prefix("0x") {
            if hex_body.len() != 64 {
                return Err(MomentumError::KeyFormat(format!(
                    "expected 64 hex characters, got {}",
                    hex_body.len()
                )));
            }
            let bytes = hex::decode(hex_body).map_err(|e| MomentumError::KeyFormat(e.to_string()))?;
            Ok(Self::from_secret(to_array(&bytes)?, KeyFormat::Hex))
        } else if text.contains(' ') {
            Ok(Self::from_secret(derive_from_mnemonic(text)?, KeyFormat::Mnemonic))
        } else {
            let bytes = STANDARD
                .decode(text)
                .map_err(|e| MomentumError::KeyFormat(format!("not base64: {e}")))?;
            let secret = match bytes.len() {
                32 => to_array(&bytes)?,
                33 if bytes[0] == ED25519_FLAG => to_array(&bytes[1..])?,
                n => {
                    return Err(MomentumError::KeyFormat(format!(
                        "expected 32 bytes of base64, got {n}"
                    )))
                }
            };
            Ok(Self::from_secret(secret, KeyFormat::Base64))
        }
    }

    pub fn from_secret(secret: [u8; 32], format: KeyFormat) -> Self {
        let signing = SigningKey::from_bytes(&secret);
        let address = address_of(&signing.verifying_key().to_bytes());
        Self { signing, address, format }
    }

    pub fn address(&self) -> SuiAddress {
        self.address
    }

    pub fn format(&self) -> KeyFormat {
        self.format
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Sign BCS transaction bytes; returns the base64 serialized signature
    /// (`flag ‖ signature ‖ public key`).
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        // TransactionData intent: scope 0, version 0, app 0
        let mut message = Vec::with_capacity(3 + tx_bytes.len());
        message.extend_from_slice(&[0, 0, 0]);
        message.extend_from_slice(tx_bytes);
        let digest: [u8; 32] = Blake2b256::digest(&message).into();

        let signature = self.signing.sign(&digest);
        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(&self.public_key());
        STANDARD.encode(serialized)
    }
}

/// Blake2b-256(flag ‖ public key).
pub fn address_of(public_key: &[u8; 32]) -> SuiAddress {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    SuiAddress(hasher.finalize().into())
}

fn to_array(bytes: &[u8]) -> Result<[u8; 32], MomentumError> {
    bytes
        .try_into()
        .map_err(|_| MomentumError::KeyFormat(format!("expected 32 bytes, got {}", bytes.len())))
}

fn decode_bech32(text: &str) -> Result<[u8; 32], MomentumError> {
    let (hrp, data) = bech32::decode(text).map_err(|e| MomentumError::KeyFormat(e.to_string()))?;
    if hrp.as_str() != BECH32_HRP {
        return Err(MomentumError::KeyFormat(format!("unexpected prefix {}", hrp.as_str())));
    }
    match data.split_first() {
        Some((&ED25519_FLAG, secret)) => to_array(secret),
        Some((flag, _)) => Err(MomentumError::KeyFormat(format!(
            "unsupported key scheme flag {flag}, only ED25519 is supported"
        ))),
        None => Err(MomentumError::KeyFormat("empty bech32 payload".into())),
    }
}

fn derive_from_mnemonic(phrase: &str) -> Result<[u8; 32], MomentumError> {
    let mnemonic = bip39::Mnemonic::parse_normalized(phrase)
        .map_err(|e| MomentumError::KeyFormat(format!("mnemonic: {e}")))?;
    let seed = mnemonic.to_seed("");
    slip10_ed25519(&seed, &DERIVATION_PATH)
}

type HmacSha512 = Hmac<Sha512>;

/// SLIP-0010 ed25519 derivation; every segment is hardened.
fn slip10_ed25519(seed: &[u8], path: &[u32]) -> Result<[u8; 32], MomentumError> {
    let (mut key, mut chain) = hmac_split(b"ed25519 seed", seed)?;
    for segment in path {
        let mut data = Vec::with_capacity(37);
        data.push(0);
        data.extend_from_slice(&key);
        data.extend_from_slice(&(segment | HARDENED).to_be_bytes());
        (key, chain) = hmac_split(&chain, &data)?;
    }
    Ok(key)
}

fn hmac_split(key: &[u8], data: &[u8]) -> Result<([u8; 32], [u8; 32]), MomentumError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| MomentumError::KeyFormat(format!("hmac: {e}")))?;
    mac.update(data);
    let out = mac.finalize().into_bytes();
    Ok((to_array(&out[..32])?, to_array(&out[32..])?))
}
