use std::fmt;

use alloy_primitives::{hex, Address, B256};

pub const PUBKEY_LEN: usize = 48;

/// BLS public key of a validator, kept as raw bytes. Keys arrive as hex in
/// request bodies and leave as map keys, so only hex codec and equality live
/// here.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatorPubkey([u8; PUBKEY_LEN]);

impl ValidatorPubkey {
    pub fn new(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses an optionally 0x-prefixed hex string.
    pub fn from_hex(value: &str) -> Result<Self, PubkeyError> {
        let trimmed = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);

        if trimmed.len() != PUBKEY_LEN * 2 {
            return Err(PubkeyError::InvalidLength {
                input: trimmed.to_string(),
                len: trimmed.len(),
            });
        }

        let raw = hex::decode(trimmed)
            .map_err(|source| PubkeyError::InvalidHex { input: trimmed.to_string(), source })?;

        let mut bytes = [0u8; PUBKEY_LEN];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ValidatorPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ValidatorPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PubkeyError {
    #[error("Invalid validator public key hex string {input}: invalid length {len}")]
    InvalidLength { input: String, len: usize },

    #[error("Invalid validator public key hex string {input}: {source}")]
    InvalidHex { input: String, source: hex::FromHexError },
}

/// Validator record as the consensus layer reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub index: u64,
    pub pubkey: ValidatorPubkey,
    pub withdrawal_credentials: B256,
}

pub const WITHDRAWAL_PREFIX_BLS: u8 = 0x00;
pub const WITHDRAWAL_PREFIX_EXECUTION: u8 = 0x01;

impl ValidatorInfo {
    pub fn withdrawal_prefix(&self) -> u8 {
        self.withdrawal_credentials[0]
    }

    /// Trailing 20 bytes of an 0x01 credential.
    pub fn withdrawal_address(&self) -> Option<Address> {
        if self.withdrawal_prefix() != WITHDRAWAL_PREFIX_EXECUTION {
            return None;
        }
        Some(Address::from_slice(&self.withdrawal_credentials[12..]))
    }
}

/// Pool membership record as the execution layer reports it. Validators not
/// run through the pool are simply absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
    /// Node operator that owns the validator.
    pub node_address: Address,
    /// The node's distributor contract, or the protocol rewards-pool address
    /// when the node opted into smoothing.
    pub expected_fee_recipient: Address,
}
