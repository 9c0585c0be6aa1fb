use alloy_primitives::Address;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// node address (20) + operator type tag (1)
const USERNAME_LEN: usize = Address::len_bytes() + 1;
/// big-endian unix seconds (8) + hmac-sha256 (32)
const PASSWORD_LEN: usize = 8 + MAC_LEN;

pub const MAC_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorType {
    Pool,
    Solo,
}

impl OperatorType {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            OperatorType::Pool => 0,
            OperatorType::Solo => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, CredentialError> {
        match byte {
            0 => Ok(OperatorType::Pool),
            1 => Ok(OperatorType::Solo),
            other => Err(CredentialError::UnknownOperatorType(other)),
        }
    }
}

/// The fields a credential commits to. Immutable once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential {
    pub node_id: Address,
    pub operator_type: OperatorType,
    /// Issuance time, unix seconds.
    pub timestamp: u64,
}

/// A credential together with the issuer's MAC over its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCredential {
    pub credential: Credential,
    pub mac: [u8; MAC_LEN],
}

impl AuthenticatedCredential {
    /// base64url(node_address || operator_type_byte)
    pub fn encode_username(&self) -> String {
        let mut raw = [0u8; USERNAME_LEN];
        raw[..Address::len_bytes()].copy_from_slice(self.credential.node_id.as_slice());
        raw[Address::len_bytes()] = self.credential.operator_type.as_byte();
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// base64url(timestamp_bigendian_8 || mac)
    pub fn encode_password(&self) -> String {
        let mut raw = [0u8; PASSWORD_LEN];
        raw[..8].copy_from_slice(&self.credential.timestamp.to_be_bytes());
        raw[8..].copy_from_slice(&self.mac);
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes the basic-auth pair. The MAC is carried over unverified;
    /// callers hand the result to [`crate::CredentialManager::verify`].
    pub fn decode(username: &str, password: &str) -> Result<Self, CredentialError> {
        if username.is_empty() || password.is_empty() {
            return Err(CredentialError::MissingField);
        }

        let raw_username = URL_SAFE_NO_PAD.decode(username)?;
        if raw_username.len() != USERNAME_LEN {
            return Err(CredentialError::UsernameLength(raw_username.len()));
        }

        let raw_password = URL_SAFE_NO_PAD.decode(password)?;
        if raw_password.len() != PASSWORD_LEN {
            return Err(CredentialError::PasswordLength(raw_password.len()));
        }

        let node_id = Address::from_slice(&raw_username[..Address::len_bytes()]);
        let operator_type = OperatorType::from_byte(raw_username[Address::len_bytes()])?;

        let mut timestamp_bytes = [0u8; 8];
        timestamp_bytes.copy_from_slice(&raw_password[..8]);
        let timestamp = u64::from_be_bytes(timestamp_bytes);

        let mut mac = [0u8; MAC_LEN];
        mac.copy_from_slice(&raw_password[8..]);

        Ok(Self { credential: Credential { node_id, operator_type, timestamp }, mac })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("username or password missing")]
    MissingField,

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed username: expected {USERNAME_LEN} bytes, got {0}")]
    UsernameLength(usize),

    #[error("malformed password: expected {PASSWORD_LEN} bytes, got {0}")]
    PasswordLength(usize),

    #[error("unknown operator type {0}")]
    UnknownOperatorType(u8),

    #[error("credential mac mismatch")]
    MacMismatch,
}
