use alloy_primitives::Address;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::credential::{
    AuthenticatedCredential, Credential, CredentialError, OperatorType, MAC_LEN,
};

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies credential MACs under a shared secret. The secret is
/// read-only after construction, so the manager is safe to share across
/// request tasks.
pub struct CredentialManager {
    secret: Vec<u8>,
}

impl CredentialManager {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.as_bytes().to_vec() }
    }

    /// Mints a credential the way the external issuer does. Kept next to the
    /// verifier because both sides share the wire format.
    pub fn create(
        &self,
        timestamp: u64,
        node_id: Address,
        operator_type: OperatorType,
    ) -> AuthenticatedCredential {
        let credential = Credential { node_id, operator_type, timestamp };
        let mac = self.mac_for(&credential);
        AuthenticatedCredential { credential, mac }
    }

    /// Constant-time MAC check of a decoded credential.
    pub fn verify(&self, ac: &AuthenticatedCredential) -> Result<(), CredentialError> {
        let mut mac = self.keyed_mac();
        mac.update(&Self::message(&ac.credential));
        mac.verify_slice(&ac.mac).map_err(|_| CredentialError::MacMismatch)
    }

    fn mac_for(&self, credential: &Credential) -> [u8; MAC_LEN] {
        let mut mac = self.keyed_mac();
        mac.update(&Self::message(credential));
        mac.finalize().into_bytes().into()
    }

    fn keyed_mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length")
    }

    /// node_id (20) || operator type (1) || timestamp (8, big-endian)
    fn message(credential: &Credential) -> [u8; 29] {
        let mut message = [0u8; 29];
        message[..20].copy_from_slice(credential.node_id.as_slice());
        message[20] = credential.operator_type.as_byte();
        message[21..].copy_from_slice(&credential.timestamp.to_be_bytes());
        message
    }
}
