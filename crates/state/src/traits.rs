use alloy_primitives::Address;
use async_trait::async_trait;

use crate::types::{PoolInfo, ValidatorInfo, ValidatorPubkey};

/// Lookup failure inside a backend (transport, decode), as opposed to a
/// record simply being absent. Surfaces to clients as an internal error.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("consensus layer lookup failed: {0}")]
    Consensus(String),

    #[error("execution layer lookup failed: {0}")]
    Execution(String),
}

/// Read-only view of the beacon validator set.
///
/// Implementations must be safe for concurrent readers, and lookups within a
/// single request must observe a coherent snapshot. Staleness is tolerated:
/// the worst case is a rejected request the client retries, never a payout to
/// the wrong address.
#[async_trait]
pub trait ConsensusLayer: Send + Sync + 'static {
    async fn validator_by_index(&self, index: u64) -> Result<Option<ValidatorInfo>, StateError>;

    async fn validator_by_pubkey(
        &self,
        pubkey: &ValidatorPubkey,
    ) -> Result<Option<ValidatorInfo>, StateError>;
}

/// Read-only view of pool membership on the execution layer.
#[async_trait]
pub trait ExecutionLayer: Send + Sync + 'static {
    /// Membership info for a pool validator, `None` for everyone else.
    async fn pool_info(&self, pubkey: &ValidatorPubkey) -> Result<Option<PoolInfo>, StateError>;

    /// The protocol-wide smoothing address, constant for a deployment.
    fn rewards_pool_address(&self) -> Address;
}
