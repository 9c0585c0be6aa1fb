use std::collections::HashMap;

use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    traits::{ConsensusLayer, ExecutionLayer, StateError},
    types::{PoolInfo, ValidatorInfo, ValidatorPubkey},
};

/// In-process snapshot of the validator set. An external sync process owns
/// population; request handlers only read.
#[derive(Default)]
pub struct MemoryConsensusLayer {
    inner: RwLock<ConsensusSnapshot>,
}

#[derive(Default)]
struct ConsensusSnapshot {
    by_index: HashMap<u64, ValidatorInfo>,
    index_of: HashMap<ValidatorPubkey, u64>,
}

impl MemoryConsensusLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, validator: ValidatorInfo) {
        let mut snapshot = self.inner.write();
        snapshot.index_of.insert(validator.pubkey, validator.index);
        snapshot.by_index.insert(validator.index, validator);
    }

    /// Swaps in a whole new validator set at once, so readers never observe
    /// a half-applied update.
    pub fn replace_all(&self, validators: impl IntoIterator<Item = ValidatorInfo>) {
        let mut next = ConsensusSnapshot::default();
        for validator in validators {
            next.index_of.insert(validator.pubkey, validator.index);
            next.by_index.insert(validator.index, validator);
        }
        *self.inner.write() = next;
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConsensusLayer for MemoryConsensusLayer {
    async fn validator_by_index(&self, index: u64) -> Result<Option<ValidatorInfo>, StateError> {
        Ok(self.inner.read().by_index.get(&index).copied())
    }

    async fn validator_by_pubkey(
        &self,
        pubkey: &ValidatorPubkey,
    ) -> Result<Option<ValidatorInfo>, StateError> {
        let snapshot = self.inner.read();
        Ok(snapshot.index_of.get(pubkey).and_then(|index| snapshot.by_index.get(index)).copied())
    }
}

/// In-process snapshot of the pool membership registry.
pub struct MemoryExecutionLayer {
    rewards_pool_address: Address,
    members: RwLock<HashMap<ValidatorPubkey, PoolInfo>>,
}

impl MemoryExecutionLayer {
    pub fn new(rewards_pool_address: Address) -> Self {
        Self { rewards_pool_address, members: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, pubkey: ValidatorPubkey, info: PoolInfo) {
        self.members.write().insert(pubkey, info);
    }

    pub fn replace_all(&self, members: impl IntoIterator<Item = (ValidatorPubkey, PoolInfo)>) {
        *self.members.write() = members.into_iter().collect();
    }

    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }
}

#[async_trait]
impl ExecutionLayer for MemoryExecutionLayer {
    async fn pool_info(&self, pubkey: &ValidatorPubkey) -> Result<Option<PoolInfo>, StateError> {
        Ok(self.members.read().get(pubkey).copied())
    }

    fn rewards_pool_address(&self) -> Address {
        self.rewards_pool_address
    }
}
