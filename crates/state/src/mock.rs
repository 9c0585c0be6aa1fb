//! Deterministic seeded state for tests: a validator set with a pool slice
//! spread over a handful of node operators, the rest solo stakers with mixed
//! withdrawal credential types.

use std::sync::Arc;

use alloy_primitives::{Address, B256};

use crate::{
    memory::{MemoryConsensusLayer, MemoryExecutionLayer},
    types::{PoolInfo, ValidatorInfo, ValidatorPubkey, PUBKEY_LEN, WITHDRAWAL_PREFIX_EXECUTION},
};

pub struct MockState {
    pub consensus: Arc<MemoryConsensusLayer>,
    pub execution: Arc<MemoryExecutionLayer>,
    pub node_addresses: Vec<Address>,
    pub pool_members: Vec<(ValidatorInfo, PoolInfo)>,
    pub solo_validators: Vec<ValidatorInfo>,
}

impl MockState {
    /// Seeds `validator_count` validators; the first `pool_member_count` are
    /// pool members assigned round-robin to `node_count` operators. The
    /// remaining validators alternate between 0x01 and BLS withdrawal
    /// credentials.
    pub fn seeded(
        validator_count: u64,
        pool_member_count: u64,
        node_count: u64,
        rewards_pool_address: Address,
    ) -> Self {
        assert!(pool_member_count <= validator_count);
        assert!(node_count > 0);

        let consensus = Arc::new(MemoryConsensusLayer::new());
        let execution = Arc::new(MemoryExecutionLayer::new(rewards_pool_address));

        let node_addresses: Vec<Address> = (0..node_count).map(mock_node_address).collect();

        let mut pool_members = Vec::new();
        let mut solo_validators = Vec::new();

        for index in 0..validator_count {
            if index < pool_member_count {
                let validator = ValidatorInfo {
                    index,
                    pubkey: mock_pubkey(index),
                    withdrawal_credentials: bls_credentials(index),
                };
                let node = index % node_count;
                let info = PoolInfo {
                    node_address: node_addresses[node as usize],
                    expected_fee_recipient: mock_distributor_address(node),
                };
                consensus.insert(validator);
                execution.insert(validator.pubkey, info);
                pool_members.push((validator, info));
            } else {
                let withdrawal_credentials = if index % 2 == 0 {
                    execution_credentials(index)
                } else {
                    bls_credentials(index)
                };
                let validator =
                    ValidatorInfo { index, pubkey: mock_pubkey(index), withdrawal_credentials };
                consensus.insert(validator);
                solo_validators.push(validator);
            }
        }

        Self { consensus, execution, node_addresses, pool_members, solo_validators }
    }

    pub fn solo_with_execution_credentials(&self) -> ValidatorInfo {
        *self
            .solo_validators
            .iter()
            .find(|v| v.withdrawal_prefix() == WITHDRAWAL_PREFIX_EXECUTION)
            .expect("seeded state has an 0x01 solo validator")
    }

    pub fn solo_with_bls_credentials(&self) -> ValidatorInfo {
        *self
            .solo_validators
            .iter()
            .find(|v| v.withdrawal_prefix() != WITHDRAWAL_PREFIX_EXECUTION)
            .expect("seeded state has a BLS solo validator")
    }
}

pub fn mock_pubkey(index: u64) -> ValidatorPubkey {
    let mut bytes = [0u8; PUBKEY_LEN];
    bytes[0] = 0xb0;
    bytes[PUBKEY_LEN - 8..].copy_from_slice(&index.to_be_bytes());
    ValidatorPubkey::new(bytes)
}

pub fn mock_node_address(node: u64) -> Address {
    tagged_address(0xaa, node)
}

pub fn mock_distributor_address(node: u64) -> Address {
    tagged_address(0xd1, node)
}

fn tagged_address(tag: u8, index: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = tag;
    bytes[12..].copy_from_slice(&index.to_be_bytes());
    Address::from_slice(&bytes)
}

fn bls_credentials(index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&index.to_be_bytes());
    B256::from(bytes)
}

fn execution_credentials(index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = WITHDRAWAL_PREFIX_EXECUTION;
    let withdrawal = tagged_address(0xcc, index);
    bytes[12..].copy_from_slice(withdrawal.as_slice());
    B256::from(bytes)
}
