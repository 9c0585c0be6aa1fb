mod memory;
pub mod mock;
mod traits;
mod types;

pub use memory::{MemoryConsensusLayer, MemoryExecutionLayer};
pub use traits::{ConsensusLayer, ExecutionLayer, StateError};
pub use types::{
    PoolInfo, PubkeyError, ValidatorInfo, ValidatorPubkey, PUBKEY_LEN, WITHDRAWAL_PREFIX_BLS,
    WITHDRAWAL_PREFIX_EXECUTION,
};
