use alloy_primitives::Address;
use serde::Deserialize;

/// Body element of `POST /eth/v1/validator/prepare_beacon_proposer`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PrepareBeaconProposerItem {
    #[serde(with = "quoted_u64")]
    pub validator_index: u64,
    pub fee_recipient: Address,
}

/// Body element of `POST /eth/v1/validator/register_validator`.
///
/// The pubkey stays a string: it is re-parsed by hand so a bad key surfaces
/// the validator-pubkey parser's message rather than a serde one. The
/// signature is passed through untouched, upstream verifies it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ValidatorRegistrationItem {
    pub message: ValidatorRegistrationMessage,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ValidatorRegistrationMessage {
    pub pubkey: String,
    pub fee_recipient: Address,
    pub gas_limit: String,
    pub timestamp: String,
}

mod quoted_u64 {
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        value.parse().map_err(Error::custom)
    }
}
