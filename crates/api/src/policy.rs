use alloy_primitives::Address;
use guard_credentials::OperatorType;
use guard_state::{PoolInfo, ValidatorInfo, WITHDRAWAL_PREFIX_EXECUTION};

use crate::error::GuardApiError;

/// Decides whether a credential may point a validator's rewards at the
/// proposed fee recipient.
///
/// Pool membership is checked first: a pool validator's fee recipient must be
/// the node's distributor or the protocol rewards pool no matter whose
/// credential carries it, which is what turns a solo credential fronting for
/// a pool validator into a conflict rather than a plain denial. A pool
/// credential never touches validators outside the registry. The solo branch
/// requires an 0x01 withdrawal credential and otherwise leaves the choice of
/// fee recipient to the operator.
pub fn check_fee_recipient(
    operator_type: OperatorType,
    validator: &ValidatorInfo,
    pool_info: Option<&PoolInfo>,
    proposed: Address,
    rewards_pool: Address,
) -> Result<(), GuardApiError> {
    match pool_info {
        Some(info) => {
            if proposed != info.expected_fee_recipient && proposed != rewards_pool {
                return Err(GuardApiError::FeeRecipientMismatch {
                    actual: proposed,
                    expected: info.expected_fee_recipient,
                });
            }
            if operator_type == OperatorType::Pool {
                return Ok(());
            }
            // A solo credential naming a pool validator with an acceptable
            // fee recipient still has to satisfy the solo rules below.
        }
        None => {
            if operator_type == OperatorType::Pool {
                return Err(GuardApiError::NonPoolValidator);
            }
        }
    }

    if validator.withdrawal_prefix() != WITHDRAWAL_PREFIX_EXECUTION {
        return Err(GuardApiError::SoloWithdrawalPrefix(validator.pubkey));
    }

    Ok(())
}
