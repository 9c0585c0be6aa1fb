use alloy_primitives::Address;
use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use guard_credentials::CredentialError;
use guard_state::{PubkeyError, StateError, ValidatorPubkey};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Hint sent with the solo backoff so clients retry once the operator may
/// have re-enabled solo traffic.
pub(crate) const SOLO_RETRY_AFTER_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum GuardApiError {
    #[error("authentication failed, malformed credentials: {0}")]
    MalformedCredentials(#[source] CredentialError),

    #[error("authentication failed, invalid credentials: {0}")]
    InvalidCredentials(#[source] CredentialError),

    #[error("authentication failed, expired credentials")]
    ExpiredCredentials,

    #[error("solo validators are currently disabled, retry later")]
    SoloValidatorsDisabled,

    #[error("{0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("error parsing pubkey from request body: {0}")]
    PubkeyParse(#[from] PubkeyError),

    #[error("request body too large")]
    BodyTooLarge,

    #[error("unknown validator index {0}")]
    UnknownValidatorIndex(u64),

    #[error("unknown validator {0}")]
    UnknownValidator(ValidatorPubkey),

    #[error("attempting to set fee recipient for a non-pool validator")]
    NonPoolValidator,

    #[error("attempting to set fee recipient for validator {0} without 0x01 withdrawal credentials")]
    SoloWithdrawalPrefix(ValidatorPubkey),

    #[error("actual fee recipient {actual:#x} didn't match expected fee recipient {expected:#x}")]
    FeeRecipientMismatch { actual: Address, expected: Address },

    #[error("upstream unavailable")]
    UpstreamUnavailable,

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("internal server error")]
    State(#[from] StateError),
}

impl GuardApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardApiError::MalformedCredentials(_) |
            GuardApiError::InvalidCredentials(_) |
            GuardApiError::ExpiredCredentials => StatusCode::UNAUTHORIZED,
            GuardApiError::SoloValidatorsDisabled => StatusCode::TOO_MANY_REQUESTS,
            GuardApiError::JsonParse(_) |
            GuardApiError::PubkeyParse(_) |
            GuardApiError::UnknownValidatorIndex(_) |
            GuardApiError::UnknownValidator(_) => StatusCode::BAD_REQUEST,
            GuardApiError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GuardApiError::NonPoolValidator | GuardApiError::SoloWithdrawalPrefix(_) => {
                StatusCode::FORBIDDEN
            }
            GuardApiError::FeeRecipientMismatch { .. } => StatusCode::CONFLICT,
            GuardApiError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            GuardApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GuardApiError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status translation for the gRPC mirror of this surface.
    pub fn grpc_code(&self) -> tonic::Code {
        match self {
            GuardApiError::MalformedCredentials(_) | GuardApiError::InvalidCredentials(_) => {
                tonic::Code::Unauthenticated
            }
            GuardApiError::ExpiredCredentials => tonic::Code::PermissionDenied,
            GuardApiError::SoloValidatorsDisabled | GuardApiError::BodyTooLarge => {
                tonic::Code::ResourceExhausted
            }
            GuardApiError::JsonParse(_) |
            GuardApiError::PubkeyParse(_) |
            GuardApiError::UnknownValidatorIndex(_) |
            GuardApiError::UnknownValidator(_) => tonic::Code::InvalidArgument,
            GuardApiError::NonPoolValidator | GuardApiError::SoloWithdrawalPrefix(_) => {
                tonic::Code::FailedPrecondition
            }
            GuardApiError::FeeRecipientMismatch { .. } => tonic::Code::Aborted,
            GuardApiError::UpstreamUnavailable => tonic::Code::Unavailable,
            GuardApiError::UpstreamTimeout => tonic::Code::DeadlineExceeded,
            GuardApiError::State(_) => tonic::Code::Internal,
        }
    }

    /// Label used for the per-outcome router counters.
    pub fn kind(&self) -> &'static str {
        match self {
            GuardApiError::MalformedCredentials(_) => "malformed_credentials",
            GuardApiError::InvalidCredentials(_) => "invalid_credentials",
            GuardApiError::ExpiredCredentials => "expired_credentials",
            GuardApiError::SoloValidatorsDisabled => "solo_disabled",
            GuardApiError::JsonParse(_) => "json_parse",
            GuardApiError::PubkeyParse(_) => "pubkey_parse",
            GuardApiError::BodyTooLarge => "body_too_large",
            GuardApiError::UnknownValidatorIndex(_) | GuardApiError::UnknownValidator(_) => {
                "unknown_validator"
            }
            GuardApiError::NonPoolValidator => "non_pool_validator",
            GuardApiError::SoloWithdrawalPrefix(_) => "withdrawal_prefix",
            GuardApiError::FeeRecipientMismatch { .. } => "fee_recipient_mismatch",
            GuardApiError::UpstreamUnavailable => "upstream_unavailable",
            GuardApiError::UpstreamTimeout => "upstream_timeout",
            GuardApiError::State(_) => "state_lookup",
        }
    }
}

impl IntoResponse for GuardApiError {
    fn into_response(self) -> Response {
        if let GuardApiError::State(err) = &self {
            error!(%err, "state lookup failed");
        }

        let status = self.status();
        let mut response =
            (status, Json(json!({ "error": self.to_string() }))).into_response();

        if matches!(self, GuardApiError::SoloValidatorsDisabled) {
            response.headers_mut().insert(RETRY_AFTER, SOLO_RETRY_AFTER_SECS.into());
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use guard_state::StateError;

    use super::*;

    #[test]
    fn fee_recipient_mismatch_message_is_literal() {
        let err = GuardApiError::FeeRecipientMismatch {
            actual: "0xabcf8e0d4e9587369b2301d0790347320302cc09".parse().unwrap(),
            expected: "0xd4c1f7a32ed42a03bd26d773ba0f7c2cf8d2807e".parse().unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "actual fee recipient 0xabcf8e0d4e9587369b2301d0790347320302cc09 didn't match \
             expected fee recipient 0xd4c1f7a32ed42a03bd26d773ba0f7c2cf8d2807e"
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.grpc_code(), tonic::Code::Aborted);
    }

    #[test]
    fn grpc_codes_follow_the_http_statuses() {
        assert_eq!(GuardApiError::ExpiredCredentials.grpc_code(), tonic::Code::PermissionDenied);
        assert_eq!(
            GuardApiError::SoloValidatorsDisabled.grpc_code(),
            tonic::Code::ResourceExhausted
        );
        assert_eq!(
            GuardApiError::UnknownValidatorIndex(1).grpc_code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(GuardApiError::NonPoolValidator.grpc_code(), tonic::Code::FailedPrecondition);
        assert_eq!(
            GuardApiError::State(StateError::Consensus("down".into())).grpc_code(),
            tonic::Code::Internal
        );
    }

    #[test]
    fn unknown_index_status_is_bad_request() {
        let err = GuardApiError::UnknownValidatorIndex(1010101);
        assert_eq!(err.to_string(), "unknown validator index 1010101");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
