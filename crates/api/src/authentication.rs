use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use guard_common::{metrics::MetricsRegistry, utils::utcnow_sec};
use guard_credentials::{
    AuthenticatedCredential, CredentialError, CredentialManager, OperatorType,
};
use tracing::debug;

use crate::error::GuardApiError;

/// Verifies basic-auth credentials and enforces the freshness window.
/// Stateless apart from counters, safe to share across request tasks.
pub struct Auth {
    cm: CredentialManager,
    validity_window: Duration,
    enable_solo_validators: bool,
    metrics: MetricsRegistry,
}

impl Auth {
    pub fn new(
        cm: CredentialManager,
        validity_window: Duration,
        enable_solo_validators: bool,
    ) -> Self {
        Self {
            cm,
            validity_window,
            enable_solo_validators,
            metrics: MetricsRegistry::new("authentication"),
        }
    }

    /// Returns the decoded credential if the pair is valid and current.
    /// username/password must be base64url encoded.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedCredential, GuardApiError> {
        let ac = match AuthenticatedCredential::decode(username, password) {
            Ok(ac) => ac,
            Err(err) => {
                self.metrics.counter("malformed").inc();
                return Err(GuardApiError::MalformedCredentials(err));
            }
        };

        if let Err(err) = self.cm.verify(&ac) {
            self.metrics.counter("invalid").inc();
            return Err(GuardApiError::InvalidCredentials(err));
        }

        // Freshness only applies to timestamps in the past. A future
        // timestamp either carries a valid MAC from a monotonic issuer or
        // already failed verification above.
        let now = utcnow_sec();
        let ts = ac.credential.timestamp;
        if ts <= now && now - ts > self.validity_window.as_secs() {
            self.metrics.counter("expired").inc();
            return Err(GuardApiError::ExpiredCredentials);
        }

        self.metrics.counter("valid").inc();
        Ok(ac)
    }

    fn check_solo_gate(&self, ac: &AuthenticatedCredential) -> Result<(), GuardApiError> {
        if ac.credential.operator_type == OperatorType::Solo && !self.enable_solo_validators {
            self.metrics.counter("solo_backoff").inc();
            return Err(GuardApiError::SoloValidatorsDisabled);
        }
        Ok(())
    }
}

/// Middleware in front of every route: authenticates, applies the solo gate,
/// then strips the Authorization header so credentials never reach the
/// upstream beacon.
pub async fn authenticate_request(
    State(auth): State<Arc<Auth>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let (username, password) = match basic_credentials(&req) {
        Ok(pair) => pair,
        Err(err) => {
            auth.metrics.counter("malformed").inc();
            return GuardApiError::MalformedCredentials(err).into_response();
        }
    };

    let ac = match auth.authenticate(&username, &password) {
        Ok(ac) => ac,
        Err(err) => {
            debug!(%err, "rejected credentials");
            return err.into_response();
        }
    };

    if let Err(err) = auth.check_solo_gate(&ac) {
        return err.into_response();
    }

    req.headers_mut().remove(AUTHORIZATION);
    req.extensions_mut().insert(ac);

    next.run(req).await
}

fn basic_credentials(req: &Request<Body>) -> Result<(String, String), CredentialError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(CredentialError::MissingField)?;

    let encoded = header.strip_prefix("Basic ").ok_or(CredentialError::MissingField)?;
    let decoded = STANDARD.decode(encoded)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::MissingField)?;

    let (username, password) = decoded.split_once(':').ok_or(CredentialError::MissingField)?;
    Ok((username.to_string(), password.to_string()))
}
