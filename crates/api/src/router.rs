use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::header::{CONTENT_LENGTH, TRANSFER_ENCODING},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use bytes::Bytes;
use guard_common::metrics::MetricsRegistry;
use guard_credentials::AuthenticatedCredential;
use guard_state::{ConsensusLayer, ExecutionLayer, ValidatorPubkey};
use tracing::{debug, warn};

use crate::{
    authentication::{authenticate_request, Auth},
    error::GuardApiError,
    policy::check_fee_recipient,
    proxy::UpstreamProxy,
    types::{PrepareBeaconProposerItem, ValidatorRegistrationItem},
};

pub const PATH_PREPARE_BEACON_PROPOSER: &str = "/eth/v1/validator/prepare_beacon_proposer";
pub const PATH_REGISTER_VALIDATOR: &str = "/eth/v1/validator/register_validator";

/// Fronts the upstream beacon node. The two reward-critical endpoints get
/// their bodies inspected item by item; everything else streams through.
pub struct GuardApi<CL, EL> {
    cl: Arc<CL>,
    el: Arc<EL>,
    proxy: UpstreamProxy,
    max_body_bytes: usize,
    metrics: MetricsRegistry,
}

impl<CL: ConsensusLayer, EL: ExecutionLayer> GuardApi<CL, EL> {
    pub fn new(cl: Arc<CL>, el: Arc<EL>, proxy: UpstreamProxy, max_body_bytes: usize) -> Self {
        Self { cl, el, proxy, max_body_bytes, metrics: MetricsRegistry::new("router") }
    }

    pub async fn prepare_beacon_proposer(
        Extension(api): Extension<Arc<GuardApi<CL, EL>>>,
        Extension(ac): Extension<AuthenticatedCredential>,
        req: Request,
    ) -> Response {
        let _timer = api.metrics.histogram("prepare_beacon_proposer_seconds").start_timer();
        match api.guard_prepare_beacon_proposer(&ac, req).await {
            Ok(response) => api.forwarded(response),
            Err(err) => api.denied(&ac, err),
        }
    }

    pub async fn register_validator(
        Extension(api): Extension<Arc<GuardApi<CL, EL>>>,
        Extension(ac): Extension<AuthenticatedCredential>,
        req: Request,
    ) -> Response {
        let _timer = api.metrics.histogram("register_validator_seconds").start_timer();
        match api.guard_register_validator(&ac, req).await {
            Ok(response) => api.forwarded(response),
            Err(err) => api.denied(&ac, err),
        }
    }

    /// Everything that is not reward-critical streams through untouched.
    pub async fn passthrough(
        Extension(api): Extension<Arc<GuardApi<CL, EL>>>,
        req: Request,
    ) -> Response {
        let _timer = api.metrics.histogram("passthrough_seconds").start_timer();
        let (parts, body) = req.into_parts();
        // Bodyless requests must not go out with a chunked body.
        let body = if parts.headers.contains_key(CONTENT_LENGTH) ||
            parts.headers.contains_key(TRANSFER_ENCODING)
        {
            reqwest::Body::wrap_stream(body.into_data_stream())
        } else {
            reqwest::Body::from(Bytes::new())
        };
        match api.proxy.forward(parts, body).await {
            Ok(response) => api.forwarded(response),
            Err(err) => {
                api.metrics.counter(err.kind()).inc();
                warn!(%err, "passthrough failed");
                err.into_response()
            }
        }
    }

    /// Items are keyed by validator index. Parsing works on a copy; the
    /// original bytes are what gets forwarded.
    async fn guard_prepare_beacon_proposer(
        &self,
        ac: &AuthenticatedCredential,
        req: Request,
    ) -> Result<Response, GuardApiError> {
        let (parts, body) = req.into_parts();
        let bytes = read_body(body, self.max_body_bytes).await?;

        let items: Vec<PrepareBeaconProposerItem> = serde_json::from_slice(&bytes)?;
        for item in &items {
            let validator = self
                .cl
                .validator_by_index(item.validator_index)
                .await?
                .ok_or(GuardApiError::UnknownValidatorIndex(item.validator_index))?;
            let pool_info = self.el.pool_info(&validator.pubkey).await?;

            check_fee_recipient(
                ac.credential.operator_type,
                &validator,
                pool_info.as_ref(),
                item.fee_recipient,
                self.el.rewards_pool_address(),
            )?;
        }

        self.proxy.forward(parts, bytes.into()).await
    }

    /// Items are keyed by public key. Signatures stream through unverified;
    /// the upstream beacon checks them.
    async fn guard_register_validator(
        &self,
        ac: &AuthenticatedCredential,
        req: Request,
    ) -> Result<Response, GuardApiError> {
        let (parts, body) = req.into_parts();
        let bytes = read_body(body, self.max_body_bytes).await?;

        let items: Vec<ValidatorRegistrationItem> = serde_json::from_slice(&bytes)?;
        for item in &items {
            let pubkey = ValidatorPubkey::from_hex(&item.message.pubkey)?;
            let validator = self
                .cl
                .validator_by_pubkey(&pubkey)
                .await?
                .ok_or(GuardApiError::UnknownValidator(pubkey))?;
            let pool_info = self.el.pool_info(&pubkey).await?;

            check_fee_recipient(
                ac.credential.operator_type,
                &validator,
                pool_info.as_ref(),
                item.message.fee_recipient,
                self.el.rewards_pool_address(),
            )?;
        }

        self.proxy.forward(parts, bytes.into()).await
    }

    fn forwarded(&self, response: Response) -> Response {
        self.metrics.counter("forwarded").inc();
        response
    }

    fn denied(&self, ac: &AuthenticatedCredential, err: GuardApiError) -> Response {
        self.metrics.counter(err.kind()).inc();
        debug!(node = %ac.credential.node_id, %err, "request denied");
        err.into_response()
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, GuardApiError> {
    to_bytes(body, limit).await.map_err(|_| GuardApiError::BodyTooLarge)
}

pub fn build_router<CL: ConsensusLayer, EL: ExecutionLayer>(
    api: Arc<GuardApi<CL, EL>>,
    auth: Arc<Auth>,
) -> Router {
    // Non-POST methods on the guarded paths are not reward-critical and
    // proxy through like any other route.
    Router::new()
        .route(
            PATH_PREPARE_BEACON_PROPOSER,
            post(GuardApi::<CL, EL>::prepare_beacon_proposer)
                .fallback(GuardApi::<CL, EL>::passthrough),
        )
        .route(
            PATH_REGISTER_VALIDATOR,
            post(GuardApi::<CL, EL>::register_validator)
                .fallback(GuardApi::<CL, EL>::passthrough),
        )
        .fallback(GuardApi::<CL, EL>::passthrough)
        .layer(middleware::from_fn_with_state(auth, authenticate_request))
        .layer(Extension(api))
}
