use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::Address;
use axum::{
    body::Body, extract::Request, http::header::AUTHORIZATION, response::Response, Router,
};
use guard_common::{utils::utcnow_sec, UpstreamConfig};
use guard_credentials::{CredentialManager, OperatorType};
use guard_state::mock::MockState;
use tokio::net::TcpListener;

use crate::{
    authentication::Auth,
    proxy::UpstreamProxy,
    router::{build_router, GuardApi},
};

pub const UPSTREAM_RESPONSE: &str = "curiouser and curiouser\n";
pub const REWARDS_POOL_ADDRESS: &str = "0xd4c1f7a32ed42a03bd26d773ba0f7c2cf8d2807e";

/// Stand-in for the upstream beacon node: answers every route with a fixed
/// body, counts hits, and reports whether an Authorization header leaked
/// through.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub async fn spawn() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = hits.clone();

        let app = Router::new().fallback(move |req: Request| {
            let hits = handler_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let saw_authorization = req.headers().contains_key(AUTHORIZATION);
                Response::builder()
                    .header("x-saw-authorization", saw_authorization.to_string())
                    .body(Body::from(UPSTREAM_RESPONSE))
                    .unwrap()
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub struct TestHarness {
    pub addr: SocketAddr,
    pub upstream: Option<MockUpstream>,
    pub state: MockState,
    pub cm: CredentialManager,
    pub client: reqwest::Client,
}

impl TestHarness {
    pub async fn spawn(enable_solo_validators: bool) -> Self {
        let upstream = MockUpstream::spawn().await;
        let url = format!("http://{}", upstream.addr);
        Self::spawn_inner(enable_solo_validators, Some(upstream), url, UpstreamConfig::default())
            .await
    }

    /// Harness whose upstream port is closed, for the 502 path.
    pub async fn spawn_unreachable_upstream() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Self::spawn_inner(true, None, format!("http://{addr}"), UpstreamConfig::default()).await
    }

    /// Harness whose upstream accepts but never answers within the proxy's
    /// deadline, for the 504 path.
    pub async fn spawn_stalled_upstream() -> Self {
        let app = Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            UPSTREAM_RESPONSE
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = UpstreamConfig { connect_timeout_ms: 1_000, request_timeout_ms: 250 };
        Self::spawn_inner(true, None, format!("http://{addr}"), config).await
    }

    async fn spawn_inner(
        enable_solo_validators: bool,
        upstream: Option<MockUpstream>,
        upstream_url: String,
        upstream_config: UpstreamConfig,
    ) -> Self {
        let rewards_pool: Address = REWARDS_POOL_ADDRESS.parse().unwrap();
        let state = MockState::seeded(100, 50, 5, rewards_pool);
        let cm = CredentialManager::new("test");

        let auth = Arc::new(Auth::new(
            CredentialManager::new("test"),
            Duration::from_secs(3600),
            enable_solo_validators,
        ));
        let proxy = UpstreamProxy::new(upstream_url.parse().unwrap(), &upstream_config).unwrap();
        let api = Arc::new(GuardApi::new(
            state.consensus.clone(),
            state.execution.clone(),
            proxy,
            4 * 1024 * 1024,
        ));
        let router = build_router(api, auth);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, upstream, state, cm, client: reqwest::Client::new() }
    }

    pub fn valid_auth(&self, solo: bool) -> (String, String) {
        let node = self.state.node_addresses[0];
        let operator_type = if solo { OperatorType::Solo } else { OperatorType::Pool };
        let ac = self.cm.create(utcnow_sec(), node, operator_type);
        (ac.encode_username(), ac.encode_password())
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn upstream_hits(&self) -> usize {
        self.upstream.as_ref().expect("harness has a live upstream").hits()
    }
}
