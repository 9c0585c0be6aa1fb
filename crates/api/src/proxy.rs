use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING},
        request::Parts,
        HeaderName,
    },
    response::Response,
};
use guard_common::UpstreamConfig;
use reqwest::Url;
use tracing::warn;

use crate::error::GuardApiError;

/// Thin reverse proxy over one pooled client. Bodies stream in both
/// directions; nothing is buffered here.
pub struct UpstreamProxy {
    client: reqwest::Client,
    upstream: Url,
}

impl UpstreamProxy {
    pub fn new(upstream: Url, config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self { client, upstream })
    }

    /// Forwards method, path, query, headers and body to the upstream beacon
    /// and hands the upstream response back verbatim.
    pub async fn forward(
        &self,
        parts: Parts,
        body: reqwest::Body,
    ) -> Result<Response, GuardApiError> {
        let mut url = self.upstream.clone();
        url.set_path(parts.uri.path());
        url.set_query(parts.uri.query());

        let mut request = self.client.request(parts.method, url).body(body);
        for (name, value) in &parts.headers {
            if skip_request_header(name) {
                continue;
            }
            request = request.header(name, value);
        }

        let upstream_response = request.send().await.map_err(|err| {
            warn!(%err, "upstream request failed");
            if err.is_timeout() {
                GuardApiError::UpstreamTimeout
            } else {
                GuardApiError::UpstreamUnavailable
            }
        })?;

        let mut response = Response::builder().status(upstream_response.status());
        for (name, value) in upstream_response.headers() {
            if skip_response_header(name) {
                continue;
            }
            response = response.header(name, value);
        }

        response
            .body(Body::from_stream(upstream_response.bytes_stream()))
            .map_err(|_| GuardApiError::UpstreamUnavailable)
    }
}

/// The client owns these; Authorization was already stripped during
/// authentication.
fn skip_request_header(name: &HeaderName) -> bool {
    name == HOST || name == CONTENT_LENGTH || name == CONNECTION
}

fn skip_response_header(name: &HeaderName) -> bool {
    name == TRANSFER_ENCODING || name == CONNECTION
}
