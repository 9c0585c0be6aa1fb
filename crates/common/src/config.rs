use std::fs::File;

use alloy_primitives::Address;
use clap::Parser;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Serialize, Deserialize, Clone)]
pub struct GuardConfig {
    /// TCP host:port the proxy listens on.
    pub listen_addr: String,
    /// Upstream beacon node every request is forwarded to.
    pub beacon_url: Url,
    /// Shared secret between the credential issuer and this proxy.
    pub credential_secret: String,
    /// How long after issuance a credential is accepted.
    #[serde(default = "default_auth_validity_window_secs")]
    pub auth_validity_window_secs: u64,
    /// When false, valid solo credentials are told to back off with a 429.
    #[serde(default)]
    pub enable_solo_validators: bool,
    /// Protocol-level smoothing address, always acceptable as a pool fee
    /// recipient.
    pub rewards_pool_address: Address,
    /// Separate port exposing the Prometheus surface.
    pub admin_addr: String,
    /// gRPC mirror of the HTTP path, served by a sidecar deployment.
    #[serde(default)]
    pub grpc: Option<GrpcConfig>,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GuardConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let start_config = StartConfig::parse();
        let file = File::open(start_config.config)?;
        let config: GuardConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct GrpcConfig {
    pub listen_addr: String,
    pub beacon_url: Url,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Default, Serialize, Deserialize, Clone)]
pub enum LoggingConfig {
    #[default]
    Console,
    File {
        dir_path: String,
        file_name: String,
    },
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[clap(name = "beacon-guard")]
pub struct StartConfig {
    #[clap(long, default_value = "config.yml")]
    pub config: String,
}

fn default_auth_validity_window_secs() -> u64 {
    3600
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}
