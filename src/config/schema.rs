//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
///
/// Keys written in the legacy PascalCase layout (`RemoteConfigPath`,
/// `Control`, `Routers`) are accepted too. Unknown keys are rejected.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the remote routing-table source.
    /// The table itself is fetched from `<base>/routing_table`.
    #[serde(alias = "RemoteConfigPath")]
    pub remote_config_path: Option<String>,

    /// Control interface bind address (e.g., "127.0.0.1:8081").
    #[serde(alias = "Control")]
    pub control: Option<String>,

    /// Bearer token required by the control interface, if set.
    pub control_api_key: Option<String>,

    /// Reload router policies whenever the config file changes on disk.
    pub watch_config: bool,

    /// One entry per listener.
    #[serde(alias = "Routers")]
    pub routers: Vec<RouterConfig>,

    /// Remote routing-table synchronization settings.
    pub sync: SyncConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration. Doubles as the template a policy is built from.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Bind address (e.g., "0.0.0.0:8080"). Unique across listeners.
    #[serde(alias = "ListenAddr")]
    pub listen_addr: String,

    /// CIDR blocks resolved targets must fall into.
    #[serde(default, alias = "AllowedTargets")]
    pub allowed_targets: Vec<String>,

    /// Skip the allow-list entirely.
    #[serde(default, alias = "AllowArbitraryTarget")]
    pub allow_arbitrary_target: bool,

    /// Talk to backends over https instead of http.
    #[serde(default, alias = "BackendHTTPS")]
    pub backend_https: bool,

    /// Outbound port. Falls back to the scheme default when absent.
    #[serde(default, alias = "BackendPort")]
    pub backend_port: Option<u16>,
}

impl RouterConfig {
    /// A template with no allowed targets.
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            allowed_targets: Vec::new(),
            allow_arbitrary_target: false,
            backend_https: false,
            backend_port: None,
        }
    }
}

/// Parse a bind address. A bare `:port` binds every IPv4 interface.
pub fn parse_listen_addr(addr: &str) -> Option<SocketAddr> {
    if let Some(port) = addr.strip_prefix(':') {
        return format!("0.0.0.0:{port}").parse().ok();
    }
    addr.parse().ok()
}

/// Remote routing-table synchronization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum delay between two fetches, in seconds.
    pub min_delay_secs: u64,

    /// Maximum accepted size of the routing-table body.
    pub max_body_bytes: usize,

    /// Timeout for a single fetch, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 60,
            max_body_bytes: 1024 * 1024,
            fetch_timeout_secs: 10,
        }
    }
}

/// Timeout configuration for proxied traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            connect_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
