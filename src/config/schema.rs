//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy host.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fallback identity sent upstream in place of whatever the client supplied.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) ",
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " Safari/537.36"
);

/// Root configuration for the proxy host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Forwarding behaviour of the selective proxy.
    pub proxy: ProxySettings,

    /// Where the opaque client configuration blob lives.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8584").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8584".to_string(),
            max_connections: 256,
            drain_timeout_secs: 5,
        }
    }
}

/// Settings for the `/proxy/` interception hook.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Deadline from outbound dispatch to completed relay, in milliseconds.
    pub timeout_ms: u64,

    /// User-agent sent on every forwarded request.
    pub user_agent: String,

    /// Name of the isolated session partition.
    pub partition: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            partition: "persist:proxy".to_string(),
        }
    }
}

/// Location of the persisted client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory; the platform data directory when unset.
    pub data_dir: Option<PathBuf>,

    /// Sub-directory created under `data_dir`.
    pub dir_name: String,

    /// File name of the stored document.
    pub file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            dir_name: "apt-data".to_string(),
            file_name: "config.json".to_string(),
        }
    }
}

impl StoreConfig {
    /// Resolve the full path of the stored document.
    pub fn resolve_path(&self) -> PathBuf {
        let base = self
            .data_dir
            .clone()
            .or_else(dirs::data_dir)
            .unwrap_or_else(std::env::temp_dir);
        base.join(&self.dir_name).join(&self.file_name)
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

    /// Enable metrics endpoint.
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
