//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the reloader daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reloader daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReloaderConfig {
    /// Reload runtime sizing.
    pub runtime: RuntimeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Backoff used by listening loaders.
    pub retry: RetryConfig,

    /// Defaults shared by the file and HTTP sources.
    pub sources: SourcesConfig,

    /// Resources to keep reloaded.
    pub services: Vec<ServiceConfig>,
}

/// Reload runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on reloads running at the same time.
    pub max_concurrent_reloads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reloads: 16,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Retry configuration for listening loaders.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First delay after a failed attempt, in milliseconds.
    pub initial_delay_ms: u64,

    /// Growth factor applied to each subsequent delay. Must be at least 1.0.
    pub multiplier: f64,

    /// Total time a retry sequence may spend waiting, in milliseconds.
    pub max_total_wait_ms: u64,

    /// Random spread applied to each delay, 0.0 to 1.0.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_total_wait_ms: 60_000,
            jitter_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Request timeout for HTTP resources.
    pub http_timeout_secs: u64,

    /// Poll interval for the file watcher backend, where it polls.
    pub file_poll_interval_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            file_poll_interval_ms: 2_000,
        }
    }
}

/// How a resource's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Text,
    Json,
    Toml,
}

/// What drives reloads of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    #[default]
    Poll,
    Listen,
}

/// One reloadable resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier for logging/metrics.
    pub name: String,

    /// Local file to read. Exclusive with `url`.
    pub path: Option<String>,

    /// HTTP(S) resource to fetch. Exclusive with `path`.
    pub url: Option<String>,

    #[serde(default)]
    pub format: PayloadFormat,

    #[serde(default)]
    pub mode: ReloadMode,

    /// Poll period in seconds (poll mode, default 60).
    pub interval_secs: Option<u64>,

    /// Cron expression with a leading seconds field (poll mode).
    pub cron: Option<String>,
}
