use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Development-only JWT secret; a warning is logged when it is in use.
pub const DEV_JWT_SECRET: &str = "pulse-dev-secret-change-me";

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

/// Token verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
}

/// Durable storage. Without `data_dir` the store is memory-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Live fan-out deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Per-observer write deadline.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    /// Deadline for the close frame sent on eviction or shutdown.
    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,
}

/// Page sizes used when a list query sends no `limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_speedtest_page_size")]
    pub speedtest_page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// When false, no counters are updated.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_addr() -> String { "0.0.0.0:1337".into() }
fn default_jwt_secret() -> String { DEV_JWT_SECRET.into() }
fn default_write_timeout() -> u64 { 10_000 }
fn default_close_timeout() -> u64 { 1_000 }
fn default_page_size() -> u32 { 50 }
fn default_speedtest_page_size() -> u32 { 1000 }
fn default_metrics_path() -> String { "/metrics".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr() }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: default_jwt_secret() }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout(),
            close_timeout_ms: default_close_timeout(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            speedtest_page_size: default_speedtest_page_size(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_metrics_path(),
        }
    }
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl PulseConfig {
    /// Load configuration from YAML file + env overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: PulseConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PULSE_").split("__"))
            .extract()?;
        Ok(config)
    }
}
