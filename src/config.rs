//! Bootstrap configuration for the `connector-configd` binary: listen port,
//! cache TTL, default tenant, and the filesystem paths the runtime
//! configuration service needs at startup. Not to be confused with the
//! subsystem's own three-tier *connector* configuration resolution
//! ([`crate::runtime::RuntimeConfigService`]) — this is only the handful of
//! settings the process itself needs before it can stand that service up.
//!
//! Loaded once at startup from a TOML file and validated before the server
//! opens any ports, the same `Config::load` + `toml` shape this binary's
//! ancestor used.
//!
//! # Example
//! ```toml
//! [server]
//! admin_port = 8090
//!
//! [runtime]
//! cache_ttl_secs = 60
//! default_tenant = "*"
//! self_hosted = false
//!
//! [paths]
//! connectors_file = "/etc/connector-configd/connectors.toml"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.server.admin_port != 0, "server.admin_port must be non-zero");
        anyhow::ensure!(!self.runtime.default_tenant.trim().is_empty(), "runtime.default_tenant must be non-empty");
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.runtime.cache_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.runtime.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port for the operator-facing introspection surface (health, cache
    /// stats, tenant config lookups) — not the agent-facing API, which is
    /// out of scope for this subsystem.
    #[serde(default = "defaults::admin_port")]
    pub admin_port: u16,

    /// Environment variable whose value is the Bearer token required for
    /// admin surface requests. Leave unset to disable admin authentication
    /// (only recommended when the port is strictly firewalled).
    #[serde(default)]
    pub admin_token_env: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { admin_port: defaults::admin_port(), admin_token_env: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "defaults::cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "defaults::cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    #[serde(default = "defaults::default_tenant")]
    pub default_tenant: String,
    /// When true, the persistent store is never consulted even if
    /// configured (spec §4.7).
    #[serde(default)]
    pub self_hosted: bool,
    /// Env var prefix passed to `EnvPrefixSecretResolver` when no cloud
    /// secret manager is configured.
    #[serde(default = "defaults::secret_env_prefix")]
    pub secret_env_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: defaults::cache_ttl_secs(),
            cleanup_interval_secs: defaults::cleanup_interval_secs(),
            default_tenant: defaults::default_tenant(),
            self_hosted: false,
            secret_env_prefix: defaults::secret_env_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Declarative connectors/LLM-providers document (spec §4.5). When
    /// unset, the file-loader tier of the resolution chain is skipped.
    #[serde(default)]
    pub connectors_file: Option<PathBuf>,
    /// `postgres://` URL for the persistent store. When unset, the store
    /// tier of the resolution chain is skipped.
    #[serde(default)]
    pub database_url_env: Option<String>,
}

pub mod defaults {
    pub fn admin_port() -> u16 {
        8090
    }
    pub fn cache_ttl_secs() -> u64 {
        60
    }
    pub fn cleanup_interval_secs() -> u64 {
        120
    }
    pub fn default_tenant() -> String {
        "*".to_string()
    }
    pub fn secret_env_prefix() -> String {
        "P".to_string()
    }
}
