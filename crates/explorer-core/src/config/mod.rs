//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and builder defaults
//! 2. **Config file**: TOML file named by the `EXPLORER_CONFIG` env var
//! 3. **Nested environment**: `EXPLORER__SECTION__FIELD` variables
//! 4. **Deployment environment**: the flat variables the explorer has always been deployed
//!    with (`UPSTREAM_V1_BASES`, `PROXY_TIMEOUT_MS`, ...), see [`AppConfig::apply_env_overrides`]
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_port = 3000
//!
//! [upstreams]
//! bases = "https://api1.ippan.uk,https://api2.ippan.uk"
//! timeout_ms = 3500
//! retries = 2
//!
//! [snapshots.status]
//! ttl_ms = 60000
//! timeout_ms = 65000
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::upstream::registry;

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Must be greater than 0. Defaults to `3000`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Maximum number of requests served concurrently. Defaults to `256`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Largest accepted request body in bytes. Defaults to 1 MiB.
    #[serde(default = "default_request_body_limit_bytes")]
    pub request_body_limit_bytes: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    3000
}

fn default_max_concurrent_requests() -> usize {
    256
}

fn default_request_body_limit_bytes() -> usize {
    1024 * 1024
}

/// Upstream mirror settings for the interactive proxy path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamsConfig {
    /// Comma-separated mirror base URLs; the first entry is the primary.
    #[serde(default)]
    pub bases: String,

    /// Shared secret forwarded as `x-ippan-explorer-key`. Empty disables it.
    #[serde(default)]
    pub proxy_key: String,

    /// Per-attempt timeout in milliseconds. Defaults to `3500`.
    #[serde(default = "default_proxy_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after the first one. Defaults to `2`.
    #[serde(default = "default_proxy_retries")]
    pub retries: u32,
}

fn default_proxy_timeout_ms() -> u64 {
    3_500
}

fn default_proxy_retries() -> u32 {
    2
}

/// Ephemeral response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cached GET response in milliseconds. `0` disables caching.
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_cache_ttl_ms() -> u64 {
    1_000
}

/// Freshness window and refresh timeout for one snapshot endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Age below which a snapshot is served without triggering a refresh.
    pub ttl_ms: u64,
    /// Budget for a single refresh against the primary upstream.
    pub timeout_ms: u64,
}

impl SnapshotConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Snapshot settings for every guarded endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotsConfig {
    /// `/v1/status`; the upstream can take up to a minute on heavy nodes.
    #[serde(default = "default_status_snapshot")]
    pub status: SnapshotConfig,

    /// `/v1/finality/recent`.
    #[serde(default = "default_finality_snapshot")]
    pub finality: SnapshotConfig,

    /// `/v1/network/nodes`.
    #[serde(default = "default_nodes_snapshot")]
    pub nodes: SnapshotConfig,
}

fn default_status_snapshot() -> SnapshotConfig {
    SnapshotConfig { ttl_ms: 60_000, timeout_ms: 65_000 }
}

fn default_finality_snapshot() -> SnapshotConfig {
    SnapshotConfig { ttl_ms: 5_000, timeout_ms: 15_000 }
}

fn default_nodes_snapshot() -> SnapshotConfig {
    SnapshotConfig { ttl_ms: 10_000, timeout_ms: 8_000 }
}

/// Compatibility shims for upstreams that expose older path layouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Upstream path template for `/v1/tx/recent`; `{limit}` is substituted.
    #[serde(default = "default_tx_recent_path")]
    pub tx_recent_path: String,

    /// Retry canonical routes against the legacy path on 404/501.
    #[serde(default = "default_legacy_fallback")]
    pub legacy_fallback: bool,
}

fn default_tx_recent_path() -> String {
    "/v1/transactions?limit={limit}".to_string()
}

fn default_legacy_fallback() -> bool {
    true
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether `/metrics` is served. Defaults to `true`.
    pub enabled: bool,
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment (e.g., "development", "production"). Defaults to `"development"`.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Build commit reported by `/api/ping`.
    #[serde(default)]
    pub commit: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstreams: UpstreamsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub snapshots: SnapshotsConfig,

    #[serde(default)]
    pub compat: CompatConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_body_limit_bytes: default_request_body_limit_bytes(),
        }
    }
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            bases: String::new(),
            proxy_key: String::new(),
            timeout_ms: default_proxy_timeout_ms(),
            retries: default_proxy_retries(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: default_cache_ttl_ms() }
    }
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            status: default_status_snapshot(),
            finality: default_finality_snapshot(),
            nodes: default_nodes_snapshot(),
        }
    }
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            tx_recent_path: default_tx_recent_path(),
            legacy_fallback: default_legacy_fallback(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            commit: None,
            server: ServerConfig::default(),
            upstreams: UpstreamsConfig::default(),
            cache: CacheConfig::default(),
            snapshots: SnapshotsConfig::default(),
            compat: CompatConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Upper bound on extra proxy attempts per request.
pub const MAX_PROXY_RETRIES: u32 = 10;

/// Parses a numeric environment value with a safe fallback.
///
/// Unset, blank and non-numeric values yield `fallback`. Anything numeric is
/// floored and clamped at zero, so `"-5"` becomes `0` and `"2.9"` becomes `2`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_int_env(raw: Option<&str>, fallback: u64) -> u64 {
    let Some(raw) = raw else {
        return fallback;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.max(0.0).floor() as u64,
        _ => fallback,
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `EXPLORER__` prefix can override any configuration value.
    /// Use `__` as a separator for nested fields (e.g., `EXPLORER__SERVER__BIND_PORT=8080`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("server.bind_address", "127.0.0.1")?
            .set_default("server.bind_port", 3000)?
            .set_default("server.max_concurrent_requests", 256)?
            .set_default("server.request_body_limit_bytes", 1024 * 1024)?
            .set_default("upstreams.bases", "")?
            .set_default("upstreams.proxy_key", "")?
            .set_default("upstreams.timeout_ms", 3_500)?
            .set_default("upstreams.retries", 2)?
            .set_default("cache.ttl_ms", 1_000)?
            .set_default("snapshots.status.ttl_ms", 60_000)?
            .set_default("snapshots.status.timeout_ms", 65_000)?
            .set_default("snapshots.finality.ttl_ms", 5_000)?
            .set_default("snapshots.finality.timeout_ms", 15_000)?
            .set_default("snapshots.nodes.ttl_ms", 10_000)?
            .set_default("snapshots.nodes.timeout_ms", 8_000)?
            .set_default("compat.tx_recent_path", "/v1/transactions?limit={limit}")?
            .set_default("compat.legacy_fallback", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("metrics.enabled", true)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("EXPLORER").prefix_separator("__").separator("__"),
            )
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/explorer.toml` and the process environment.
    ///
    /// The file path can be overridden with `EXPLORER_CONFIG`. Deployment variables
    /// such as `UPSTREAM_V1_BASES` are applied last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("EXPLORER_CONFIG")
            .unwrap_or_else(|_| "config/explorer.toml".to_string());
        let mut config = Self::from_file(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies the flat deployment variables on top of the layered configuration.
    ///
    /// Numeric values go through [`parse_int_env`] with the current value as the
    /// fallback, so a malformed variable never clobbers a good setting.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bases) = lookup("UPSTREAM_V1_BASES") {
            self.upstreams.bases = bases;
        }
        if let Some(key) = lookup("EXPLORER_PROXY_KEY") {
            self.upstreams.proxy_key = key.trim().to_string();
        }

        let env_u64 = |name: &str, current: u64| parse_int_env(lookup(name).as_deref(), current);

        self.upstreams.timeout_ms = env_u64("PROXY_TIMEOUT_MS", self.upstreams.timeout_ms);
        let retries = env_u64("PROXY_RETRIES", u64::from(self.upstreams.retries));
        self.upstreams.retries = u32::try_from(retries.min(u64::from(MAX_PROXY_RETRIES)))
            .unwrap_or(MAX_PROXY_RETRIES);
        self.cache.ttl_ms = env_u64("PROXY_CACHE_TTL_MS", self.cache.ttl_ms);

        let snapshots = &mut self.snapshots;
        snapshots.status.ttl_ms = env_u64("STATUS_SNAPSHOT_TTL_MS", snapshots.status.ttl_ms);
        snapshots.status.timeout_ms =
            env_u64("STATUS_SNAPSHOT_TIMEOUT_MS", snapshots.status.timeout_ms);
        snapshots.finality.ttl_ms = env_u64("FINALITY_SNAPSHOT_TTL_MS", snapshots.finality.ttl_ms);
        snapshots.finality.timeout_ms =
            env_u64("FINALITY_SNAPSHOT_TIMEOUT_MS", snapshots.finality.timeout_ms);
        snapshots.nodes.ttl_ms = env_u64("NETWORK_NODES_SNAPSHOT_TTL_MS", snapshots.nodes.ttl_ms);
        snapshots.nodes.timeout_ms =
            env_u64("NETWORK_NODES_SNAPSHOT_TIMEOUT_MS", snapshots.nodes.timeout_ms);

        if let Some(path) = lookup("TX_RECENT_UPSTREAM_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                self.compat.tx_recent_path = path.to_string();
            }
        }

        let commit = ["VERCEL_GIT_COMMIT_SHA", "VERCEL_GITHUB_COMMIT_SHA"]
            .into_iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty());
        if commit.is_some() {
            self.commit = commit;
        }
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// An empty upstream list is accepted here: it is reported per request as a
    /// configuration error so the rest of the explorer stays up.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        for base in self.upstreams() {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(format!("Invalid upstream base URL: {base}"));
            }
        }

        if self.upstreams.retries > MAX_PROXY_RETRIES {
            return Err(format!("upstreams.retries must be at most {MAX_PROXY_RETRIES}"));
        }

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if !self.compat.tx_recent_path.starts_with('/') {
            return Err("compat.tx_recent_path must start with '/'".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    /// Resolves the ordered mirror list. Recomputed on every call.
    #[must_use]
    pub fn upstreams(&self) -> Vec<String> {
        registry::resolve_upstreams(&self.upstreams.bases)
    }

    /// Returns the primary mirror, if any is configured.
    #[must_use]
    pub fn primary_upstream(&self) -> Option<String> {
        registry::primary_upstream(&self.upstreams.bases)
    }

    /// Returns the forwarded shared secret, if one is configured.
    #[must_use]
    pub fn proxy_key(&self) -> Option<&str> {
        let key = self.upstreams.proxy_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Per-attempt timeout on the proxy path.
    #[must_use]
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_millis(self.upstreams.timeout_ms)
    }

    /// Total number of proxy attempts, between one and `MAX_PROXY_RETRIES + 1`.
    #[must_use]
    pub fn proxy_attempts(&self) -> usize {
        let retries = self.upstreams.retries.min(MAX_PROXY_RETRIES);
        usize::try_from(retries).unwrap_or(0) + 1
    }

    /// Lifetime of ephemeral cache entries.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }
}
