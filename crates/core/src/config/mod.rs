//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MCP_RELAY_*)
//! 2. TOML config file (if MCP_RELAY_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Values are read once at startup; nothing is reconfigured at runtime.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitSpec;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MCP_RELAY_*)
/// 2. TOML config file (if MCP_RELAY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bearer token for the unlocker API.
    ///
    /// Set via MCP_RELAY_API_TOKEN environment variable.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Base URL of the unlocker API.
    ///
    /// Set via MCP_RELAY_API_URL environment variable.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Unlocker zone that requests are billed against.
    ///
    /// Set via MCP_RELAY_UNLOCKER_ZONE environment variable.
    #[serde(default = "default_unlocker_zone")]
    pub unlocker_zone: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MCP_RELAY_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single upstream HTTP request in milliseconds.
    ///
    /// Set via MCP_RELAY_REQUEST_TIMEOUT_MS environment variable.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Page cache time-to-live in milliseconds.
    ///
    /// Set via MCP_RELAY_PAGE_CACHE_TTL_MS environment variable.
    #[serde(default = "default_page_cache_ttl_ms")]
    pub page_cache_ttl_ms: u64,

    /// Maximum number of cached pages.
    ///
    /// Set via MCP_RELAY_MAX_CACHE_SIZE environment variable.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Interval of the background sweep that drops expired pages.
    ///
    /// Set via MCP_RELAY_CACHE_SWEEP_INTERVAL_MS environment variable.
    #[serde(default = "default_cache_sweep_interval_ms")]
    pub cache_sweep_interval_ms: u64,

    /// Per-item timeout for batch tools in milliseconds.
    ///
    /// Set via MCP_RELAY_BATCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Tool call budget, e.g. "100/1h" or "50/30m".
    ///
    /// Set via MCP_RELAY_RATE_LIMIT environment variable.
    #[serde(default)]
    pub rate_limit: Option<String>,

    /// Path of the JSONL audit log. Auditing is off when unset.
    ///
    /// Set via MCP_RELAY_DEBUG_LOG_FILE environment variable.
    #[serde(default)]
    pub debug_log_file: Option<PathBuf>,

    /// Size ceiling of the audit log in megabytes.
    ///
    /// Set via MCP_RELAY_DEBUG_LOG_MAX_SIZE_MB environment variable.
    #[serde(default = "default_debug_log_max_size_mb")]
    pub debug_log_max_size_mb: u64,
}

fn default_api_url() -> String {
    "https://api.brightdata.com".into()
}

fn default_unlocker_zone() -> String {
    "mcp_unlocker".into()
}

fn default_user_agent() -> String {
    "mcp-relay/0.1".into()
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

fn default_page_cache_ttl_ms() -> u64 {
    600_000 // 10 minutes
}

fn default_max_cache_size() -> usize {
    1000
}

fn default_cache_sweep_interval_ms() -> u64 {
    120_000
}

fn default_batch_timeout_ms() -> u64 {
    50_000
}

fn default_debug_log_max_size_mb() -> u64 {
    50
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_url: default_api_url(),
            unlocker_zone: default_unlocker_zone(),
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout_ms(),
            page_cache_ttl_ms: default_page_cache_ttl_ms(),
            max_cache_size: default_max_cache_size(),
            cache_sweep_interval_ms: default_cache_sweep_interval_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
            rate_limit: None,
            debug_log_file: None,
            debug_log_max_size_mb: default_debug_log_max_size_mb(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn page_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.page_cache_ttl_ms)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sweep_interval_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Audit log ceiling in bytes.
    pub fn debug_log_max_bytes(&self) -> u64 {
        self.debug_log_max_size_mb.saturating_mul(1024 * 1024)
    }

    /// Parsed rate limit, or `None` when calls are unlimited.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `rate_limit` is malformed.
    pub fn rate_limit_spec(&self) -> Result<Option<RateLimitSpec>, ConfigError> {
        self.rate_limit.as_deref().map(str::parse).transpose()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MCP_RELAY_`
    /// 2. TOML file from `MCP_RELAY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MCP_RELAY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MCP_RELAY_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that the unlocker API token is available.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token is not set.
    pub fn require_api_token(&self) -> Result<&str, ConfigError> {
        self.api_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "api_token".into(),
                hint: "Set MCP_RELAY_API_TOKEN environment variable".into(),
            })
    }
}
