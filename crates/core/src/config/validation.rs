//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `page_cache_ttl_ms` or `cache_sweep_interval_ms` is 0
    /// - `max_cache_size` is 0
    /// - `batch_timeout_ms` is below 100ms or above 5 minutes
    /// - `request_timeout_ms` is below 100ms or above 5 minutes
    /// - `rate_limit` is set but malformed
    /// - `debug_log_max_size_mb` is 0
    /// - `api_url` or `unlocker_zone` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_cache_ttl_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "page_cache_ttl_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.cache_sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_sweep_interval_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_cache_size == 0 {
            return Err(ConfigError::Invalid { field: "max_cache_size".into(), reason: "must be at least 1".into() });
        }

        check_timeout("batch_timeout_ms", self.batch_timeout_ms)?;
        check_timeout("request_timeout_ms", self.request_timeout_ms)?;

        self.rate_limit_spec()?;

        if self.debug_log_max_size_mb == 0 {
            return Err(ConfigError::Invalid {
                field: "debug_log_max_size_mb".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.api_url.is_empty() {
            return Err(ConfigError::Invalid { field: "api_url".into(), reason: "must not be empty".into() });
        }
        if self.unlocker_zone.is_empty() {
            return Err(ConfigError::Invalid { field: "unlocker_zone".into(), reason: "must not be empty".into() });
        }

        if self.request_timeout_ms < self.batch_timeout_ms {
            tracing::warn!(
                request_timeout_ms = self.request_timeout_ms,
                batch_timeout_ms = self.batch_timeout_ms,
                "request_timeout_ms is shorter than batch_timeout_ms; \
                 batch items will fail with upstream timeouts first"
            );
        }

        Ok(())
    }
}

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < 100 {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
    }
    if value > 300_000 {
        return Err(ConfigError::Invalid {
            field: field.into(),
            reason: "must not exceed 5 minutes (300000ms)".into(),
        });
    }
    Ok(())
}
