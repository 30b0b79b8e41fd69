//! Unlocker API client.
//!
//! Every page fetch is a `POST {api_url}/request` carrying the target URL and
//! the configured zone. The service renders and unblocks the page and
//! returns it either as raw HTML or converted to markdown.
//!
//! ### Audit
//! Each call gets a process-unique call id and is recorded as
//! `HTTP_REQUEST_<id>`, then `HTTP_RESPONSE_<id>` or `HTTP_ERROR_<id>`. The
//! bearer token is never part of a record.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::json;

use relay_core::audit::truncate_chars;
use relay_core::{AppConfig, AuditLog, ConfigError, Error};

/// Response header the service uses to flag a usage limit.
const ERROR_CODE_HEADER: &str = "x-brd-err-code";
const USAGE_LIMIT_CODE: &str = "client_10100";

/// Response bodies kept in `HTTP_RESPONSE_*` records.
const LOGGED_RESPONSE_CHARS: usize = 1000;

/// Upstream error bodies echoed back in error messages.
const ERROR_BODY_CHARS: usize = 2000;

/// Source of page content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` rendered as markdown.
    async fn fetch_markdown(&self, url: &str, correlation_id: Option<&str>) -> Result<String, Error>;

    /// Fetch `url` as raw HTML.
    async fn fetch_html(&self, url: &str, correlation_id: Option<&str>) -> Result<String, Error>;
}

#[derive(Debug, Clone)]
pub struct UnlockerConfig {
    pub api_url: String,
    pub api_token: String,
    pub zone: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl UnlockerConfig {
    /// Build from application configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no API token is configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.require_api_token()?.to_string(),
            zone: config.unlocker_zone.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/request", self.api_url)
    }
}

#[derive(Debug, Serialize)]
struct UnlockRequest<'a> {
    url: &'a str,
    zone: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_format: Option<&'static str>,
}

/// HTTP client for the unlocker API.
#[derive(Debug, Clone)]
pub struct UnlockerClient {
    http: reqwest::Client,
    config: UnlockerConfig,
    audit: AuditLog,
    next_call: Arc<AtomicU64>,
}

impl UnlockerClient {
    pub fn new(config: UnlockerConfig, audit: AuditLog) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config, audit, next_call: Arc::new(AtomicU64::new(1)) })
    }

    async fn unlock(
        &self, target: &str, data_format: Option<&'static str>, correlation_id: Option<&str>,
    ) -> Result<String, Error> {
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let endpoint = self.config.endpoint();
        let body = UnlockRequest { url: target, zone: &self.config.zone, format: "raw", data_format };

        self.audit.append(
            &format!("HTTP_REQUEST_{call_id}"),
            correlation_id,
            json!({ "url": endpoint, "method": "POST", "data": body }),
        );

        let start = Instant::now();
        tracing::debug!(call_id, target, "unlocker request");

        let sent = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let err = if e.is_timeout() {
                    Error::Timeout { timeout_ms: duration_ms(self.config.timeout) }
                } else {
                    Error::Network(e.to_string())
                };
                self.audit_error(call_id, correlation_id, &endpoint, &err, None, start);
                return Err(err);
            }
        };

        let status = response.status();
        let usage_limited = is_usage_limit(response.headers());
        let text = response.text().await;

        if !status.is_success() {
            let text = text.unwrap_or_default();
            let err = if usage_limited {
                Error::UsageLimit(format!(
                    "Monthly request limit reached for unlocker zone '{}'. Create a dedicated unlocker zone and set \
                     MCP_RELAY_UNLOCKER_ZONE to it.",
                    self.config.zone
                ))
            } else {
                Error::Upstream {
                    status: Some(status.as_u16()),
                    message: format!("HTTP {}: {}", status.as_u16(), truncate_chars(&text, ERROR_BODY_CHARS, "...")),
                }
            };
            self.audit_error(call_id, correlation_id, &endpoint, &err, Some(&text), start);
            tracing::warn!(call_id, status = status.as_u16(), usage_limited, "unlocker request failed");
            return Err(err);
        }

        let text = match text {
            Ok(text) => text,
            Err(e) => {
                let err = Error::Network(format!("failed to read response: {e}"));
                self.audit_error(call_id, correlation_id, &endpoint, &err, None, start);
                return Err(err);
            }
        };

        let elapsed = start.elapsed();
        self.audit.append(
            &format!("HTTP_RESPONSE_{call_id}"),
            correlation_id,
            json!({
                "url": endpoint,
                "status": status.as_u16(),
                "body": truncate_chars(&text, LOGGED_RESPONSE_CHARS, "... (truncated)"),
                "duration_ms": duration_ms(elapsed),
            }),
        );
        tracing::debug!(call_id, bytes = text.len(), elapsed_ms = duration_ms(elapsed), "unlocker response");

        Ok(text)
    }

    fn audit_error(
        &self, call_id: u64, correlation_id: Option<&str>, endpoint: &str, err: &Error, body: Option<&str>,
        start: Instant,
    ) {
        self.audit.append(
            &format!("HTTP_ERROR_{call_id}"),
            correlation_id,
            json!({
                "url": endpoint,
                "error": err.message(),
                "status": err.status(),
                "body": body,
                "duration_ms": duration_ms(start.elapsed()),
            }),
        );
    }
}

#[async_trait]
impl Fetcher for UnlockerClient {
    async fn fetch_markdown(&self, url: &str, correlation_id: Option<&str>) -> Result<String, Error> {
        self.unlock(url, Some("markdown"), correlation_id).await
    }

    async fn fetch_html(&self, url: &str, correlation_id: Option<&str>) -> Result<String, Error> {
        self.unlock(url, None, correlation_id).await
    }
}

fn is_usage_limit(headers: &HeaderMap) -> bool {
    headers
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|code| code == USAGE_LIMIT_CODE)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
