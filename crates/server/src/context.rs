//! Shared application state and the tool call pipeline.
//!
//! Every tool call passes through [`AppContext::dispatch`], which assigns a
//! correlation id, audits the request, enforces the rate limit, counts the
//! call, runs the tool, then audits and returns the outcome.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use relay_client::Fetcher;
use relay_core::audit::truncate_chars;
use relay_core::{AppConfig, AuditLog, ConfigError, Error, PageCache, RateLimiter};

/// Tool results kept in `MCP_TOOL_RESPONSE_*` records.
const LOGGED_RESULT_CHARS: usize = 2000;

/// Per-process tool call counters.
#[derive(Debug)]
pub struct ToolStats {
    started_at: DateTime<Utc>,
    total: AtomicU64,
    per_tool: Mutex<BTreeMap<String, u64>>,
}

impl Default for ToolStats {
    fn default() -> Self {
        Self { started_at: Utc::now(), total: AtomicU64::new(0), per_tool: Mutex::new(BTreeMap::new()) }
    }
}

impl ToolStats {
    pub fn record(&self, tool: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut per_tool = self.per_tool.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *per_tool.entry(tool.to_string()).or_default() += 1;
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn per_tool(&self) -> BTreeMap<String, u64> {
        self.per_tool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Everything a tool needs, built once in `main` and shared via `Arc`.
pub struct AppContext {
    pub config: AppConfig,
    pub cache: PageCache,
    pub limiter: Option<RateLimiter>,
    pub audit: AuditLog,
    pub fetcher: Arc<dyn Fetcher>,
    pub stats: ToolStats,
}

impl AppContext {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configured rate limit is malformed.
    pub fn new(config: AppConfig, fetcher: Arc<dyn Fetcher>, audit: AuditLog) -> Result<Self, ConfigError> {
        let limiter = config.rate_limit_spec()?.map(RateLimiter::new);
        let cache = PageCache::new(config.page_cache_ttl(), config.max_cache_size);

        Ok(Self { config, cache, limiter, audit, fetcher, stats: ToolStats::default() })
    }

    /// Run one tool call through the audit, rate limit and stats pipeline.
    ///
    /// `run` receives the correlation id so upstream calls can be tied back
    /// to this tool call in the audit log. Its output is returned as pretty
    /// JSON text.
    pub async fn dispatch<P, O, F, Fut>(&self, tool: &str, params: &P, run: F) -> Result<CallToolResult, McpError>
    where
        P: Serialize,
        O: Serialize,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<O, Error>>,
    {
        let correlation_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        self.audit.append(
            &format!("MCP_TOOL_REQUEST_{tool}"),
            Some(&correlation_id),
            json!({ "tool": tool, "data": params, "timestamp": Utc::now() }),
        );
        tracing::info!(tool, correlation_id = %correlation_id, "executing tool");

        let outcome = async {
            if let Some(limiter) = &self.limiter {
                limiter.check().await?;
            }
            self.stats.record(tool);

            let output = run(correlation_id.clone()).await?;
            serde_json::to_string_pretty(&output).map_err(|e| Error::Internal(format!("failed to serialize result: {e}")))
        }
        .await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(text) => {
                self.audit.append(
                    &format!("MCP_TOOL_RESPONSE_{tool}"),
                    Some(&correlation_id),
                    json!({
                        "tool": tool,
                        "duration_ms": duration_ms,
                        "result": truncate_chars(&text, LOGGED_RESULT_CHARS, "... (truncated for logging)"),
                        "success": true,
                        "timestamp": Utc::now(),
                    }),
                );
                tracing::info!(tool, duration_ms, "tool finished");
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(err) => {
                self.audit.append(
                    &format!("MCP_TOOL_ERROR_{tool}"),
                    Some(&correlation_id),
                    json!({
                        "tool": tool,
                        "duration_ms": duration_ms,
                        "error": err.message(),
                        "error_details": err.details(),
                        "success": false,
                        "timestamp": Utc::now(),
                    }),
                );
                tracing::warn!(tool, duration_ms, error = %err, "tool failed");
                Err(err.into())
            }
        }
    }
}
