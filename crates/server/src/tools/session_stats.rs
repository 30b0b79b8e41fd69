//! session_stats tool implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use relay_core::Error;

use crate::context::AppContext;
use crate::tools::Status;

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatsOutput {
    pub status: Status,
    pub started_at: DateTime<Utc>,
    pub session_calls: u64,
    pub tool_calls: BTreeMap<String, u64>,
    pub cached_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
    pub summary: String,
}

pub async fn stats_impl(ctx: &AppContext) -> Result<SessionStatsOutput, Error> {
    let tool_calls = ctx.stats.per_tool();

    let mut summary = String::from("Tool calls this session:");
    for (name, calls) in &tool_calls {
        summary.push_str(&format!("\n- {name} tool: called {calls} times"));
    }

    Ok(SessionStatsOutput {
        status: Status::Ok,
        started_at: ctx.stats.started_at(),
        session_calls: ctx.stats.total(),
        tool_calls,
        cached_pages: ctx.cache.len().await,
        rate_limit: ctx.limiter.as_ref().map(|l| l.spec().display.clone()),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{MockFetcher, context, context_with};
    use relay_core::AppConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counts_calls_per_tool() {
        let ctx = context(Arc::new(MockFetcher::default()));
        ctx.stats.record("get_page_previews");
        ctx.stats.record("get_page_previews");
        ctx.stats.record("session_stats");

        let out = stats_impl(&ctx).await.unwrap();
        assert_eq!(out.session_calls, 3);
        assert_eq!(out.tool_calls["get_page_previews"], 2);
        assert_eq!(
            out.summary,
            "Tool calls this session:\n- get_page_previews tool: called 2 times\n- session_stats tool: called 1 times"
        );
        assert!(out.rate_limit.is_none());
    }

    #[tokio::test]
    async fn test_reports_rate_limit() {
        let config = AppConfig { rate_limit: Some("100/1h".into()), ..Default::default() };
        let ctx = context_with(config, Arc::new(MockFetcher::default()));

        let out = stats_impl(&ctx).await.unwrap();
        assert_eq!(out.rate_limit.as_deref(), Some("100/1h"));
        assert_eq!(out.session_calls, 0);
    }
}
