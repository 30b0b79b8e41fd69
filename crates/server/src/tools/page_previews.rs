//! get_page_previews tool implementation.
//!
//! Fetches up to ten URLs concurrently and returns the first 500 normalized
//! lines of each. Items fail independently; a slow page yields a timeout
//! entry without holding back the others.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use relay_client::canonicalize;
use relay_core::text::{MAX_LINE_WIDTH, MAX_RANGE_LINES, PREVIEW_CHAR_BUDGET, PREVIEW_LINES, preview};
use relay_core::{Error, run_batch};

use crate::context::AppContext;
use crate::tools::{BatchItem, Outcome, cached_page};

pub const MAX_PREVIEW_URLS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PagePreviewsParams {
    /// URLs to preview (1 to 10).
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlInput {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagePreview {
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
    pub start_line: usize,
    pub end_line: usize,
    pub preview_lines: usize,
    pub total_lines: usize,
    pub truncated: bool,
    pub char_limit_reached: bool,
    pub content: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagePreviewsOutput {
    pub tool: &'static str,
    pub now: DateTime<Utc>,
    pub ttl_ms: u64,
    pub max_line_length: usize,
    pub timeout_ms: u64,
    pub results: Vec<BatchItem<UrlInput, PagePreview>>,
}

pub async fn previews_impl(
    ctx: Arc<AppContext>, params: PagePreviewsParams, correlation_id: String,
) -> Result<PagePreviewsOutput, Error> {
    if params.urls.is_empty() || params.urls.len() > MAX_PREVIEW_URLS {
        return Err(Error::InvalidInput(format!("urls must contain between 1 and {MAX_PREVIEW_URLS} entries")));
    }
    for url in &params.urls {
        canonicalize(url)?;
    }

    let now = Utc::now();
    let items = params.urls.iter().map(|url| {
        let ctx = Arc::clone(&ctx);
        let url = url.clone();
        let correlation_id = correlation_id.clone();
        async move { preview_one(&ctx, &url, &correlation_id).await }
    });

    let settled = run_batch(items, ctx.config.batch_timeout()).await;

    let results = params
        .urls
        .into_iter()
        .zip(settled)
        .map(|(url, result)| {
            let outcome: Outcome<PagePreview> = result.map_err(Error::from).and_then(|r| r).into();
            BatchItem { input: UrlInput { url }, outcome }
        })
        .collect();

    Ok(PagePreviewsOutput {
        tool: "get_page_previews",
        now,
        ttl_ms: ctx.config.page_cache_ttl_ms,
        max_line_length: MAX_LINE_WIDTH,
        timeout_ms: ctx.config.batch_timeout_ms,
        results,
    })
}

async fn preview_one(ctx: &AppContext, url: &str, correlation_id: &str) -> Result<PagePreview, Error> {
    let (_, page) = cached_page(ctx, url, correlation_id).await?;
    let p = preview(&page.content, PREVIEW_LINES, PREVIEW_CHAR_BUDGET);

    let note = if p.truncated {
        format!(
            "Page has {total} total lines. Use get_page_content_range(url, start_line, end_line) to get lines {next}-{total}. \
             Max {MAX_RANGE_LINES} lines per request.",
            total = p.total_lines,
            next = p.lines_returned + 1,
        )
    } else {
        "Complete page content shown.".to_string()
    };

    Ok(PagePreview {
        from_cache: page.from_cache,
        fetched_at: page.fetched_at,
        start_line: 1,
        end_line: p.lines_returned,
        preview_lines: PREVIEW_LINES,
        total_lines: p.total_lines,
        truncated: p.truncated,
        char_limit_reached: p.char_limit_reached,
        content: p.text,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{MockFetcher, context, context_with};
    use relay_core::AppConfig;
    use std::time::Duration;

    fn params(urls: &[&str]) -> PagePreviewsParams {
        PagePreviewsParams { urls: urls.iter().map(|u| u.to_string()).collect() }
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_lists() {
        let ctx = context(Arc::new(MockFetcher::default()));
        let err = previews_impl(Arc::clone(&ctx), params(&[]), "cid".into()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let many = vec!["https://a.test/"; 11];
        let err = previews_impl(ctx, params(&many), "cid".into()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rejects_bad_url_before_fetching() {
        let fetcher = Arc::new(MockFetcher::default());
        let ctx = context(Arc::clone(&fetcher));

        let err = previews_impl(ctx, params(&["https://a.test/", "ftp://b.test/"]), "cid".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_mixed_results_keep_order() {
        let long_page = (1..=800).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let fetcher = Arc::new(
            MockFetcher::default()
                .with_page("https://a.test/", &long_page)
                .with_error("https://b.test/", Error::Upstream { status: Some(500), message: "HTTP 500: oops".into() })
                .with_page("https://c.test/", "short"),
        );
        let ctx = context(Arc::clone(&fetcher));

        let out = previews_impl(ctx, params(&["https://a.test/", "https://b.test/", "https://c.test/"]), "cid".into())
            .await
            .unwrap();

        assert_eq!(out.tool, "get_page_previews");
        assert_eq!(out.ttl_ms, 600_000);
        assert_eq!(out.max_line_length, 250);
        assert_eq!(out.results.len(), 3);

        assert_eq!(out.results[0].input.url, "https://a.test/");
        match &out.results[0].outcome {
            Outcome::Ok(p) => {
                assert_eq!(p.total_lines, 800);
                assert_eq!(p.end_line, 500);
                assert!(p.truncated);
                assert!(p.note.contains("lines 501-800"));
                assert!(!p.from_cache);
            }
            Outcome::Error(f) => panic!("unexpected failure: {}", f.error),
        }

        match &out.results[1].outcome {
            Outcome::Error(f) => {
                assert_eq!(f.error, "HTTP 500: oops");
                assert_eq!(f.error_details.status, Some(500));
            }
            Outcome::Ok(_) => panic!("expected failure"),
        }

        match &out.results[2].outcome {
            Outcome::Ok(p) => {
                assert_eq!(p.content, "short");
                assert_eq!(p.note, "Complete page content shown.");
            }
            Outcome::Error(f) => panic!("unexpected failure: {}", f.error),
        }
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let body = "# Title\r\n![logo](https://a.test/logo.png)intro\r\nbody line";
        let fetcher = Arc::new(MockFetcher::default().with_page("https://a.test/", body));
        let ctx = context(Arc::clone(&fetcher));

        let first = previews_impl(Arc::clone(&ctx), params(&["https://a.test/"]), "c1".into()).await.unwrap();
        let second = previews_impl(ctx, params(&["HTTPS://A.test/#top"]), "c2".into()).await.unwrap();

        let (Outcome::Ok(a), Outcome::Ok(b)) = (&first.results[0].outcome, &second.results[0].outcome) else {
            panic!("both previews should succeed");
        };
        assert!(!a.from_cache);
        assert!(b.from_cache);
        assert_eq!(a.content, "# Title\nintro\nbody line");
        assert_eq!(b.content, a.content);
        assert_eq!(b.fetched_at, a.fetched_at);
        assert_eq!(b.total_lines, a.total_lines);
        assert_eq!(second.results[0].input.url, "HTTPS://A.test/#top");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_page_times_out_alone() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .with_page("https://slow.test/", "eventually")
                .with_delay("https://slow.test/", Duration::from_secs(120))
                .with_page("https://fast.test/", "now"),
        );
        let config = AppConfig { batch_timeout_ms: 1000, ..Default::default() };
        let ctx = context_with(config, Arc::clone(&fetcher));

        let out = previews_impl(Arc::clone(&ctx), params(&["https://slow.test/", "https://fast.test/"]), "cid".into())
            .await
            .unwrap();

        match &out.results[0].outcome {
            Outcome::Error(f) => {
                assert_eq!(f.error, "Request timed out after 1 seconds");
                assert_eq!(f.error_details.timeout_ms, Some(1000));
            }
            Outcome::Ok(_) => panic!("expected timeout"),
        }
        assert!(matches!(out.results[1].outcome, Outcome::Ok(_)));

        // the detached fetch still lands in the cache
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ctx.cache.len().await, 2);
    }
}
