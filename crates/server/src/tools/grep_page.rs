//! grep_page_content tool implementation.
//!
//! Patterns are compiled before the page is fetched. A pattern that does not
//! compile is answered with a `status: "error"` payload rather than a tool
//! failure, so the caller can correct it and retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use relay_core::text::{DEFAULT_MAX_MATCHES, GrepMatch, MAX_MATCHES_LIMIT, compile_pattern, grep};
use relay_core::{Error, ErrorDetails};

use crate::context::AppContext;
use crate::tools::{Status, cached_page};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GrepPageParams {
    /// URL of the page to search.
    pub url: String,

    /// Regular expression, either bare or as /pattern/flags (flags: i, m, s; g, u, y are ignored).
    pub pattern: String,

    /// Maximum matches to return, 1 to 100 (default: 20).
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,

    /// Case-sensitive matching for bare patterns (default: true).
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

fn default_max_matches() -> usize {
    DEFAULT_MAX_MATCHES
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct GrepResults {
    pub url: String,
    pub status: Status,
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
    pub pattern: String,
    pub total_lines: usize,
    pub matches_found: usize,
    pub max_matches_limit: usize,
    pub results: Vec<GrepMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrepPatternError {
    pub url: String,
    pub status: Status,
    pub pattern: String,
    pub error: String,
    pub error_details: ErrorDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GrepOutput {
    Matches(GrepResults),
    InvalidPattern(GrepPatternError),
}

pub async fn grep_impl(ctx: Arc<AppContext>, params: GrepPageParams, correlation_id: String) -> Result<GrepOutput, Error> {
    if params.pattern.is_empty() {
        return Err(Error::InvalidInput("pattern must not be empty".into()));
    }
    if !(1..=MAX_MATCHES_LIMIT).contains(&params.max_matches) {
        return Err(Error::InvalidInput(format!("max_matches must be between 1 and {MAX_MATCHES_LIMIT}")));
    }

    let regex = match compile_pattern(&params.pattern, params.case_sensitive) {
        Ok(regex) => regex,
        Err(err) => return Ok(pattern_error(params, err)),
    };

    let (_, page) = cached_page(&ctx, &params.url, &correlation_id).await?;
    let matches = match grep(&page.content, &regex, params.max_matches) {
        Ok(matches) => matches,
        Err(err) => return Ok(pattern_error(params, err)),
    };

    Ok(GrepOutput::Matches(GrepResults {
        url: params.url,
        status: Status::Ok,
        from_cache: page.from_cache,
        fetched_at: page.fetched_at,
        pattern: params.pattern,
        total_lines: page.content.line_count(),
        matches_found: matches.len(),
        max_matches_limit: params.max_matches,
        results: matches,
    }))
}

fn pattern_error(params: GrepPageParams, err: Error) -> GrepOutput {
    tracing::debug!(pattern = %params.pattern, error = %err, "rejected grep pattern");
    GrepOutput::InvalidPattern(GrepPatternError {
        url: params.url,
        status: Status::Error,
        pattern: params.pattern,
        error: err.message(),
        error_details: err.details(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{MockFetcher, context};

    const URL: &str = "https://logs.test/build";

    fn params(pattern: &str) -> GrepPageParams {
        GrepPageParams {
            url: URL.into(),
            pattern: pattern.into(),
            max_matches: DEFAULT_MAX_MATCHES,
            case_sensitive: true,
        }
    }

    #[test]
    fn test_param_defaults() {
        let params: GrepPageParams = serde_json::from_str(r#"{"url": "https://x.test", "pattern": "a"}"#).unwrap();
        assert_eq!(params.max_matches, 20);
        assert!(params.case_sensitive);
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_structured_result() {
        let fetcher = Arc::new(MockFetcher::default().with_page(URL, "text"));
        let ctx = context(Arc::clone(&fetcher));

        let out = grep_impl(ctx, params("(unclosed"), "cid".into()).await.unwrap();
        let value = serde_json::to_value(&out).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["pattern"], "(unclosed");
        assert!(value["error"].as_str().unwrap().starts_with("Invalid regex pattern"));
        assert_eq!(value["error_details"]["type"], "ValidationError");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_max_matches_bounds() {
        let ctx = context(Arc::new(MockFetcher::default()));
        for bad in [0, 101] {
            let p = GrepPageParams { max_matches: bad, ..params("x") };
            let err = grep_impl(Arc::clone(&ctx), p, "cid".into()).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_matches_with_context() {
        let page = "ok\nERROR: disk full\nok\nerror: retry\nERROR: gave up";
        let ctx = context(Arc::new(MockFetcher::default().with_page(URL, page)));

        let GrepOutput::Matches(out) = grep_impl(Arc::clone(&ctx), params("ERROR"), "cid".into()).await.unwrap() else {
            panic!("expected matches");
        };
        assert_eq!(out.status, Status::Ok);
        assert_eq!(out.total_lines, 5);
        assert_eq!(out.matches_found, 2);
        assert_eq!(out.results[0].line_number, 2);
        assert_eq!(out.results[1].line_number, 5);
        assert!(out.results[0].context.contains("> ERROR: disk full"));

        let GrepOutput::Matches(out) = grep_impl(ctx, params("/error/i"), "cid".into()).await.unwrap() else {
            panic!("expected matches");
        };
        assert_eq!(out.matches_found, 3);
        assert!(out.from_cache);
    }

    #[tokio::test]
    async fn test_context_clamped_and_single_match() {
        let page = (1..=30)
            .map(|i| if i % 10 == 0 { format!("FAIL step {i}") } else { format!("pass step {i}") })
            .collect::<Vec<_>>()
            .join("\n");
        let ctx = context(Arc::new(MockFetcher::default().with_page(URL, &page)));

        let p = GrepPageParams { max_matches: 1, ..params("FAIL") };
        let GrepOutput::Matches(out) = grep_impl(Arc::clone(&ctx), p, "cid".into()).await.unwrap() else {
            panic!("expected matches");
        };
        assert_eq!(out.matches_found, 1);
        assert_eq!(out.max_matches_limit, 1);
        assert_eq!(out.results[0].line_number, 10);

        let GrepOutput::Matches(out) = grep_impl(ctx, params("FAIL step 30"), "cid".into()).await.unwrap() else {
            panic!("expected matches");
        };
        let m = &out.results[0];
        assert_eq!((m.context_start_line, m.context_end_line), (5, 30));
        assert!(m.context.ends_with("> FAIL step 30"));
    }

    #[tokio::test]
    async fn test_lookbehind_pattern() {
        let ctx = context(Arc::new(MockFetcher::default().with_page(URL, "v1.2\nrelease v2.0\nv3.1")));

        let GrepOutput::Matches(out) = grep_impl(ctx, params(r"(?<!release )v\d"), "cid".into()).await.unwrap() else {
            panic!("expected matches");
        };
        let lines: Vec<_> = out.results.iter().map(|m| m.line_number).collect();
        assert_eq!(lines, [1, 3]);
    }
}
