//! search_engine tool implementation.
//!
//! Runs up to five queries concurrently. Result pages are fetched as markdown
//! and never cached; Google pages are reduced to a `- [title](url)` list when
//! any organic results can be extracted.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use relay_client::{SearchEngine, extract_serp_results, render_serp, search_url};
use relay_core::{Error, run_batch};

use crate::context::AppContext;
use crate::tools::{BatchItem, Outcome};

pub const MAX_QUERIES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchQuery {
    /// Search terms.
    pub query: String,

    /// Engine to query (default: google).
    #[serde(default)]
    pub engine: Option<SearchEngine>,

    /// Result page number, starting at 0.
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchEngineParams {
    /// Queries to run (1 to 5).
    pub queries: Vec<SearchQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryEcho {
    pub query: String,
    pub engine: SearchEngine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub content: String,
    /// Whether `content` is the extracted result list rather than the raw page.
    pub cleaned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchEngineOutput {
    pub tool: &'static str,
    pub queries_processed: usize,
    pub timeout_ms: u64,
    pub results: Vec<BatchItem<QueryEcho, SearchPage>>,
}

pub async fn search_impl(
    ctx: Arc<AppContext>, params: SearchEngineParams, correlation_id: String,
) -> Result<SearchEngineOutput, Error> {
    if params.queries.is_empty() || params.queries.len() > MAX_QUERIES {
        return Err(Error::InvalidInput(format!("queries must contain between 1 and {MAX_QUERIES} entries")));
    }

    let echoes: Vec<QueryEcho> = params
        .queries
        .into_iter()
        .map(|q| QueryEcho { query: q.query, engine: q.engine.unwrap_or_default(), cursor: q.cursor })
        .collect();

    let items = echoes.iter().cloned().map(|echo| {
        let ctx = Arc::clone(&ctx);
        let correlation_id = correlation_id.clone();
        async move { search_one(&ctx, &echo, &correlation_id).await }
    });

    let settled = run_batch(items, ctx.config.batch_timeout()).await;

    let results: Vec<_> = echoes
        .into_iter()
        .zip(settled)
        .map(|(input, result)| BatchItem { input, outcome: Outcome::from(result.map_err(Error::from).and_then(|r| r)) })
        .collect();

    Ok(SearchEngineOutput {
        tool: "search_engine",
        queries_processed: results.len(),
        timeout_ms: ctx.config.batch_timeout_ms,
        results,
    })
}

async fn search_one(ctx: &AppContext, query: &QueryEcho, correlation_id: &str) -> Result<SearchPage, Error> {
    let url = search_url(query.engine, &query.query, query.cursor.as_deref())?;
    tracing::debug!(engine = %query.engine, url = %url, "running search query");
    let markdown = ctx.fetcher.fetch_markdown(&url, Some(correlation_id)).await?;

    if query.engine == SearchEngine::Google {
        let results = extract_serp_results(&markdown);
        if !results.is_empty() {
            tracing::debug!(query = %query.query, results = results.len(), "cleaned result page");
            return Ok(SearchPage { content: render_serp(&results), cleaned: true, result_count: Some(results.len()) });
        }
    }

    Ok(SearchPage { content: markdown, cleaned: false, result_count: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{MockFetcher, context};

    fn query(query: &str, engine: Option<SearchEngine>, cursor: Option<&str>) -> SearchQuery {
        SearchQuery { query: query.into(), engine, cursor: cursor.map(str::to_string) }
    }

    #[test]
    fn test_params_deserialize_engine() {
        let params: SearchEngineParams =
            serde_json::from_str(r#"{"queries": [{"query": "a"}, {"query": "b", "engine": "bing", "cursor": "1"}]}"#)
                .unwrap();
        assert_eq!(params.queries[0].engine, None);
        assert_eq!(params.queries[1].engine, Some(SearchEngine::Bing));
    }

    #[tokio::test]
    async fn test_query_count_bounds() {
        let ctx = context(Arc::new(MockFetcher::default()));
        let err = search_impl(Arc::clone(&ctx), SearchEngineParams { queries: vec![] }, "cid".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let queries = (0..6).map(|i| query(&format!("q{i}"), None, None)).collect();
        let err = search_impl(ctx, SearchEngineParams { queries }, "cid".into()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_google_results_cleaned_bing_raw() {
        let google_url = search_url(SearchEngine::Google, "tokio", None).unwrap();
        let bing_url = search_url(SearchEngine::Bing, "tokio", Some("1")).unwrap();
        let google_page = "[### Tokio\ntokio.rs](https://tokio.rs/?utm_source=x)\n[Maps](https://maps.google.com/)";

        let fetcher = Arc::new(
            MockFetcher::default()
                .with_page(&google_url, google_page)
                .with_page(&bing_url, "raw bing markdown"),
        );
        let ctx = context(Arc::clone(&fetcher));

        let params = SearchEngineParams {
            queries: vec![
                query("tokio", None, None),
                query("tokio", Some(SearchEngine::Bing), Some("1")),
                query("tokio", None, Some("soon")),
            ],
        };
        let out = search_impl(ctx, params, "cid".into()).await.unwrap();
        assert_eq!(out.queries_processed, 3);

        match &out.results[0].outcome {
            Outcome::Ok(page) => {
                assert!(page.cleaned);
                assert_eq!(page.content, "- [Tokio](https://tokio.rs/)");
            }
            Outcome::Error(f) => panic!("unexpected failure: {}", f.error),
        }
        match &out.results[1].outcome {
            Outcome::Ok(page) => {
                assert!(!page.cleaned);
                assert_eq!(page.content, "raw bing markdown");
            }
            Outcome::Error(f) => panic!("unexpected failure: {}", f.error),
        }
        assert!(matches!(&out.results[2].outcome, Outcome::Error(f) if f.error_details.kind == "ValidationError"));

        let value = serde_json::to_value(&out.results[1]).unwrap();
        assert_eq!(value["engine"], "bing");
        assert_eq!(value["cursor"], "1");
        assert_eq!(value["status"], "ok");

        // result pages are never cached
        assert_eq!(fetcher.calls(), 2);
    }
}
