//! MCP tool implementations.
//!
//! Each tool module exposes a parameter struct (deserialized and schema'd by
//! rmcp), an output struct, and an `*_impl` function returning
//! `Result<Output, Error>`. The handler wraps every call in
//! [`AppContext::dispatch`](crate::context::AppContext::dispatch).

pub mod grep_page;
pub mod page_previews;
pub mod page_range;
pub mod scrape_html;
pub mod search_engine;
pub mod session_stats;

use serde::Serialize;

use relay_client::canonicalize;
use relay_core::{CachedPage, Error, ErrorDetails};

use crate::context::AppContext;

/// Result status reported in every tool payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Inline error carried by a failed batch item.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub error: String,
    pub error_details: ErrorDetails,
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self { error: err.message(), error_details: err.details() }
    }
}

/// Outcome of one batch item, flattened next to the item's input echo.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Ok(T),
    Error(Failure),
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(err) => Outcome::Error(err.into()),
        }
    }
}

/// One slot of a batch tool's `results`, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem<I, T> {
    #[serde(flatten)]
    pub input: I,
    #[serde(flatten)]
    pub outcome: Outcome<T>,
}

/// Fetch `url` as normalized markdown through the page cache.
///
/// The canonical URL is the cache key. Returns it together with the page.
pub(crate) async fn cached_page(ctx: &AppContext, url: &str, correlation_id: &str) -> Result<(String, CachedPage), Error> {
    let key = canonicalize(url)?.to_string();
    let fetcher = ctx.fetcher.clone();
    let correlation_id = correlation_id.to_string();

    let page = ctx
        .cache
        .get_or_fetch(&key, |key| async move { fetcher.fetch_markdown(&key, Some(&correlation_id)).await })
        .await?;

    Ok((key, page))
}
