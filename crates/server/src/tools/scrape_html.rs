//! scrape_as_html tool implementation.
//!
//! Returns the page as raw HTML. HTML is not line-normalized, so it bypasses
//! the page cache.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use relay_client::canonicalize;
use relay_core::Error;

use crate::context::AppContext;
use crate::tools::Status;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrapeHtmlParams {
    /// URL of the page to scrape.
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeHtmlOutput {
    pub url: String,
    pub status: Status,
    pub content: String,
}

pub async fn scrape_impl(ctx: &AppContext, params: ScrapeHtmlParams, correlation_id: String) -> Result<ScrapeHtmlOutput, Error> {
    let target = canonicalize(&params.url)?;
    let content = ctx.fetcher.fetch_html(target.as_str(), Some(&correlation_id)).await?;

    Ok(ScrapeHtmlOutput { url: params.url, status: Status::Ok, content })
}
