//! get_page_content_range tool implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use relay_core::Error;
use relay_core::text::{MAX_LINE_WIDTH, range, validate_range};

use crate::context::AppContext;
use crate::tools::{Status, cached_page};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageRangeParams {
    /// URL of the page.
    pub url: String,
    /// First line to return, 1-indexed.
    pub start_line: usize,
    /// Last line to return, inclusive. At most 5000 lines per request.
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageRangeOutput {
    pub url: String,
    pub status: Status,
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
    pub start_line: usize,
    pub end_line: usize,
    pub total_lines: usize,
    pub lines_returned: usize,
    pub truncated: bool,
    pub max_line_length: usize,
    pub content: String,
}

pub async fn range_impl(
    ctx: Arc<AppContext>, params: PageRangeParams, correlation_id: String,
) -> Result<PageRangeOutput, Error> {
    validate_range(params.start_line, params.end_line)?;

    let (_, page) = cached_page(&ctx, &params.url, &correlation_id).await?;
    let r = range(&page.content, params.start_line, params.end_line);

    Ok(PageRangeOutput {
        url: params.url,
        status: Status::Ok,
        from_cache: page.from_cache,
        fetched_at: page.fetched_at,
        start_line: r.start_line,
        end_line: r.end_line,
        total_lines: r.total_lines,
        lines_returned: r.lines_returned,
        truncated: r.truncated,
        max_line_length: MAX_LINE_WIDTH,
        content: r.text,
    })
}
