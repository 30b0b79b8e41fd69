//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::context::AppContext;
use crate::tools::grep_page::{GrepPageParams, grep_impl};
use crate::tools::page_previews::{PagePreviewsParams, previews_impl};
use crate::tools::page_range::{PageRangeParams, range_impl};
use crate::tools::scrape_html::{ScrapeHtmlParams, scrape_impl};
use crate::tools::search_engine::{SearchEngineParams, search_impl};
use crate::tools::session_stats::stats_impl;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use serde_json::json;

/// The main MCP server handler for mcp-relay.
#[derive(Clone)]
pub struct RelayServer {
    ctx: Arc<AppContext>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl RelayServer {
    /// Create a new server handler over the shared context.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx, tool_router: Self::tool_router() }
    }

    /// Run web searches and return result pages as markdown.
    #[tool(
        description = "Search Google, Bing or Yandex for up to 5 queries at once. Returns markdown results per query; Google results are reduced to a list of titles and links."
    )]
    async fn search_engine(&self, params: Parameters<SearchEngineParams>) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let ctx = Arc::clone(&self.ctx);
        self.ctx
            .dispatch("search_engine", &params, |cid| search_impl(ctx, params.clone(), cid))
            .await
    }

    /// Fetch the first lines of up to ten pages.
    ///
    /// Pages are cached, so later range and grep calls on the same URL do not
    /// refetch.
    #[tool(
        description = "Fetch up to 10 web pages as markdown and return the first 500 lines of each. Pages are cached for follow-up get_page_content_range and grep_page_content calls."
    )]
    async fn get_page_previews(&self, params: Parameters<PagePreviewsParams>) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let ctx = Arc::clone(&self.ctx);
        self.ctx
            .dispatch("get_page_previews", &params, |cid| previews_impl(ctx, params.clone(), cid))
            .await
    }

    #[tool(
        description = "Return lines start_line..=end_line (1-indexed, at most 5000) of a page as markdown. Uses the page cache."
    )]
    async fn get_page_content_range(&self, params: Parameters<PageRangeParams>) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let ctx = Arc::clone(&self.ctx);
        self.ctx
            .dispatch("get_page_content_range", &params, |cid| range_impl(ctx, params.clone(), cid))
            .await
    }

    #[tool(
        description = "Search a page's markdown for a regular expression (bare or /pattern/flags). Returns matching line numbers with 25 lines of context each. Uses the page cache."
    )]
    async fn grep_page_content(&self, params: Parameters<GrepPageParams>) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let ctx = Arc::clone(&self.ctx);
        self.ctx
            .dispatch("grep_page_content", &params, |cid| grep_impl(ctx, params.clone(), cid))
            .await
    }

    /// Fetch a page as raw HTML.
    #[tool(description = "Fetch a web page as raw HTML. Not cached.")]
    async fn scrape_as_html(&self, params: Parameters<ScrapeHtmlParams>) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let ctx = &self.ctx;
        ctx.dispatch("scrape_as_html", &params, |cid| scrape_impl(ctx, params.clone(), cid))
            .await
    }

    #[tool(description = "Report how many times each tool has been called in this session.")]
    async fn session_stats(&self) -> Result<CallToolResult, McpError> {
        let ctx = &self.ctx;
        ctx.dispatch("session_stats", &json!({}), |_| stats_impl(ctx)).await
    }
}

impl ServerHandler for RelayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-relay".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
