//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::host::ServiceHost;
use crate::tools::{
    FormSubmitParams, FormSyncParams, SwFetchParams, SwInstallParams, fetch, forms, lifecycle, messages,
};

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
use swcache_core::Message;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    host: Arc<ServiceHost>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SwCacheServer {
    pub fn new(host: Arc<ServiceHost>) -> Self {
        Self { host, tool_router: Self::tool_router() }
    }

    /// Route a request through the active cache worker.
    #[tool(
        description = "Fetch a URL as a controlled page would. Static assets are served cache-first, pages and APIs network-first, allow-listed third parties stale-while-revalidate. Reports whether the response came from the network, the cache or the offline page."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch::fetch_impl(&self.host, params.0).await
    }

    #[tool(
        description = "Install a cache version: fetch every critical resource into its static cache (all or nothing). Activates immediately unless another version is active and skip-waiting is off."
    )]
    async fn sw_install(&self, params: Parameters<SwInstallParams>) -> Result<CallToolResult, McpError> {
        lifecycle::install_impl(&self.host, params.0).await
    }

    #[tool(description = "Activate the waiting cache version and delete caches left by older versions.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        lifecycle::activate_impl(&self.host).await
    }

    #[tool(description = "Send SKIP_WAITING. Replies {success: false} when no version is waiting.")]
    async fn skip_waiting(&self) -> Result<CallToolResult, McpError> {
        messages::message_impl(&self.host, Message::SkipWaiting).await
    }

    #[tool(description = "Send CACHE_STATS. Replies with entry counts per cache, totalCaches and totalResources.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        messages::message_impl(&self.host, Message::CacheStats).await
    }

    #[tool(description = "Send CLEAR_CACHE. Deletes every cache and replies {success: true}.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        messages::message_impl(&self.host, Message::ClearCache).await
    }

    /// Submit the contact form, queueing it when offline.
    #[tool(description = "Submit a contact form payload. Queued for background sync if the network is unreachable.")]
    async fn form_submit(&self, params: Parameters<FormSubmitParams>) -> Result<CallToolResult, McpError> {
        forms::submit_impl(&self.host, params.0).await
    }

    #[tool(description = "Run a background sync (default tag: contact-form-sync) replaying queued form submissions.")]
    async fn form_sync(&self, params: Parameters<FormSyncParams>) -> Result<CallToolResult, McpError> {
        forms::sync_impl(&self.host, params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
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
