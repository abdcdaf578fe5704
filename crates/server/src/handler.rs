//! MCP server handler implementation.
//!
//! This module defines the server handler that routes tool calls to the
//! layer's registration.
use std::sync::Arc;

use crate::tools::{
    LayerControlParams, LayerFetchParams, LayerInstallParams, control_impl, fetch_impl, install_impl, status_impl,
};

use havn_client::{LayerContext, Registration};
use havn_core::AppConfig;
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

/// The MCP server handler for havn.
#[derive(Clone)]
pub struct HavnServer {
    registration: Arc<Registration>,
    context: LayerContext,
    config: Arc<AppConfig>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl HavnServer {
    pub fn new(registration: Arc<Registration>, context: LayerContext, config: AppConfig) -> Self {
        Self { registration, context, config: Arc::new(config), tool_router: Self::tool_router() }
    }

    /// Route one request through the active version of the layer.
    #[tool(
        description = "Send a request through the offline layer. Returns status, headers, body and where the response came from (network, cache, fallback, offline, passthrough)."
    )]
    async fn layer_fetch(&self, params: Parameters<LayerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, &self.context.origin, params.0).await
    }

    #[tool(description = "Send a control message to the layer. \"take-over-now\" activates a waiting version immediately.")]
    async fn layer_control(&self, params: Parameters<LayerControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.registration, params.0).await
    }

    #[tool(
        description = "Install a new version of the layer, pre-populating its manifest. It takes over at once unless a session holds the current version."
    )]
    async fn layer_install(&self, params: Parameters<LayerInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.registration, &self.context, &self.config, params.0).await
    }

    #[tool(description = "Report the active and waiting versions, open sessions and cache generations.")]
    async fn layer_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }
}

impl ServerHandler for HavnServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "havn".into(),
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
