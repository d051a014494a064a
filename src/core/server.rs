//! MCP Server implementation and lifecycle management.
//!
//! The server owns the live catalog, the dispatcher that serves it and the
//! directory synchronizer that keeps it current. Resources and tools are not
//! compiled in: every listing and call goes back to the catalog, so files
//! dropped into the watched directories show up without a restart.

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use super::config::Config;
use super::error::Result;
use crate::domains::{
    catalog::{Catalog, CatalogExport, ResourceDescriptor, ToolDescriptor},
    dispatch::Dispatcher,
    sync::{DirectorySync, SyncStats},
    tools::ToolError,
};

/// The main MCP server handler.
///
/// This struct implements the `ServerHandler` trait from rmcp and answers
/// every request from the current state of the catalog.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Live registry of resources and tools.
    catalog: Arc<Catalog>,

    /// Resource access and tool execution.
    dispatcher: Dispatcher,

    /// Keeps the catalog in step with the watched directories.
    sync: Arc<DirectorySync>,
}

impl McpServer {
    /// Create a new MCP server with the given configuration.
    ///
    /// Nothing is loaded until [`McpServer::start`] is called.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let catalog = Arc::new(Catalog::new());

        let dispatcher = Dispatcher::new(Arc::clone(&catalog), config.execution.context());
        let sync = Arc::new(DirectorySync::new(
            Arc::clone(&catalog),
            config.catalog.resources_dir.clone(),
            config.catalog.tools_dir.clone(),
        ));

        Self {
            config,
            catalog,
            dispatcher,
            sync,
        }
    }

    /// Scan the watched directories and start following changes.
    pub async fn start(&self) -> Result<()> {
        self.sync.start().await?;
        let counts = self.catalog.counts();
        info!(
            "Catalog ready: {} resources, {} tools",
            counts.resources, counts.tools
        );
        Ok(())
    }

    /// Stop following directory changes.
    pub async fn shutdown(&self) {
        self.sync.stop().await;
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Find a resource by catalog name or by its `file://` URI.
    pub fn resolve_resource(&self, key: &str) -> Option<Arc<ResourceDescriptor>> {
        self.catalog.get_resource(key).or_else(|| {
            self.catalog
                .list_resources()
                .into_iter()
                .find(|resource| resource.uri() == key)
        })
    }

    // ========================================================================
    // MCP model conversion
    // ========================================================================

    /// All catalog resources as MCP resource models.
    pub fn resources(&self) -> Vec<Resource> {
        let mut resources: Vec<_> = self
            .catalog
            .list_resources()
            .iter()
            .map(|r| to_resource(r))
            .collect();
        resources.sort_by(|a, b| a.raw.name.cmp(&b.raw.name));
        resources
    }

    /// All catalog tools as MCP tool models.
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools: Vec<_> = self.catalog.list_tools().iter().map(|t| to_tool(t)).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    // ========================================================================
    // HTTP Transport Support Methods
    // ========================================================================

    /// Snapshot of the whole catalog (for HTTP transport).
    pub fn export_registry(&self) -> CatalogExport {
        self.catalog.export_registry()
    }

    /// List all available tools (for HTTP transport).
    pub fn list_tools_json(&self) -> Vec<Value> {
        self.tools()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect()
    }

    /// List all available resources (for HTTP transport).
    pub fn list_resources_json(&self) -> Vec<Value> {
        self.resources()
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "uri": r.raw.uri,
                    "name": r.raw.name,
                    "mimeType": r.raw.mime_type
                })
            })
            .collect()
    }

    /// Read a resource and return the MCP read result (for HTTP transport).
    pub async fn read_resource_json(&self, uri: &str) -> std::result::Result<Value, String> {
        let resource = self
            .resolve_resource(uri)
            .ok_or_else(|| format!("Resource not found: {}", uri))?;
        let output = self
            .dispatcher
            .access_resource(&resource, b"{}")
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_slice(&output).map_err(|e| e.to_string())
    }

    /// Call a tool and return an MCP call result (for HTTP transport).
    pub async fn call_tool_json(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<Value, String> {
        let payload = serde_json::to_vec(&arguments).map_err(|e| e.to_string())?;
        let result = match self.dispatcher.call_tool(name, &payload).await {
            Ok(output) => tool_result(&output),
            Err(ToolError::NotFound(name)) => return Err(format!("Unknown tool: {}", name)),
            Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
        };
        serde_json::to_value(result).map_err(|e| e.to_string())
    }
}

fn to_resource(resource: &ResourceDescriptor) -> Resource {
    let mut raw = RawResource::new(resource.uri(), resource.name.clone());
    if !resource.mime_type.is_empty() {
        raw.mime_type = Some(resource.mime_type.clone());
    }
    raw.no_annotation()
}

fn to_tool(tool: &ToolDescriptor) -> Tool {
    Tool {
        name: tool.name.clone().into(),
        description: Some(tool.description.clone().into()),
        input_schema: Arc::new(tool.input_schema.clone()),
        annotations: None,
        output_schema: None,
        icons: None,
        meta: None,
        title: None,
    }
}

/// Convert normalized tool output into a call result.
///
/// Output already shaped as MCP content (`{"content": [...]}`) is passed
/// through; any other JSON document becomes a single text item.
fn tool_result(output: &[u8]) -> CallToolResult {
    let parsed = serde_json::from_slice::<Value>(output).ok();
    let content = parsed
        .as_ref()
        .and_then(|v| v.get("content"))
        .and_then(|c| serde_json::from_value::<Vec<Content>>(c.clone()).ok());
    let is_error = parsed
        .as_ref()
        .and_then(|v| v.get("isError"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match content {
        Some(content) if is_error => CallToolResult::error(content),
        Some(content) => CallToolResult::success(content),
        None => CallToolResult::success(vec![Content::text(
            String::from_utf8_lossy(output).into_owned(),
        )]),
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Resources and tools are loaded from watched directories and change at runtime."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListResourcesResult, McpError> {
        info!("Listing resources");
        Ok(ListResourcesResult {
            resources: self.resources(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context))]
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ReadResourceResult, McpError> {
        info!("Reading resource: {}", request.uri);
        let resource = self.resolve_resource(&request.uri).ok_or_else(|| {
            McpError::resource_not_found(format!("Resource not found: {}", request.uri), None)
        })?;

        let output = self
            .dispatcher
            .access_resource(&resource, b"{}")
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        serde_json::from_slice(&output).map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        info!("Listing tools");
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("Calling tool: {}", request.name);
        let payload = serde_json::to_vec(&request.arguments.unwrap_or_default())
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        match self.dispatcher.call_tool(&request.name, &payload).await {
            Ok(output) => Ok(tool_result(&output)),
            Err(ToolError::NotFound(name)) => Err(McpError::invalid_params(
                format!("Unknown tool: {}", name),
                None,
            )),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}
