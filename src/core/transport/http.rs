//! HTTP transport implementation.
//!
//! Two surfaces share one listener:
//! - a JSON-RPC 2.0 endpoint (POST `rpc_path`) speaking the MCP methods
//! - REST routes under `api_prefix` that expose the catalog directly, taking
//!   the raw request body as the resource or tool payload

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, instrument, warn};

use super::{TransportError, TransportResult, config::HttpConfig};
use crate::core::McpServer;
use crate::domains::{catalog::CatalogExport, resources::ResourceError, tools::ToolError};

const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct HttpTransport {
    config: HttpConfig,
}

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::error(id, -32600, "Invalid Request")
    }

    pub fn method_not_found(id: Option<Value>) -> Self {
        Self::error(id, -32601, "Method not found")
    }

    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32602, msg)
    }
}

/// REST failure with its status code; renders as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let status = match &err {
            ToolError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ToolError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        let status = match &err {
            ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
            ResourceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until the task is cancelled.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let app = router(server, &self.config);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        info!(
            "Listening on http://{} (CORS {})",
            addr,
            if self.config.enable_cors { "enabled" } else { "disabled" }
        );
        info!("  → JSON-RPC: POST {}", self.config.rpc_path);
        info!("  → REST:     {}/{{health,resources,tools,registry}}", self.config.api_prefix);

        axum::serve(listener, app)
            .await
            .map_err(|e| TransportError::http(e.to_string()))
    }
}

/// Build the full router for a server.
pub fn router(server: McpServer, config: &HttpConfig) -> Router {
    let prefix = config.api_prefix.trim_end_matches('/');

    let mut app = Router::new()
        .route(&config.rpc_path, post(handle_rpc))
        .route("/", get(root_handler))
        .route(&format!("{prefix}/health"), get(health_check))
        .route(&format!("{prefix}/registry"), get(export_registry))
        .route(&format!("{prefix}/resources"), get(list_resources))
        .route(
            &format!("{prefix}/resources/{{name}}"),
            get(get_resource).post(access_resource),
        )
        .route(&format!("{prefix}/tools"), get(list_tools))
        .route(
            &format!("{prefix}/tools/{{name}}"),
            get(get_tool).post(execute_tool),
        )
        .with_state(server);

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

async fn root_handler(State(server): State<McpServer>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": server.name(),
        "version": server.version(),
        "transport": "HTTP",
        "protocol": "JSON-RPC 2.0"
    }))
}

async fn health_check(State(server): State<McpServer>) -> impl IntoResponse {
    let stats = server.sync_stats();
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "watching": stats.running,
        "resources": stats.resources,
        "tools": stats.tools
    }))
}

// ============================================================================
// REST routes
// ============================================================================

async fn export_registry(State(server): State<McpServer>) -> Json<CatalogExport> {
    Json(server.export_registry())
}

async fn list_resources(State(server): State<McpServer>) -> impl IntoResponse {
    let export = server.export_registry();
    Json(serde_json::json!({
        "resources": export.resources.into_values().collect::<Vec<_>>(),
        "count": export.counts.resources
    }))
}

async fn get_resource(
    State(server): State<McpServer>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = server
        .catalog()
        .get_resource(&name)
        .ok_or_else(|| ApiError::not_found(format!("Resource not found: {}", name)))?;
    Ok(Json(resource.as_ref().clone()))
}

#[instrument(skip(server, body))]
async fn access_resource(
    State(server): State<McpServer>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let output = server.dispatcher().read_resource(&name, &body).await?;
    Ok(json_bytes(output))
}

async fn list_tools(State(server): State<McpServer>) -> impl IntoResponse {
    let export = server.export_registry();
    Json(serde_json::json!({
        "tools": export.tools.into_values().collect::<Vec<_>>(),
        "count": export.counts.tools
    }))
}

async fn get_tool(
    State(server): State<McpServer>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tool = server
        .catalog()
        .get_tool(&name)
        .ok_or_else(|| ApiError::not_found(format!("Tool not found: {}", name)))?;
    Ok(Json(tool.as_ref().clone()))
}

#[instrument(skip(server, body))]
async fn execute_tool(
    State(server): State<McpServer>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let output = server.dispatcher().call_tool(&name, &body).await?;
    Ok(json_bytes(output))
}

fn json_bytes(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

// ============================================================================
// JSON-RPC
// ============================================================================

#[instrument(skip_all, fields(method))]
async fn handle_rpc(
    State(server): State<McpServer>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    tracing::Span::current().record("method", &request.method);
    let response = process_request(&server, request).await;
    (StatusCode::OK, Json(response))
}

async fn process_request(server: &McpServer, request: JsonRpcRequest) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::invalid_request(request.id);
    }

    match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            request.id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": server.name(),
                    "version": server.version()
                }
            }),
        ),

        "tools/list" => JsonRpcResponse::success(
            request.id,
            serde_json::json!({ "tools": server.list_tools_json() }),
        ),

        "tools/call" => {
            let params = request.params.unwrap_or_default();
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return JsonRpcResponse::invalid_params(request.id, "Missing tool name");
            };
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));

            match server.call_tool_json(name, arguments).await {
                Ok(result) => JsonRpcResponse::success(request.id, result),
                Err(e) => JsonRpcResponse::invalid_params(request.id, e),
            }
        }

        "resources/list" => JsonRpcResponse::success(
            request.id,
            serde_json::json!({ "resources": server.list_resources_json() }),
        ),

        "resources/read" => {
            let params = request.params.unwrap_or_default();
            let Some(uri) = params.get("uri").and_then(Value::as_str) else {
                return JsonRpcResponse::invalid_params(request.id, "Missing resource URI");
            };

            match server.read_resource_json(uri).await {
                Ok(result) => JsonRpcResponse::success(request.id, result),
                Err(e) => JsonRpcResponse::invalid_params(request.id, e),
            }
        }

        method if method.starts_with("notifications/") => {
            info!("Received notification: {}", method);
            JsonRpcResponse::success(request.id, Value::Null)
        }

        _ => {
            warn!("Unknown method: {}", request.method);
            JsonRpcResponse::method_not_found(request.id)
        }
    }
}
