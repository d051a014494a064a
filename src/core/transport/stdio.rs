//! MCP over stdin/stdout.

use rmcp::ServiceExt;
use tracing::info;

use super::{TransportError, TransportResult};
use crate::core::McpServer;

pub struct StdioTransport;

impl StdioTransport {
    /// Serve a single client on stdin/stdout until it disconnects.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        let counts = server.catalog().counts();
        info!(
            "Serving {} resources and {} tools on stdio",
            counts.resources, counts.tools
        );

        let session = server
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| TransportError::init(e.to_string()))?;

        session
            .waiting()
            .await
            .map_err(|e| TransportError::service(e.to_string()))?;

        info!("Stdio client disconnected");
        Ok(())
    }
}
