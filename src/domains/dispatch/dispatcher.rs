//! Request dispatcher.
//!
//! Resolves names against the catalog on every call, then serves resource
//! content or runs a tool under the configured time budget. Every successful
//! answer is well-formed JSON.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use super::payload::{validate_and_format_output, validate_input};
use crate::domains::catalog::{Catalog, ResourceDescriptor, ToolDescriptor};
use crate::domains::resources::ResourceError;
use crate::domains::tools::{ExecutionContext, ToolError};

/// Serves resources and executes tools from a shared catalog.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    ctx: ExecutionContext,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, ctx: ExecutionContext) -> Self {
        Self { catalog, ctx }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Look up a resource by name and read it.
    pub async fn read_resource(&self, name: &str, input: &[u8]) -> Result<Vec<u8>, ResourceError> {
        let resource = self
            .catalog
            .get_resource(name)
            .ok_or_else(|| ResourceError::not_found(name))?;
        self.access_resource(&resource, input).await
    }

    /// Look up a tool by name and execute it.
    pub async fn call_tool(&self, name: &str, input: &[u8]) -> Result<Vec<u8>, ToolError> {
        let tool = self
            .catalog
            .get_tool(name)
            .ok_or_else(|| ToolError::not_found(name))?;
        self.execute_tool(&tool, input).await
    }

    /// Read a resource file and wrap it in the `contents` envelope.
    #[instrument(skip_all, fields(resource = %resource.name))]
    pub async fn access_resource(
        &self,
        resource: &ResourceDescriptor,
        input: &[u8],
    ) -> Result<Vec<u8>, ResourceError> {
        validate_input(input)?;

        let content = tokio::fs::read(&resource.file_path)
            .await
            .map_err(|e| ResourceError::read(&resource.file_path, e))?;

        let envelope = json!({
            "contents": [
                {
                    "uri": resource.uri(),
                    "mimeType": resource.mime_type,
                    "text": String::from_utf8_lossy(&content),
                }
            ]
        });

        serde_json::to_vec(&envelope).map_err(|e| ResourceError::internal(e.to_string()))
    }

    /// Execute a tool against a raw JSON payload.
    #[instrument(skip_all, fields(tool = %tool.name, kind = tool.handle.kind()))]
    pub async fn execute_tool(
        &self,
        tool: &ToolDescriptor,
        input: &[u8],
    ) -> Result<Vec<u8>, ToolError> {
        validate_input(input)?;

        let output = match tool.handle.execute(input, &self.ctx).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool {} failed: {}", tool.name, e);
                return Err(e);
            }
        };

        info!("Tool {} executed successfully", tool.name);
        validate_and_format_output(output).map_err(|e| ToolError::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::dispatch::PayloadError;
    use crate::domains::tools::{NativeHandle, ToolHandle};
    use serde_json::Value;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn dispatcher(timeout: Duration) -> Dispatcher {
        let ctx = ExecutionContext {
            timeout,
            interpreter: "sh".to_string(),
        };
        Dispatcher::new(Arc::new(Catalog::new()), ctx)
    }

    fn parse(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_access_resource_envelope() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# Notes\n").unwrap();

        let dispatcher = dispatcher(Duration::from_secs(5));
        dispatcher.catalog().register_resource("notes", &path);

        let output = assert_ok!(dispatcher.read_resource("notes", b"{}").await);
        let value = parse(&output);
        let item = &value["contents"][0];
        assert_eq!(item["uri"], format!("file://{}", path.display()));
        assert_eq!(item["mimeType"], "text/markdown");
        assert_eq!(item["text"], "# Notes\n");
    }

    #[tokio::test]
    async fn test_access_resource_invalid_input() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let resource = dispatcher.catalog().register_resource("notes", "/nonexistent/notes.md");

        let err = assert_err!(dispatcher.access_resource(&resource, b"").await);
        assert!(matches!(err, ResourceError::InvalidInput(PayloadError::Empty)));
        let err = assert_err!(dispatcher.access_resource(&resource, b"nope").await);
        assert!(err.to_string().starts_with("Invalid input"));
    }

    #[tokio::test]
    async fn test_access_resource_read_failure() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let resource = dispatcher.catalog().register_resource("gone", "/nonexistent/gone.txt");

        let err = assert_err!(dispatcher.access_resource(&resource, b"{}").await);
        assert!(matches!(err, ResourceError::Read { .. }));
    }

    #[tokio::test]
    async fn test_unknown_names() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        assert!(matches!(
            dispatcher.read_resource("missing", b"{}").await,
            Err(ResourceError::NotFound(_))
        ));
        assert!(matches!(
            dispatcher.call_tool("missing", b"{}").await,
            Err(ToolError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_native_json_output() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let handle = NativeHandle::from_fn(|_| Ok(br#"{"sum":5}"#.to_vec()));
        dispatcher
            .catalog()
            .register_tool_handle("add", "/t/add.so", "adds", ToolHandle::Native(handle));

        let output = assert_ok!(dispatcher.call_tool("add", br#"{"a":2,"b":3}"#).await);
        assert_eq!(output, br#"{"sum":5}"#);
    }

    #[tokio::test]
    async fn test_execute_native_text_output_is_wrapped() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let handle = NativeHandle::from_fn(|_| Ok(b"Result: 4\n".to_vec()));
        dispatcher
            .catalog()
            .register_tool_handle("calc", "/t/calc.so", "calc", ToolHandle::Native(handle));

        let output = assert_ok!(dispatcher.call_tool("calc", b"{}").await);
        assert_eq!(parse(&output)["content"][0]["text"], "Result: 4");
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_input_before_running() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let handle = NativeHandle::from_fn(|_| panic!("must not run"));
        let tool = dispatcher.catalog().register_tool_handle(
            "calc",
            "/t/calc.so",
            "calc",
            ToolHandle::Native(handle),
        );

        let err = assert_err!(dispatcher.execute_tool(&tool, b"").await);
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_execute_native_timeout() {
        let dispatcher = dispatcher(Duration::from_millis(300));
        let handle = NativeHandle::from_fn(|_| {
            std::thread::sleep(Duration::from_secs(3));
            Ok(b"{}".to_vec())
        });
        let tool = dispatcher.catalog().register_tool_handle(
            "slow",
            "/t/slow.so",
            "slow",
            ToolHandle::Native(handle),
        );

        let started = Instant::now();
        let err = assert_err!(dispatcher.execute_tool(&tool, b"{}").await);
        let elapsed = started.elapsed();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_script_tool() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shout.py");
        fs::write(&path, "tr a-z A-Z\n").unwrap();

        let dispatcher = dispatcher(Duration::from_secs(10));
        assert_ok!(dispatcher.catalog().register_tool("shout", &path, "shout"));

        let output = assert_ok!(dispatcher.call_tool("shout", br#""hello""#).await);
        assert_eq!(output, br#""HELLO""#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_compiled_native_plugin() {
        use crate::domains::tools::native::fixtures::{ECHO, FAILING, build_plugin};

        let dir = TempDir::new().unwrap();
        let (Some(echo), Some(failing)) = (
            build_plugin(dir.path(), "echo", ECHO),
            build_plugin(dir.path(), "failing", FAILING),
        ) else {
            return;
        };

        let dispatcher = dispatcher(Duration::from_secs(5));
        assert_ok!(dispatcher.catalog().register_tool("echo", &echo, "echo"));
        assert_ok!(dispatcher.catalog().register_tool("failing", &failing, "fails"));

        let output = assert_ok!(dispatcher.call_tool("echo", br#"{"a":2,"b":3}"#).await);
        assert_eq!(output, br#"{"a":2,"b":3}"#);

        let err = assert_err!(dispatcher.call_tool("failing", b"{}").await);
        assert!(matches!(err, ToolError::ExecutionFailed(ref m) if m == "bad expression"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_script_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hang.py");
        fs::write(&path, "exec sleep 30\n").unwrap();

        let dispatcher = dispatcher(Duration::from_millis(300));
        assert_ok!(dispatcher.catalog().register_tool("hang", &path, "hang"));

        let err = assert_err!(dispatcher.call_tool("hang", b"{}").await);
        assert!(err.is_timeout());
    }
}
