//! Invocable tool handles.
//!
//! A handle is produced once, at load time, and carries everything needed to
//! run the tool. Callers only ever see [`ToolHandle::execute`]; the execution
//! model is fixed by the variant chosen when the tool was loaded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use super::error::ToolError;
use crate::domains::catalog::ToolType;
use super::script::ScriptHandle;

/// Limits and collaborators applied to every execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Wall-clock budget for one invocation.
    pub timeout: Duration,
    /// Interpreter used for script tools.
    pub interpreter: String,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interpreter: "python3".to_string(),
        }
    }
}

/// The loaded, invocable form of a tool.
#[derive(Clone)]
pub enum ToolHandle {
    /// In-process entry point.
    Native(NativeHandle),
    /// External interpreter script.
    Script(ScriptHandle),
}

impl ToolHandle {
    /// Short label for logs and debug output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Script(_) => "script",
        }
    }

    /// The tool type this execution model serves.
    pub fn tool_type(&self) -> ToolType {
        match self {
            Self::Native(_) => ToolType::NativePlugin,
            Self::Script(_) => ToolType::InterpretedScript,
        }
    }

    /// Run the tool against a raw payload, bounded by `ctx.timeout`.
    pub async fn execute(&self, input: &[u8], ctx: &ExecutionContext) -> Result<Vec<u8>, ToolError> {
        match self {
            Self::Native(native) => native.call(input, ctx.timeout).await,
            Self::Script(script) => script.run(&ctx.interpreter, input, ctx.timeout).await,
        }
    }
}

type NativeEntry = dyn Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync;

/// An in-process entry point: bytes in, bytes or an error message out.
#[derive(Clone)]
pub struct NativeHandle {
    entry: Arc<NativeEntry>,
}

impl NativeHandle {
    /// Wrap any in-process function as a native tool.
    pub fn from_fn<F>(entry: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        Self {
            entry: Arc::new(entry),
        }
    }

    /// Invoke the entry point on a dedicated thread and wait up to `timeout`.
    ///
    /// An in-process call cannot be interrupted. When the timeout fires the
    /// caller gets [`ToolError::Timeout`] and the thread is left to finish on
    /// its own; its result is discarded.
    pub async fn call(&self, input: &[u8], timeout: Duration) -> Result<Vec<u8>, ToolError> {
        let entry = Arc::clone(&self.entry);
        let input = input.to_vec();
        let (tx, rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("native-tool".to_string())
            .spawn(move || {
                let _ = tx.send(entry(&input));
            })
            .map_err(|e| ToolError::internal(format!("failed to spawn tool thread: {e}")))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(message))) => Err(ToolError::execution_failed(message)),
            Ok(Err(_)) => Err(ToolError::internal(
                "native tool terminated without producing a result",
            )),
            Err(_) => {
                debug!("Abandoning native tool call after {:?}", timeout);
                Err(ToolError::Timeout(timeout))
            }
        }
    }
}
