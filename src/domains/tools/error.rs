//! Tool-specific error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domains::catalog::ToolType;
use crate::domains::dispatch::PayloadError;

/// Errors that can occur while loading or executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The tool file has an extension no loader understands.
    #[error("Unsupported tool type: {0}")]
    UnsupportedType(ToolType),

    /// The tool could not be turned into an invocable handle.
    #[error("Failed to load tool {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// The request payload is not well-formed JSON.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] PayloadError),

    /// The tool ran and reported a failure.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The tool did not finish within its time budget.
    #[error("Tool execution timed out after {0:?}")]
    Timeout(Duration),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new load error for the tool at `path`.
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a new "internal" error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a timeout rather than a tool-reported failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
