//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables or defaults.

use super::transport::TransportConfig;
use crate::domains::tools::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Watched directories.
    pub catalog: CatalogConfig,

    /// Tool execution limits.
    pub execution: ExecutionConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Directories mirrored into the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory whose files are exposed as resources.
    pub resources_dir: PathBuf,

    /// Directory whose files are loaded as tools.
    pub tools_dir: PathBuf,
}

/// Configuration for tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock limit for a single tool invocation, in seconds.
    pub timeout_secs: u64,

    /// Interpreter used to run script tools.
    pub interpreter: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("./resources"),
            tools_dir: PathBuf::from("./tools"),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            interpreter: "python3".to_string(),
        }
    }
}

impl ExecutionConfig {
    /// The runtime context handed to the dispatcher.
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            timeout: Duration::from_secs(self.timeout_secs),
            interpreter: self.interpreter.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "hotload-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            catalog: CatalogConfig::default(),
            execution: ExecutionConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_RESOURCES_DIR`, `MCP_LOG_LEVEL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(dir) = std::env::var("MCP_RESOURCES_DIR") {
            config.catalog.resources_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("MCP_TOOLS_DIR") {
            config.catalog.tools_dir = PathBuf::from(dir);
        }

        if let Ok(secs) = std::env::var("MCP_TOOL_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => config.execution.timeout_secs = secs,
                _ => warn!(
                    "Ignoring invalid MCP_TOOL_TIMEOUT_SECS={:?}, using {}s",
                    secs, config.execution.timeout_secs
                ),
            }
        }

        if let Ok(interpreter) = std::env::var("MCP_SCRIPT_INTERPRETER") {
            config.execution.interpreter = interpreter;
        }

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        config
    }
}
