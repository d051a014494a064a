//! Hot-loading MCP server.
//!
//! Resources and tools live as plain files in two watched directories. The
//! server mirrors those directories into an in-memory catalog and keeps it
//! current while running: a file dropped into the tools directory becomes a
//! callable tool, deleting it withdraws the tool, all without a restart.
//!
//! # Architecture
//!
//! - **core**: configuration, unified error, the `McpServer` handler and transports
//! - **domains**
//!   - **catalog**: the live registry and file classification
//!   - **tools**: native plugin and script loading and execution
//!   - **dispatch**: payload validation, resource access, tool execution
//!   - **sync**: directory watching that drives the catalog
//!   - **resources**: resource errors
//!
//! # Example
//!
//! ```rust,no_run
//! use hotload_mcp_server::{Config, McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = McpServer::new(Config::from_env());
//!     server.start().await?;
//!     println!("{}", server.catalog().export_json()?);
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

pub use core::{Config, Error, McpServer, Result};
