//! Transports exposing the MCP server.
//!
//! - `stdio` (default feature): rmcp over stdin/stdout
//! - `tcp`: one rmcp session per accepted connection
//! - `http`: JSON-RPC over POST plus REST routes for the catalog

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;

#[cfg(feature = "http")]
pub use config::HttpConfig;
