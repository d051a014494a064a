//! Dispatch domain module.
//!
//! - `dispatcher.rs` - Resource access and tool execution
//! - `payload.rs` - Input validation and output normalization

mod dispatcher;
mod payload;

pub use dispatcher::Dispatcher;
pub use payload::{PayloadError, validate_and_format_output, validate_input};
