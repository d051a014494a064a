//! Tools domain module.
//!
//! Tools are invocable procedures discovered in the tools directory. Each tool
//! file is loaded into a [`ToolHandle`] whose single `execute` operation hides
//! the execution model.
//!
//! ## Architecture
//!
//! - `loader.rs` - Maps a tool file to a handle by extension
//! - `handle.rs` - The handle enum and the in-process call path
//! - `native.rs` - Shared-library plugin ABI (`.so`, `.dylib`, `.dll`)
//! - `script.rs` - Interpreter subprocess execution (`.py`)
//! - `error.rs` - Tool-specific error types

mod error;
mod handle;
mod loader;
pub mod native;
mod script;

pub use error::ToolError;
pub use handle::{ExecutionContext, NativeHandle, ToolHandle};
pub use loader::load_handler;
pub use script::ScriptHandle;
