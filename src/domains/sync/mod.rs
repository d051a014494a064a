//! Directory synchronization.
//!
//! - `watcher.rs` - `DirectorySync`: start-up scan plus the event loop
//! - `events.rs` - Mapping of `notify` events to create/write/remove/rename
//! - `error.rs` - Start-up failures

mod error;
mod events;
mod watcher;

pub use error::SyncError;
pub use events::FsChange;
pub use watcher::{DirectorySync, SyncState, SyncStats};
