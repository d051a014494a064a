//! Catalog domain module.
//!
//! The catalog is the single source of truth for what the server currently
//! exposes. It is built once, shared as `Arc<Catalog>`, and kept in sync with
//! the watched directories by the `sync` domain.
//!
//! ## Architecture
//!
//! - `registry.rs` - The concurrency-safe `Catalog`
//! - `descriptor.rs` - Resource and tool descriptors
//! - `classify.rs` - Extension-based type and MIME classification

pub mod classify;
mod descriptor;
mod registry;

pub use descriptor::{ResourceDescriptor, ResourceType, ToolDescriptor, ToolType, input_schema};
pub use registry::{Catalog, CatalogCounts, CatalogExport};
