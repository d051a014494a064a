//! Domains module containing business logic organized by bounded contexts.
//!
//! - **catalog**: the live registry of resources and tools
//! - **tools**: loading and executing tool implementations
//! - **resources**: resource errors
//! - **dispatch**: serving resources and running tools per request
//! - **sync**: keeping the catalog in step with the watched directories

pub mod catalog;
pub mod dispatch;
pub mod resources;
pub mod sync;
pub mod tools;
