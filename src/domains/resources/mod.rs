//! Resources domain module.
//!
//! Resources are read-only files discovered in the resources directory.
//! Their descriptors live in the catalog and their content is served by the
//! dispatcher; this module holds the errors shared by both.

mod error;

pub use error::ResourceError;
