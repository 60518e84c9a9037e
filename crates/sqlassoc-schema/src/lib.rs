//! The schema collaborator for sqlassoc.
//!
//! - [`SchemaCatalog`] holds relation descriptors in memory, loads them from
//!   JSON and tracks a version for cache invalidation.
//! - [`Introspector`] reads descriptors from a live SQLite, PostgreSQL or
//!   MySQL database through the `Connection` trait.

pub mod catalog;
pub mod introspect;

pub use catalog::SchemaCatalog;
pub use introspect::{ForeignKeyInfo, Introspector};
