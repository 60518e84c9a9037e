//! Dataset construction for sqlassoc.
//!
//! `sqlassoc-query` is the SQL execution adapter used by the association
//! engine. A [`Dataset`] starts from one base relation, applies equality
//! joins in order, projects a column list, optionally restricts a key column
//! to a batch of values, and renders all of it as one statement for a
//! [`Dialect`](sqlassoc_core::Dialect). Execution goes through the
//! `Connection` trait from `sqlassoc-core`.

pub mod dataset;
pub mod join;
pub mod provider;

pub use dataset::{Dataset, SelectColumn};
pub use join::{ColumnRef, Join, JoinType};
pub use provider::RelationProvider;
