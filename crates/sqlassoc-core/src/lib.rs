//! Core types for sqlassoc.
//!
//! This crate provides the vocabulary shared by the association engine and
//! its collaborators:
//!
//! - `Value` and `Row` for fetched data
//! - `Error` with the association error taxonomy
//! - `Connection` trait for the SQL execution collaborator
//! - `RelationSchema` and `SchemaSource` for the schema collaborator
//! - `AssociationDefinition` and its builder
//! - `Outcome` re-export from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod identifiers;
pub mod relationship;
pub mod row;
pub mod schema;
pub mod value;

pub use connection::{Connection, Dialect};
pub use error::{
    AssociationError, AssociationErrorKind, CombineKeyError, ConnectionError,
    ConnectionErrorKind, Error, KeyInferenceError, KeyInferenceErrorKind, MaterializationError,
    MissingSchemaError, QueryError, QueryErrorKind, Result, SchemaError, TypeError,
};
pub use identifiers::{is_valid_identifier, quote_ident, quote_ident_mysql, sanitize_identifier};
pub use relationship::{
    AssociationBuilder, AssociationDefinition, AssociationKind, Cardinality, KeyOverride,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use schema::{RelationSchema, SchemaSource};
pub use value::{KeyValue, Value};
