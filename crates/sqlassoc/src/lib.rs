//! sqlassoc - association resolution for SQL relations.
//!
//! Given relation schemas and declared associations (one-to-many,
//! many-to-one, many-to-many through a join relation, and chains through
//! other associations), sqlassoc:
//!
//! - derives the join query producing the associated rows,
//! - computes an unambiguous projection for it,
//! - computes the key pair that stitches parent rows to child rows in
//!   memory, so children of many parents load in one query.
//!
//! # Quick Start
//!
//! ```
//! use sqlassoc::prelude::*;
//!
//! let catalog = SchemaCatalog::from_json(
//!     r#"[
//!         {"name": "tasks", "attributes": ["id", "user_id", "title"], "primary_key": ["id"]},
//!         {"name": "tags", "attributes": ["id", "name"], "primary_key": ["id"]},
//!         {"name": "task_tags", "attributes": ["tag_id", "task_id"],
//!          "primary_key": ["tag_id", "task_id"],
//!          "foreign_keys": {"tag_id": "tags", "task_id": "tasks"}}
//!     ]"#,
//! )?;
//!
//! let mut config = Configuration::new();
//! config.register(
//!     AssociationDefinition::many_to_many("tasks", "tags")
//!         .through("task_tags")
//!         .build()?,
//! )?;
//! let container = config.finalize(catalog)?;
//!
//! let plan = container.resolve("tasks", "tags")?;
//! assert_eq!(plan.attributes(), ["id", "name", "task_id"]);
//! assert_eq!(container.combine_keys(&plan)?.to_map()["id"], "task_id");
//! # Ok::<(), sqlassoc::Error>(())
//! ```
//!
//! Executing a plan takes a [`Connection`]: [`Materializer::call`] loads the
//! joined rows in one query, and [`Materializer::for_combine`] plus
//! [`combine`] batch-load children for parents already in hand.
//!
//! # Crates
//!
//! - `sqlassoc-core`: values, rows, errors, schema descriptors, definitions
//! - `sqlassoc-query`: datasets and SQL rendering
//! - `sqlassoc-schema`: schema catalogs and introspection
//! - `sqlassoc-assoc`: registry, resolver, combine keys, materializer,
//!   configuration layer

pub use sqlassoc_core::{
    AssociationBuilder, AssociationDefinition, AssociationError, AssociationErrorKind,
    AssociationKind, Cardinality, ColumnInfo, CombineKeyError, Connection, ConnectionError,
    ConnectionErrorKind, Cx, Dialect, Error, FromValue, KeyInferenceError, KeyInferenceErrorKind,
    KeyOverride, KeyValue, MaterializationError, MissingSchemaError, Outcome, QueryError,
    QueryErrorKind, RelationSchema, Result, Row, SchemaError, SchemaSource, TypeError, Value,
};
pub use sqlassoc_core::{is_valid_identifier, quote_ident, quote_ident_mysql, sanitize_identifier};

pub use sqlassoc_query::{ColumnRef, Dataset, Join, JoinType, RelationProvider, SelectColumn};

pub use sqlassoc_schema::{ForeignKeyInfo, Introspector, SchemaCatalog};

pub use sqlassoc_assoc::{
    AssociationRegistry, CombineKeys, Combined, Configuration, Container, JoinResolver, JoinStep,
    Materializer, PlanCache, PlanCacheConfig, ProjectedAttribute, Relation, ResolvedJoinPlan,
    combine, combine_keys,
};

/// The commonly used types in one import.
pub mod prelude {
    pub use crate::{
        AssociationDefinition,
        AssociationKind,
        AssociationRegistry,
        CombineKeys,
        Combined,
        Configuration,
        Connection,
        Container,
        Cx,
        Dataset,
        Dialect,
        Error,
        Introspector,
        JoinResolver,
        Materializer,
        Outcome,
        RelationProvider,
        RelationSchema,
        ResolvedJoinPlan,
        Result,
        Row,
        SchemaCatalog,
        SchemaSource,
        Value,
        combine,
        combine_keys,
    };
}
