//! Lookup of executable datasets by relation name.

use crate::dataset::Dataset;
use sqlassoc_core::{RelationSchema, Result, SchemaSource};
use std::collections::{BTreeMap, HashMap};

/// Produces the base dataset for a relation.
///
/// The base dataset projects the relation's own attributes. A relation that
/// is not available (its schema is missing, or it was skipped during
/// configuration) fails with [`sqlassoc_core::Error::MissingSchema`].
///
/// When a plan is materialized, the source's dataset is the starting point
/// and keeps its joins and filters. Each joined relation contributes its
/// relation name and filters. The plan's projection always replaces the
/// provider's.
pub trait RelationProvider {
    fn dataset(&self, relation: &str) -> Result<Dataset>;
}

impl RelationProvider for HashMap<String, RelationSchema> {
    fn dataset(&self, relation: &str) -> Result<Dataset> {
        self.schema_for(relation).map(Dataset::for_schema)
    }
}

impl RelationProvider for BTreeMap<String, RelationSchema> {
    fn dataset(&self, relation: &str) -> Result<Dataset> {
        self.schema_for(relation).map(Dataset::for_schema)
    }
}
