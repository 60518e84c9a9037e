//! In-memory schema catalog.

use serde::{Deserialize, Serialize};
use sqlassoc_core::{Error, RelationSchema, Result, SchemaSource};
use sqlassoc_query::{Dataset, RelationProvider};
use std::collections::BTreeMap;

/// A versioned set of relation descriptors.
///
/// Every successful mutation bumps [`SchemaSource::version`], so plan caches
/// keyed against the catalog notice schema changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    relations: BTreeMap<String, RelationSchema>,
    #[serde(skip)]
    version: u64,
}

impl SchemaCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from descriptors, validating each.
    pub fn from_schemas<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = RelationSchema>,
    {
        let mut catalog = Self::new();
        for schema in schemas {
            catalog.insert(schema)?;
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON array of relation descriptors.
    ///
    /// ```
    /// use sqlassoc_core::SchemaSource;
    /// use sqlassoc_schema::SchemaCatalog;
    ///
    /// let catalog = SchemaCatalog::from_json(
    ///     r#"[{"name": "users", "attributes": ["id", "name"], "primary_key": ["id"]}]"#,
    /// )
    /// .unwrap();
    /// assert_eq!(catalog.schema_for("users").unwrap().attributes, ["id", "name"]);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let schemas: Vec<RelationSchema> = serde_json::from_str(json)
            .map_err(|e| Error::Custom(format!("invalid schema catalog JSON: {}", e)))?;
        Self::from_schemas(schemas)
    }

    /// Serialize the catalog as a JSON array of descriptors.
    pub fn to_json(&self) -> Result<String> {
        let schemas: Vec<&RelationSchema> = self.relations.values().collect();
        serde_json::to_string_pretty(&schemas)
            .map_err(|e| Error::Custom(format!("failed to serialize schema catalog: {}", e)))
    }

    /// Add or replace a descriptor.
    pub fn insert(&mut self, schema: RelationSchema) -> Result<()> {
        schema.validate()?;
        tracing::trace!(relation = %schema.name, "Catalog insert");
        self.relations.insert(schema.name.clone(), schema);
        self.version += 1;
        Ok(())
    }

    /// Remove a descriptor, e.g. after its table was dropped.
    pub fn remove(&mut self, relation: &str) -> Option<RelationSchema> {
        let removed = self.relations.remove(relation);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    pub fn get(&self, relation: &str) -> Option<&RelationSchema> {
        self.relations.get(relation)
    }

    pub fn contains(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Relation names in sorted order.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl SchemaSource for SchemaCatalog {
    fn schema_for(&self, relation: &str) -> Result<&RelationSchema> {
        self.relations
            .get(relation)
            .ok_or_else(|| Error::missing_schema(relation))
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl RelationProvider for SchemaCatalog {
    fn dataset(&self, relation: &str) -> Result<Dataset> {
        self.schema_for(relation).map(Dataset::for_schema)
    }
}
