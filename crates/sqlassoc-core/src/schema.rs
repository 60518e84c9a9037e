//! Relation schema descriptors.
//!
//! A [`RelationSchema`] is the read-only view of one table that the
//! association engine needs: its ordered attributes, primary key, and the
//! foreign keys it declares. Descriptors are produced by a schema collaborator
//! (a static catalog, or introspection of a live database) and reached through
//! [`SchemaSource`].

use crate::error::{Error, Result, SchemaError};
use crate::identifiers::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Metadata for a single relation (table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSchema {
    /// Relation name
    pub name: String,
    /// Attribute names in declaration order
    pub attributes: Vec<String>,
    /// Primary key attribute names (one or more)
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Foreign keys: attribute name -> referenced relation name
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, String>,
}

impl RelationSchema {
    /// Create an empty descriptor for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: BTreeMap::new(),
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    /// Append several attributes in order.
    #[must_use]
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the primary key attributes.
    #[must_use]
    pub fn primary_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declare `attribute` as a foreign key referencing `target`.
    #[must_use]
    pub fn foreign_key(mut self, attribute: impl Into<String>, target: impl Into<String>) -> Self {
        self.foreign_keys.insert(attribute.into(), target.into());
        self
    }

    /// Check if the relation has an attribute with this name.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    /// The single primary key attribute, if the key is not composite.
    pub fn single_primary_key(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [pk] => Some(pk.as_str()),
            _ => None,
        }
    }

    /// Foreign key attributes that reference `target`, in attribute order.
    ///
    /// Foreign keys on attributes that are not declared attributes are
    /// listed last, in name order.
    pub fn foreign_keys_to(&self, target: &str) -> Vec<&str> {
        let mut found: Vec<&str> = self
            .attributes
            .iter()
            .filter(|a| self.foreign_keys.get(a.as_str()).is_some_and(|t| t == target))
            .map(String::as_str)
            .collect();
        for (attr, t) in &self.foreign_keys {
            if t == target && !found.contains(&attr.as_str()) {
                found.push(attr.as_str());
            }
        }
        found
    }

    /// Check the descriptor for malformed names and dangling key references.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> Result<()> {
            Err(Error::Schema(SchemaError {
                relation: self.name.clone(),
                message,
            }))
        };

        if !is_valid_identifier(&self.name) {
            return invalid(format!("'{}' is not a valid relation name", self.name));
        }
        if let Some(bad) = self.attributes.iter().find(|a| !is_valid_identifier(a)) {
            return invalid(format!("'{}' is not a valid attribute name", bad));
        }
        if let Some(missing) = self.primary_key.iter().find(|pk| !self.has_attribute(pk)) {
            return invalid(format!(
                "primary key attribute '{}' is not declared",
                missing
            ));
        }
        if let Some((attr, _)) = self
            .foreign_keys
            .iter()
            .find(|(attr, _)| !self.has_attribute(attr))
        {
            return invalid(format!("foreign key attribute '{}' is not declared", attr));
        }
        Ok(())
    }
}

/// Read access to schema descriptors, keyed by relation name.
///
/// Implementations are shared read-only between concurrent resolutions.
pub trait SchemaSource: Send + Sync {
    /// Look up the descriptor for `relation`.
    ///
    /// Fails with [`Error::MissingSchema`] when the relation does not exist
    /// (e.g. its table has not been migrated yet).
    fn schema_for(&self, relation: &str) -> Result<&RelationSchema>;

    /// A counter that changes whenever any descriptor changes.
    ///
    /// Caches of derived plans compare versions to detect staleness. The
    /// default is constant, so a source keeping it must not change behind a
    /// cache's back.
    fn version(&self) -> u64 {
        0
    }
}

impl SchemaSource for HashMap<String, RelationSchema> {
    fn schema_for(&self, relation: &str) -> Result<&RelationSchema> {
        self.get(relation)
            .ok_or_else(|| Error::missing_schema(relation))
    }
}

impl SchemaSource for BTreeMap<String, RelationSchema> {
    fn schema_for(&self, relation: &str) -> Result<&RelationSchema> {
        self.get(relation)
            .ok_or_else(|| Error::missing_schema(relation))
    }
}
