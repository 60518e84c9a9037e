//! The association registry.

use sqlassoc_core::{AssociationDefinition, AssociationErrorKind, Error, Result};
use std::collections::BTreeMap;

/// Association definitions grouped by the relation they are declared on.
///
/// Definitions keep their registration order per source.
#[derive(Debug, Clone, Default)]
pub struct AssociationRegistry {
    by_source: BTreeMap<String, Vec<AssociationDefinition>>,
}

impl AssociationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition under its source relation.
    ///
    /// Fails with a `Duplicate` association error if the source already has
    /// an association of the same name, or `Invalid` if the definition is
    /// malformed.
    pub fn register(&mut self, definition: AssociationDefinition) -> Result<()> {
        definition.validate()?;
        let defs = self.by_source.entry(definition.source.clone()).or_default();
        if defs.iter().any(|d| d.name == definition.name) {
            return Err(Error::association(
                AssociationErrorKind::Duplicate,
                definition.source,
                definition.name,
                "association already registered",
            ));
        }
        tracing::trace!(
            source = %definition.source,
            name = %definition.name,
            kind = %definition.kind,
            "Registered association"
        );
        defs.push(definition);
        Ok(())
    }

    /// Find the association on `source` named `target_or_name`, or failing
    /// that the first one registered whose target relation has that name.
    pub fn lookup(&self, source: &str, target_or_name: &str) -> Result<&AssociationDefinition> {
        self.find(source, target_or_name).ok_or_else(|| {
            Error::association(
                AssociationErrorKind::Unknown,
                source,
                target_or_name,
                "no association with this name or target",
            )
        })
    }

    /// Like [`lookup`](Self::lookup), but only by association name.
    pub fn get(&self, source: &str, name: &str) -> Option<&AssociationDefinition> {
        self.associations_for(source).find(|d| d.name == name)
    }

    /// The first association on `source` reaching `target`.
    pub fn get_by_target(&self, source: &str, target: &str) -> Option<&AssociationDefinition> {
        self.associations_for(source).find(|d| d.target == target)
    }

    fn find(&self, source: &str, target_or_name: &str) -> Option<&AssociationDefinition> {
        self.get(source, target_or_name)
            .or_else(|| self.get_by_target(source, target_or_name))
    }

    /// All definitions declared on `source`, in registration order.
    pub fn associations_for(
        &self,
        source: &str,
    ) -> impl Iterator<Item = &AssociationDefinition> + Clone {
        self.by_source.get(source).into_iter().flatten()
    }

    /// Relations that have at least one association, in name order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.by_source.keys().map(String::as_str)
    }

    /// Total number of definitions.
    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.values().all(Vec::is_empty)
    }
}
