//! The configuration layer.
//!
//! Relations and associations are declared on a [`Configuration`], which is
//! then finalized against a schema source into a [`Container`]. Finalizing
//! tolerates relations whose tables do not exist yet: such relations are not
//! finalized, and associations that cannot resolve because a table is
//! missing are skipped. Every other failure aborts finalization.

use crate::cache::{PlanCache, PlanCacheConfig};
use crate::combine::{CombineKeys, combine_keys};
use crate::materialize::{Materializer, Relation};
use crate::registry::AssociationRegistry;
use crate::resolver::{JoinResolver, ResolvedJoinPlan};
use asupersync::{Cx, Outcome};
use sqlassoc_core::{AssociationDefinition, Connection, Error, Result, SchemaSource};
use sqlassoc_query::{Dataset, RelationProvider};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Relations and associations declared before the schema is known.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    relations: Vec<String>,
    registry: AssociationRegistry,
    cache: PlanCacheConfig,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation. Declaring it twice has no effect.
    pub fn relation(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.relations.contains(&name) {
            self.relations.push(name);
        }
        self
    }

    /// Register an association; its source relation is declared implicitly.
    pub fn register(&mut self, definition: AssociationDefinition) -> Result<&mut Self> {
        let source = definition.source.clone();
        self.registry.register(definition)?;
        self.relation(source);
        Ok(self)
    }

    /// Set plan cache options for the finalized container.
    pub fn plan_cache(&mut self, config: PlanCacheConfig) -> &mut Self {
        self.cache = config;
        self
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn registry(&self) -> &AssociationRegistry {
        &self.registry
    }

    /// Finalize every declared relation and resolve every association.
    #[tracing::instrument(level = "debug", skip_all, fields(relations = self.relations.len()))]
    pub fn finalize<S: SchemaSource>(self, schemas: S) -> Result<Container<S>> {
        let mut finalized = BTreeSet::new();
        let mut skipped_relations = Vec::new();
        for relation in &self.relations {
            match schemas.schema_for(relation) {
                Ok(_) => {
                    finalized.insert(relation.clone());
                }
                Err(e) if e.is_missing_schema() => {
                    tracing::warn!(relation = %relation, "Skipping relation without schema");
                    skipped_relations.push(relation.clone());
                }
                Err(e) => return Err(e),
            }
        }

        let resolver = JoinResolver::new(&self.registry, &schemas);
        let mut active = AssociationRegistry::new();
        let mut skipped_associations = Vec::new();
        for relation in &self.relations {
            for definition in self.registry.associations_for(relation) {
                let outcome = if finalized.contains(relation) {
                    resolver.resolve_definition(definition).map(|_| ())
                } else {
                    Err(Error::missing_schema(relation.as_str()))
                };
                match outcome {
                    Ok(()) => active.register(definition.clone())?,
                    Err(e) if e.is_missing_schema() => {
                        tracing::warn!(
                            source = %definition.source,
                            association = %definition.name,
                            error = %e,
                            "Skipping association with missing schema"
                        );
                        skipped_associations.push((definition.source.clone(), definition.name.clone()));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            relations = finalized.len(),
            associations = active.len(),
            skipped_relations = skipped_relations.len(),
            skipped_associations = skipped_associations.len(),
            "Configuration finalized"
        );

        Ok(Container {
            schemas,
            registry: active,
            relations: finalized,
            skipped_relations,
            skipped_associations,
            cache: Mutex::new(PlanCache::new(self.cache)),
        })
    }
}

/// Finalized relations and their resolvable associations.
#[derive(Debug)]
pub struct Container<S> {
    schemas: S,
    registry: AssociationRegistry,
    relations: BTreeSet<String>,
    skipped_relations: Vec<String>,
    skipped_associations: Vec<(String, String)>,
    cache: Mutex<PlanCache>,
}

impl<S: SchemaSource> Container<S> {
    pub fn schemas(&self) -> &S {
        &self.schemas
    }

    /// Mutable access to the schema source, e.g. after a migration ran.
    ///
    /// Cached plans are dropped, since sources without a real version (plain
    /// maps) cannot report the change.
    pub fn schemas_mut(&mut self) -> &mut S {
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate();
        &mut self.schemas
    }

    /// Associations that resolved during finalization.
    pub fn registry(&self) -> &AssociationRegistry {
        &self.registry
    }

    pub fn is_finalized(&self, relation: &str) -> bool {
        self.relations.contains(relation)
    }

    /// Finalized relation names, in name order.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(String::as_str)
    }

    pub fn skipped_relations(&self) -> &[String] {
        &self.skipped_relations
    }

    /// `(source, association)` pairs skipped for a missing schema.
    pub fn skipped_associations(&self) -> &[(String, String)] {
        &self.skipped_associations
    }

    fn require(&self, relation: &str) -> Result<()> {
        if self.relations.contains(relation) {
            Ok(())
        } else {
            Err(Error::missing_schema(relation))
        }
    }

    /// The base attribute list of a finalized relation.
    pub fn base_attributes(&self, relation: &str) -> Result<&[String]> {
        self.require(relation)?;
        Ok(&self.schemas.schema_for(relation)?.attributes)
    }

    /// Resolve an association, reusing the cached plan while the schema
    /// version is unchanged.
    pub fn resolve(&self, source: &str, association: &str) -> Result<Arc<ResolvedJoinPlan>> {
        self.require(source)?;
        let definition = self.registry.lookup(source, association)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get_or_resolve(self.schemas.version(), source, &definition.name, || {
            JoinResolver::new(&self.registry, &self.schemas).resolve_definition(definition)
        })
    }

    pub fn combine_keys(&self, plan: &ResolvedJoinPlan) -> Result<CombineKeys> {
        combine_keys(plan)
    }

    /// Resolve and materialize an association in one query.
    pub async fn materialize<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        source: &str,
        association: &str,
    ) -> Outcome<Relation, Error> {
        let plan = match self.resolve(source, association) {
            Ok(plan) => plan,
            Err(e) => return Outcome::Err(e),
        };
        Materializer::new(&plan).call(cx, conn, self).await
    }
}

impl<S: SchemaSource> RelationProvider for Container<S> {
    fn dataset(&self, relation: &str) -> Result<Dataset> {
        self.require(relation)?;
        self.schemas.schema_for(relation).map(Dataset::for_schema)
    }
}
