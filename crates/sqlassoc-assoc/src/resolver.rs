//! Join resolution: association definitions plus schema descriptors in,
//! ordered join steps and a projection out.
//!
//! Resolution is pure. It reads the registry and the schema source and
//! allocates only the plan it returns, so it is safe to run concurrently.

use crate::registry::AssociationRegistry;
use serde::{Deserialize, Serialize};
use sqlassoc_core::{
    AssociationDefinition, AssociationErrorKind, AssociationKind, Error, KeyInferenceError,
    KeyInferenceErrorKind, KeyOverride, RelationSchema, Result, SchemaError, SchemaSource,
};
use sqlassoc_query::{ColumnRef, Join};
use std::collections::HashMap;

/// One join in a resolved plan: `relation [AS alias] ON left = right`.
///
/// `left` is read from a relation already in scope, `right` from this one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinStep {
    pub relation: String,
    /// Relation name for its first occurrence in a plan, `{relation}_{n}` for
    /// the n-th
    pub alias: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl JoinStep {
    /// The INNER JOIN clause for this step, reading `relation` (the name the
    /// relation provider resolved) under the step's alias.
    pub fn join_on(&self, relation: &str) -> Join {
        Join::inner(relation, self.left.clone(), self.right.clone()).alias(self.alias.as_str())
    }
}

/// An attribute in a plan's projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectedAttribute {
    pub column: ColumnRef,
    /// Added on request rather than by resolution
    #[serde(default)]
    pub explicit: bool,
}

impl ProjectedAttribute {
    /// The attribute name this column carries in result rows.
    pub fn name(&self) -> &str {
        &self.column.attribute
    }
}

/// The resolved form of one association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedJoinPlan {
    pub source: String,
    /// Name of the resolved association
    pub association: String,
    pub kind: AssociationKind,
    pub target: String,
    /// Alias of the target relation's occurrence in `steps`
    pub target_alias: String,
    /// Join steps, in order, starting from `source`
    pub steps: Vec<JoinStep>,
    pub projection: Vec<ProjectedAttribute>,
}

impl ResolvedJoinPlan {
    /// Attribute names of the projection, in order.
    pub fn attributes(&self) -> Vec<&str> {
        self.projection.iter().map(ProjectedAttribute::name).collect()
    }

    /// The first step, joining the relation adjacent to `source`.
    ///
    /// Its predicate links parent rows to child rows.
    pub fn first_step(&self) -> Option<&JoinStep> {
        self.steps.first()
    }

    /// Aliases in scope, starting with the source relation.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.source.as_str()).chain(self.steps.iter().map(|s| s.alias.as_str()))
    }

    /// Add `alias.attribute` to the projection even if its name is already
    /// projected.
    pub fn with_attribute(
        mut self,
        alias: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Result<Self> {
        let column = ColumnRef::new(alias, attribute);
        if !self.aliases().any(|a| a == column.relation) {
            return Err(Error::association(
                AssociationErrorKind::Invalid,
                self.source.as_str(),
                self.association.as_str(),
                format!("'{}' is not a relation of this plan", column.relation),
            ));
        }
        self.projection.push(ProjectedAttribute {
            column,
            explicit: true,
        });
        Ok(self)
    }
}

/// A join between the previous relation in a path and `relation`.
#[derive(Debug, Clone)]
struct Hop {
    relation: String,
    /// Attribute on the previous relation
    left: String,
    /// Attribute on `relation`
    right: String,
}

/// Resolves association definitions against a schema source.
pub struct JoinResolver<'a, S: SchemaSource + ?Sized> {
    registry: &'a AssociationRegistry,
    schemas: &'a S,
}

impl<'a, S: SchemaSource + ?Sized> JoinResolver<'a, S> {
    pub fn new(registry: &'a AssociationRegistry, schemas: &'a S) -> Self {
        Self { registry, schemas }
    }

    /// Look up `name` on `source` and resolve it.
    pub fn resolve(&self, source: &str, name: &str) -> Result<ResolvedJoinPlan> {
        let definition = self.registry.lookup(source, name)?;
        self.resolve_definition(definition)
    }

    /// Resolve a definition, registered or not.
    #[tracing::instrument(
        level = "debug",
        skip(self, definition),
        fields(source = %definition.source, association = %definition.name)
    )]
    pub fn resolve_definition(&self, definition: &AssociationDefinition) -> Result<ResolvedJoinPlan> {
        definition.validate()?;
        let mut visiting = Vec::new();
        let hops = self.hops(definition, &mut visiting)?;
        let plan = self.build_plan(definition, &hops)?;
        tracing::debug!(
            steps = plan.steps.len(),
            attributes = ?plan.attributes(),
            "Resolved association"
        );
        Ok(plan)
    }

    fn schema(&self, relation: &str) -> Result<&RelationSchema> {
        self.schemas.schema_for(relation)
    }

    /// Compute the path of a definition, recursing through chains.
    ///
    /// `visiting` holds the (source, name) pairs on the current recursion
    /// path.
    fn hops(
        &self,
        definition: &AssociationDefinition,
        visiting: &mut Vec<(String, String)>,
    ) -> Result<Vec<Hop>> {
        let key = (definition.source.clone(), definition.name.clone());
        if visiting.contains(&key) {
            let path: Vec<String> = visiting
                .iter()
                .chain(std::iter::once(&key))
                .map(|(s, n)| format!("{}.{}", s, n))
                .collect();
            return Err(Error::association(
                AssociationErrorKind::Cyclic,
                definition.source.as_str(),
                definition.name.as_str(),
                format!("cyclic through-chain: {}", path.join(" -> ")),
            ));
        }
        visiting.push(key);

        let hops = match (definition.kind, definition.through.as_deref()) {
            (AssociationKind::OneToMany | AssociationKind::ManyToOne, _) => {
                self.direct_hop(definition).map(|hop| vec![hop])
            }
            (AssociationKind::ManyToMany, Some(through)) => {
                self.through_hops(definition, through, visiting)
            }
            (AssociationKind::ManyToMany, None) => Err(Error::association(
                AssociationErrorKind::Invalid,
                definition.source.as_str(),
                definition.name.as_str(),
                "many_to_many requires a `through` relation",
            )),
        };

        visiting.pop();
        hops
    }

    fn direct_hop(&self, definition: &AssociationDefinition) -> Result<Hop> {
        let source = self.schema(&definition.source)?;
        let target = self.schema(&definition.target)?;
        let keys = &definition.keys;

        let (left, right) = match definition.kind {
            AssociationKind::ManyToOne => (
                override_or(keys.source_key.as_deref(), source, || {
                    single_foreign_key(source, &target.name)
                })?,
                override_or(keys.target_key.as_deref(), target, || primary_key(target))?,
            ),
            _ => (
                override_or(keys.source_key.as_deref(), source, || primary_key(source))?,
                override_or(keys.target_key.as_deref(), target, || {
                    single_foreign_key(target, &source.name)
                })?,
            ),
        };

        Ok(Hop {
            relation: target.name.clone(),
            left,
            right,
        })
    }

    fn through_hops(
        &self,
        definition: &AssociationDefinition,
        through: &str,
        visiting: &mut Vec<(String, String)>,
    ) -> Result<Vec<Hop>> {
        let join_relation = self.schemas.schema_for(through);

        // A relation with a foreign key to the target is a bare join table
        if let Ok(join_schema) = &join_relation {
            let keys = &definition.keys;
            if keys.target_key.is_some() || !join_schema.foreign_keys_to(&definition.target).is_empty()
            {
                return self.join_table_hops(definition, join_schema);
            }
        }

        // Otherwise `through` names the association leaving the source
        let declared = self
            .registry
            .get(&definition.source, through)
            .or_else(|| self.registry.get_by_target(&definition.source, through));
        let (mut hops, intermediate) = if let Some(leg) = declared {
            let leg = with_keys(leg, &definition.keys);
            (self.hops(&leg, visiting)?, leg.target.clone())
        } else {
            let intermediate = join_relation?;
            let leg = self.inferred_leg(definition, intermediate)?;
            (self.hops(&leg, visiting)?, intermediate.name.clone())
        };

        let onward = self
            .registry
            .get(&intermediate, &definition.name)
            .filter(|d| d.target == definition.target)
            .or_else(|| self.registry.get_by_target(&intermediate, &definition.target))
            .ok_or_else(|| {
                Error::KeyInference(KeyInferenceError {
                    kind: KeyInferenceErrorKind::NoCandidate,
                    relation: intermediate.clone(),
                    target: definition.target.clone(),
                    candidates: Vec::new(),
                })
            })?;

        tracing::trace!(
            through = %intermediate,
            onward = %onward.name,
            "Following through-chain"
        );
        hops.extend(self.hops(onward, visiting)?);
        Ok(hops)
    }

    fn join_table_hops(
        &self,
        definition: &AssociationDefinition,
        join_schema: &RelationSchema,
    ) -> Result<Vec<Hop>> {
        let source = self.schema(&definition.source)?;
        let target = self.schema(&definition.target)?;
        let keys = &definition.keys;

        let to_source = override_or(keys.source_key.as_deref(), join_schema, || {
            single_foreign_key(join_schema, &source.name)
        })?;
        let to_target = override_or(keys.target_key.as_deref(), join_schema, || {
            single_foreign_key(join_schema, &target.name)
        })?;

        Ok(vec![
            Hop {
                relation: join_schema.name.clone(),
                left: primary_key(source)?,
                right: to_source,
            },
            Hop {
                relation: target.name.clone(),
                left: to_target,
                right: primary_key(target)?,
            },
        ])
    }

    /// The source-to-intermediate leg when no association declares it:
    /// one_to_many if the intermediate references the source, otherwise
    /// many_to_one.
    fn inferred_leg(
        &self,
        definition: &AssociationDefinition,
        intermediate: &RelationSchema,
    ) -> Result<AssociationDefinition> {
        let kind = if intermediate.foreign_keys_to(&definition.source).is_empty() {
            AssociationKind::ManyToOne
        } else {
            AssociationKind::OneToMany
        };
        Ok(AssociationDefinition {
            name: intermediate.name.clone(),
            source: definition.source.clone(),
            target: intermediate.name.clone(),
            kind,
            through: None,
            keys: definition.keys.clone(),
        })
    }

    fn build_plan(
        &self,
        definition: &AssociationDefinition,
        hops: &[Hop],
    ) -> Result<ResolvedJoinPlan> {
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        let mut alias_for = |relation: &str| -> String {
            let n = occurrences.entry(relation.to_string()).or_insert(0);
            *n += 1;
            if *n == 1 {
                relation.to_string()
            } else {
                format!("{}_{}", relation, n)
            }
        };

        let mut previous = alias_for(&definition.source);
        let mut steps = Vec::with_capacity(hops.len());
        for hop in hops {
            let alias = alias_for(&hop.relation);
            steps.push(JoinStep {
                relation: hop.relation.clone(),
                alias: alias.clone(),
                left: ColumnRef::new(previous.as_str(), hop.left.as_str()),
                right: ColumnRef::new(alias.as_str(), hop.right.as_str()),
            });
            previous = alias;
        }

        let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
            return Err(Error::association(
                AssociationErrorKind::Invalid,
                definition.source.as_str(),
                definition.name.as_str(),
                "association resolved to no join steps",
            ));
        };
        let target_alias = last.alias.clone();

        // Every relation on the path must still have a descriptor
        for step in &steps {
            self.schema(&step.relation)?;
        }

        let target = self.schema(&definition.target)?;
        let mut projection: Vec<ProjectedAttribute> = target
            .attributes
            .iter()
            .map(|attr| ProjectedAttribute {
                column: ColumnRef::new(target_alias.as_str(), attr.as_str()),
                explicit: false,
            })
            .collect();

        // The key joined directly to the source travels with the rows so
        // parents can be matched later; a name clash keeps the target's own.
        let carried = first.right.clone();
        if !projection.iter().any(|p| p.name() == carried.attribute) {
            projection.push(ProjectedAttribute {
                column: carried,
                explicit: false,
            });
        }

        Ok(ResolvedJoinPlan {
            source: definition.source.clone(),
            association: definition.name.clone(),
            kind: definition.kind,
            target: definition.target.clone(),
            target_alias,
            steps,
            projection,
        })
    }
}

/// Copy of `definition` with `keys` applied, if any are given.
fn with_keys(definition: &AssociationDefinition, keys: &KeyOverride) -> AssociationDefinition {
    let mut leg = definition.clone();
    if !keys.is_empty() {
        leg.keys = keys.clone();
    }
    leg
}

/// Use the override if present (checking that `relation` has it), else infer.
fn override_or(
    key: Option<&str>,
    relation: &RelationSchema,
    infer: impl FnOnce() -> Result<String>,
) -> Result<String> {
    match key {
        Some(key) if relation.has_attribute(key) => Ok(key.to_string()),
        Some(key) => Err(Error::Schema(SchemaError {
            relation: relation.name.clone(),
            message: format!("override key '{}' is not an attribute", key),
        })),
        None => infer(),
    }
}

fn primary_key(relation: &RelationSchema) -> Result<String> {
    relation.single_primary_key().map(str::to_string).ok_or_else(|| {
        Error::KeyInference(KeyInferenceError {
            kind: KeyInferenceErrorKind::CompositePrimaryKey,
            relation: relation.name.clone(),
            target: relation.name.clone(),
            candidates: relation.primary_key.clone(),
        })
    })
}

fn single_foreign_key(relation: &RelationSchema, target: &str) -> Result<String> {
    match relation.foreign_keys_to(target).as_slice() {
        [fk] => Ok((*fk).to_string()),
        candidates => Err(Error::KeyInference(KeyInferenceError {
            kind: if candidates.is_empty() {
                KeyInferenceErrorKind::NoCandidate
            } else {
                KeyInferenceErrorKind::Ambiguous
            },
            relation: relation.name.clone(),
            target: target.to_string(),
            candidates: candidates.iter().map(|c| (*c).to_string()).collect(),
        })),
    }
}
