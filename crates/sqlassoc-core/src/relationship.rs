//! Association definitions.
//!
//! Associations are declared once while relations are configured and never
//! mutated afterwards. Each [`AssociationDefinition`] is a plain value: the
//! resolver turns it (plus schema descriptors) into a join plan, so no
//! per-kind dispatch lives here beyond the [`AssociationKind`] variant.

use crate::error::{AssociationErrorKind, Error, Result};
use crate::identifiers::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of association between two relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// One-to-many: one `users` row has many `tasks` rows.
    OneToMany,
    /// Many-to-one: many `tasks` rows belong to one `users` row.
    ManyToOne,
    /// Many-to-many: `tasks` have many `tags` via an intermediate relation.
    ManyToMany,
}

/// How many target rows one source row yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

impl AssociationKind {
    /// The result cardinality of this kind.
    pub const fn result(self) -> Cardinality {
        match self {
            AssociationKind::ManyToOne => Cardinality::One,
            AssociationKind::OneToMany | AssociationKind::ManyToMany => Cardinality::Many,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AssociationKind::OneToMany => "one_to_many",
            AssociationKind::ManyToOne => "many_to_one",
            AssociationKind::ManyToMany => "many_to_many",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit join keys overriding schema inference.
///
/// Either side may be given alone; the other is inferred. Meaning per kind:
///
/// | kind           | `source_key`                   | `target_key`                   |
/// |----------------|--------------------------------|--------------------------------|
/// | `many_to_one`  | foreign key on source          | primary key of target          |
/// | `one_to_many`  | primary key of source          | foreign key on target          |
/// | `many_to_many` | through-relation key -> source | through-relation key -> target |
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyOverride {
    #[serde(default)]
    pub source_key: Option<String>,
    #[serde(default)]
    pub target_key: Option<String>,
}

impl KeyOverride {
    /// Check if neither side is overridden.
    pub fn is_empty(&self) -> bool {
        self.source_key.is_none() && self.target_key.is_none()
    }
}

/// A declared association between a source and a target relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationDefinition {
    /// Association name, unique per source (defaults to the target name).
    pub name: String,
    /// Relation the association is declared on.
    pub source: String,
    /// Relation the association reaches.
    pub target: String,
    pub kind: AssociationKind,
    /// Intermediate relation (join table) or the relation whose own
    /// association to `target` is followed (a through-chain).
    #[serde(default)]
    pub through: Option<String>,
    #[serde(default)]
    pub keys: KeyOverride,
}

impl AssociationDefinition {
    /// Start a one-to-many definition.
    pub fn one_to_many(source: impl Into<String>, target: impl Into<String>) -> AssociationBuilder {
        AssociationBuilder::new(AssociationKind::OneToMany, source.into(), target.into())
    }

    /// Start a many-to-one definition.
    pub fn many_to_one(source: impl Into<String>, target: impl Into<String>) -> AssociationBuilder {
        AssociationBuilder::new(AssociationKind::ManyToOne, source.into(), target.into())
    }

    /// Start a many-to-many definition; `through` is required before `build`.
    pub fn many_to_many(
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> AssociationBuilder {
        AssociationBuilder::new(AssociationKind::ManyToMany, source.into(), target.into())
    }

    /// Check the definition's structural invariants.
    ///
    /// Many-to-many requires `through`; the other kinds must not carry one.
    /// All names must be plain identifiers.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> Result<()> {
            Err(Error::association(
                AssociationErrorKind::Invalid,
                self.source.clone(),
                self.name.clone(),
                message,
            ))
        };

        let names = [
            Some(self.name.as_str()),
            Some(self.source.as_str()),
            Some(self.target.as_str()),
            self.through.as_deref(),
            self.keys.source_key.as_deref(),
            self.keys.target_key.as_deref(),
        ];
        if let Some(bad) = names.into_iter().flatten().find(|n| !is_valid_identifier(n)) {
            return invalid(format!("'{}' is not a valid identifier", bad));
        }

        match (self.kind, &self.through) {
            (AssociationKind::ManyToMany, None) => {
                invalid("many_to_many requires a `through` relation".to_string())
            }
            (AssociationKind::OneToMany | AssociationKind::ManyToOne, Some(through)) => invalid(
                format!("{} cannot go through '{}'", self.kind, through),
            ),
            _ => Ok(()),
        }
    }
}

/// Builder for [`AssociationDefinition`].
///
/// # Example
///
/// ```
/// use sqlassoc_core::AssociationDefinition;
///
/// let tags = AssociationDefinition::many_to_many("tasks", "tags")
///     .through("task_tags")
///     .build()
///     .unwrap();
/// assert_eq!(tags.name, "tags");
/// ```
#[derive(Debug, Clone)]
pub struct AssociationBuilder {
    def: AssociationDefinition,
}

impl AssociationBuilder {
    fn new(kind: AssociationKind, source: String, target: String) -> Self {
        Self {
            def: AssociationDefinition {
                name: target.clone(),
                source,
                target,
                kind,
                through: None,
                keys: KeyOverride::default(),
            },
        }
    }

    /// Name the association (defaults to the target relation name).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.def.name = name.into();
        self
    }

    /// Set the intermediate relation or through-chain reference.
    #[must_use]
    pub fn through(mut self, through: impl Into<String>) -> Self {
        self.def.through = Some(through.into());
        self
    }

    /// Override the source-side key.
    #[must_use]
    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.def.keys.source_key = Some(key.into());
        self
    }

    /// Override the target-side key.
    #[must_use]
    pub fn target_key(mut self, key: impl Into<String>) -> Self {
        self.def.keys.target_key = Some(key.into());
        self
    }

    /// Override both keys.
    #[must_use]
    pub fn keys(self, source_key: impl Into<String>, target_key: impl Into<String>) -> Self {
        self.source_key(source_key).target_key(target_key)
    }

    /// Override the foreign key attribute, whichever side carries it.
    ///
    /// For `many_to_one` this is the source key, for `one_to_many` the target
    /// key, and for `many_to_many` the through-relation key referencing the
    /// source.
    #[must_use]
    pub fn foreign_key(self, key: impl Into<String>) -> Self {
        match self.def.kind {
            AssociationKind::ManyToOne | AssociationKind::ManyToMany => self.source_key(key),
            AssociationKind::OneToMany => self.target_key(key),
        }
    }

    /// Validate and produce the definition.
    pub fn build(self) -> Result<AssociationDefinition> {
        self.def.validate()?;
        Ok(self.def)
    }
}
