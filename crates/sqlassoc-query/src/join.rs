//! JOIN clause types.

use serde::{Deserialize, Serialize};
use sqlassoc_core::Dialect;
use std::fmt;

/// A column qualified by the relation (or alias) it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Relation name or alias in scope of the query
    pub relation: String,
    pub attribute: String,
}

impl ColumnRef {
    pub fn new(relation: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            attribute: attribute.into(),
        }
    }

    /// Render as `"relation"."attribute"` for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        format!(
            "{}.{}",
            dialect.quote_identifier(&self.relation),
            dialect.quote_identifier(&self.attribute)
        )
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.attribute)
    }
}

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// A JOIN clause with a single equality predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub join_type: JoinType,
    /// Relation to join
    pub relation: String,
    /// Optional alias, required when the relation already occurs in the query
    pub alias: Option<String>,
    /// Column of a relation already in scope
    pub left: ColumnRef,
    /// Column of the joined relation
    pub right: ColumnRef,
}

impl Join {
    /// Create an INNER JOIN on `left = right`.
    pub fn inner(relation: impl Into<String>, left: ColumnRef, right: ColumnRef) -> Self {
        Self {
            join_type: JoinType::Inner,
            relation: relation.into(),
            alias: None,
            left,
            right,
        }
    }

    /// Create a LEFT JOIN on `left = right`.
    pub fn left(relation: impl Into<String>, left: ColumnRef, right: ColumnRef) -> Self {
        Self {
            join_type: JoinType::Left,
            ..Self::inner(relation, left, right)
        }
    }

    /// Set an alias for the joined relation.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name columns of this join are qualified with.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation)
    }

    /// Generate SQL for this JOIN clause with a specific dialect.
    pub fn build_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!(
            " {} {}",
            self.join_type.as_str(),
            dialect.quote_identifier(&self.relation)
        );
        if let Some(alias) = self.alias.as_deref().filter(|a| *a != self.relation) {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&self.left.to_sql(dialect));
        sql.push_str(" = ");
        sql.push_str(&self.right.to_sql(dialect));
        sql
    }
}
