//! Datasets: a base relation plus joins, a projection and key filters,
//! rendered to a single SELECT statement.

use crate::join::{ColumnRef, Join};
use asupersync::{Cx, Outcome};
use sqlassoc_core::{Connection, Dialect, Error, RelationSchema, Row, Value};

/// A projected column and the name it is exposed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    pub column: ColumnRef,
    /// Output name; defaults to the attribute name
    pub output: Option<String>,
}

impl SelectColumn {
    pub fn new(column: ColumnRef) -> Self {
        Self {
            column,
            output: None,
        }
    }

    /// The name this column carries in fetched rows.
    pub fn output_name(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.column.attribute)
    }

    fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = self.column.to_sql(dialect);
        if let Some(output) = self.output.as_deref().filter(|o| *o != self.column.attribute) {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(output));
        }
        sql
    }
}

impl From<ColumnRef> for SelectColumn {
    fn from(column: ColumnRef) -> Self {
        Self::new(column)
    }
}

#[derive(Debug, Clone)]
struct InFilter {
    column: ColumnRef,
    values: Vec<Value>,
}

/// An executable query over one base relation.
///
/// # Example
///
/// ```
/// use sqlassoc_core::Dialect;
/// use sqlassoc_query::{ColumnRef, Dataset, Join};
///
/// let (sql, params) = Dataset::new("tasks")
///     .join(Join::inner(
///         "task_tags",
///         ColumnRef::new("tasks", "id"),
///         ColumnRef::new("task_tags", "task_id"),
///     ))
///     .select(vec![ColumnRef::new("task_tags", "tag_id")])
///     .to_sql(Dialect::Sqlite);
/// assert_eq!(
///     sql,
///     "SELECT \"task_tags\".\"tag_id\" FROM \"tasks\" \
///      INNER JOIN \"task_tags\" ON \"tasks\".\"id\" = \"task_tags\".\"task_id\""
/// );
/// assert!(params.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Dataset {
    relation: String,
    alias: Option<String>,
    joins: Vec<Join>,
    columns: Vec<SelectColumn>,
    filters: Vec<InFilter>,
}

impl Dataset {
    /// Start a dataset over `relation` with no projection (`SELECT *`).
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            alias: None,
            joins: Vec::new(),
            columns: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Start a dataset over a schema's relation projecting all its attributes.
    pub fn for_schema(schema: &RelationSchema) -> Self {
        let columns = schema
            .attributes
            .iter()
            .map(|a| ColumnRef::new(schema.name.as_str(), a.as_str()))
            .collect();
        Self::new(schema.name.as_str()).select(columns)
    }

    /// Alias the base relation.
    ///
    /// Projection columns and filters qualified with the current reference
    /// name follow the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let current = self.reference_name().to_string();
        let columns = self
            .columns
            .iter_mut()
            .map(|c| &mut c.column)
            .chain(self.filters.iter_mut().map(|f| &mut f.column));
        for column in columns {
            if column.relation == current {
                column.relation.clone_from(&alias);
            }
        }
        self.alias = Some(alias);
        self
    }

    /// Add a join.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add an INNER JOIN of `relation` on `left = right`.
    #[must_use]
    pub fn inner_join(
        self,
        relation: impl Into<String>,
        alias: Option<String>,
        left: ColumnRef,
        right: ColumnRef,
    ) -> Self {
        let mut join = Join::inner(relation, left, right);
        join.alias = alias;
        self.join(join)
    }

    /// Replace the projection.
    #[must_use]
    pub fn select<C: Into<SelectColumn>>(mut self, columns: Vec<C>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict rows to those whose `column` is one of `values`.
    ///
    /// Filters accumulate and are ANDed. An empty value list matches no rows.
    #[must_use]
    pub fn filter_in(mut self, column: ColumnRef, values: Vec<Value>) -> Self {
        self.filters.push(InFilter { column, values });
        self
    }

    /// The base relation name.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// The name columns of the base relation are qualified with.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation)
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn columns(&self) -> &[SelectColumn] {
        &self.columns
    }

    /// `IN` filters as `(column, values)`, in the order they were added.
    pub fn filters(&self) -> impl Iterator<Item = (&ColumnRef, &[Value])> {
        self.filters.iter().map(|f| (&f.column, f.values.as_slice()))
    }

    /// Output names of the projection, in order.
    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.output_name().to_string())
            .collect()
    }

    /// Build the SQL statement and parameters for `dialect`.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<String> = self.columns.iter().map(|c| c.to_sql(dialect)).collect();
            sql.push_str(&cols.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(&self.relation));
        if let Some(alias) = self.alias.as_deref().filter(|a| *a != self.relation) {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }

        for join in &self.joins {
            sql.push_str(&join.build_sql(dialect));
        }

        let mut predicates = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            if filter.values.is_empty() {
                predicates.push("1 = 0".to_string());
                continue;
            }
            let placeholders: Vec<String> = (1..=filter.values.len())
                .map(|i| dialect.placeholder(params.len() + i))
                .collect();
            predicates.push(format!(
                "{} IN ({})",
                filter.column.to_sql(dialect),
                placeholders.join(", ")
            ));
            params.extend(filter.values.iter().cloned());
        }
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        tracing::trace!(sql = %sql, params = params.len(), "Built dataset SQL");
        (sql, params)
    }

    /// Execute the dataset as exactly one query and return all rows.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(relation = %self.relation))]
    pub async fn all<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Vec<Row>, Error> {
        let (sql, params) = self.to_sql(conn.dialect());
        tracing::debug!(sql = %sql, "Executing dataset query");
        let rows = conn.query(cx, &sql, &params).await;
        if let Outcome::Ok(rows) = &rows {
            tracing::debug!(row_count = rows.len(), "Dataset query complete");
        }
        rows
    }
}
