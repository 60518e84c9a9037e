//! Executing resolved plans.

use crate::combine::CombineKeys;
use crate::resolver::{JoinStep, ResolvedJoinPlan};
use asupersync::{Cx, Outcome};
use sqlassoc_core::{
    ColumnInfo, Connection, Error, KeyValue, MaterializationError, Result, Row, Value,
};
use sqlassoc_query::{Dataset, RelationProvider, SelectColumn};
use std::collections::HashSet;
use std::sync::Arc;

/// Rows fetched for a plan, with the plan's attribute list.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    attributes: Vec<String>,
    rows: Vec<Row>,
}

impl Relation {
    pub fn new(attributes: Vec<String>, rows: Vec<Row>) -> Self {
        Self { attributes, rows }
    }

    fn empty(attributes: Vec<String>) -> Self {
        Self::new(attributes, Vec::new())
    }

    /// Attribute names, in projection order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Iterate the rows; every call starts over.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Rows as JSON objects keyed by attribute.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.rows.iter().map(Row::to_json).collect())
    }
}

impl<'a> IntoIterator for &'a Relation {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Executes one resolved plan.
///
/// Each call issues at most one statement. Backend failures surface as
/// [`Error::Materialization`]; an unavailable relation surfaces as the
/// provider's error before anything is executed.
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    plan: &'a ResolvedJoinPlan,
}

impl<'a> Materializer<'a> {
    pub fn new(plan: &'a ResolvedJoinPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &ResolvedJoinPlan {
        self.plan
    }

    fn projection(&self) -> Vec<SelectColumn> {
        self.plan
            .projection
            .iter()
            .map(|p| SelectColumn::new(p.column.clone()))
            .collect()
    }

    /// The joined dataset: source, then every step in order, then the
    /// projection.
    pub fn dataset<P: RelationProvider + ?Sized>(&self, provider: &P) -> Result<Dataset> {
        let base = provider.dataset(&self.plan.source)?;
        self.build(provider, base, &self.plan.source, &self.plan.steps)
    }

    /// The dataset used to batch-load children for known parents.
    ///
    /// It starts at the relation adjacent to the source, so the source table
    /// is not joined, and keeps only rows whose child key is one of
    /// `parent_values`.
    pub fn combine_dataset<P: RelationProvider + ?Sized>(
        &self,
        provider: &P,
        parent_values: Vec<Value>,
    ) -> Result<Dataset> {
        let Some((first, rest)) = self.plan.steps.split_first() else {
            return Err(Error::Custom(format!(
                "plan {}.{} has no join steps",
                self.plan.source, self.plan.association
            )));
        };

        let base = provider.dataset(&first.relation)?;
        Ok(self
            .build(provider, base, &first.alias, rest)?
            .filter_in(first.right.clone(), parent_values))
    }

    /// Join `steps` onto the provider's `base` dataset, read under `alias`.
    fn build<P: RelationProvider + ?Sized>(
        &self,
        provider: &P,
        base: Dataset,
        alias: &str,
        steps: &[JoinStep],
    ) -> Result<Dataset> {
        let mut dataset = if base.reference_name() == alias {
            base
        } else {
            base.alias(alias)
        };
        for step in steps {
            let joined = provider.dataset(&step.relation)?.alias(step.alias.as_str());
            dataset = dataset.join(step.join_on(joined.relation()));
            for (column, values) in joined.filters() {
                dataset = dataset.filter_in(column.clone(), values.to_vec());
            }
        }
        Ok(dataset.select(self.projection()))
    }

    /// Execute the joined dataset as exactly one query.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(source = %self.plan.source, association = %self.plan.association)
    )]
    pub async fn call<C, P>(&self, cx: &Cx, conn: &C, provider: &P) -> Outcome<Relation, Error>
    where
        C: Connection,
        P: RelationProvider + ?Sized,
    {
        let dataset = match self.dataset(provider) {
            Ok(dataset) => dataset,
            Err(e) => return Outcome::Err(e),
        };
        self.execute(cx, conn, &dataset).await
    }

    /// Fetch the children of `parents` in one query.
    ///
    /// Parent key values are taken from `keys.parent_key`; NULLs and
    /// duplicates are dropped. Without any parent value no query is issued.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(source = %self.plan.source, association = %self.plan.association, parents = parents.len())
    )]
    pub async fn for_combine<C, P>(
        &self,
        cx: &Cx,
        conn: &C,
        provider: &P,
        keys: &CombineKeys,
        parents: &[Row],
    ) -> Outcome<Relation, Error>
    where
        C: Connection,
        P: RelationProvider + ?Sized,
    {
        let values = parent_key_values(parents, &keys.parent_key);
        if values.is_empty() {
            tracing::debug!("No parent keys, skipping child query");
            return Outcome::Ok(Relation::empty(self.attributes()));
        }

        let dataset = match self.combine_dataset(provider, values) {
            Ok(dataset) => dataset,
            Err(e) => return Outcome::Err(e),
        };
        self.execute(cx, conn, &dataset).await
    }

    fn attributes(&self) -> Vec<String> {
        self.plan
            .attributes()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    async fn execute<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        dataset: &Dataset,
    ) -> Outcome<Relation, Error> {
        let attributes = self.attributes();
        let rows = match dataset.all(cx, conn).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(self.failure(conn, dataset, e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        // Label every row with the plan's attributes
        let columns = Arc::new(ColumnInfo::new(attributes.clone()));
        let mut labeled = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != attributes.len() {
                let e = Error::Custom(format!(
                    "row has {} values, expected {}",
                    row.len(),
                    attributes.len()
                ));
                return Outcome::Err(self.failure(conn, dataset, e));
            }
            labeled.push(Row::with_columns(
                Arc::clone(&columns),
                row.values().cloned().collect(),
            ));
        }

        tracing::debug!(rows = labeled.len(), "Materialized plan");
        Outcome::Ok(Relation {
            attributes,
            rows: labeled,
        })
    }

    fn failure<C: Connection>(&self, conn: &C, dataset: &Dataset, source: Error) -> Error {
        let (sql, _) = dataset.to_sql(conn.dialect());
        tracing::debug!(error = %source, sql = %sql, "Materialization failed");
        Error::Materialization(MaterializationError {
            relation: self.plan.source.clone(),
            sql: Some(sql),
            source: Box::new(source),
        })
    }
}

/// Distinct non-NULL values of `attribute` across `rows`, in first-seen order.
fn parent_key_values(rows: &[Row], attribute: &str) -> Vec<Value> {
    let mut seen: HashSet<KeyValue> = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get_by_name(attribute))
        .filter(|value| value.key().is_some_and(|key| seen.insert(key)))
        .cloned()
        .collect()
}
