//! An in-memory backend for end-to-end tests.
//!
//! It executes the statements sqlassoc renders for SQLite (quoted
//! identifiers, INNER JOINs on one equality each, an optional `IN` filter)
//! over seeded tables, so plans are checked against real join semantics.

#![allow(dead_code, clippy::manual_async_fn)]

use asupersync::{Cx, Outcome};
use sqlassoc::{
    Connection, Dialect, Error, QueryError, QueryErrorKind, RelationSchema, Row, SchemaCatalog,
    Value,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
pub struct Database {
    tables: HashMap<String, Table>,
    pub statements: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MemoryConnection {
    db: Arc<Mutex<Database>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, schema: &RelationSchema) {
        let mut db = self.db.lock().expect("lock poisoned");
        db.tables.insert(
            schema.name.clone(),
            Table {
                columns: schema.attributes.clone(),
                rows: Vec::new(),
            },
        );
    }

    pub fn insert(&self, table: &str, values: Vec<Value>) {
        let mut db = self.db.lock().expect("lock poisoned");
        let table = db.tables.get_mut(table).expect("table exists");
        assert_eq!(table.columns.len(), values.len(), "arity mismatch");
        table.rows.push(values);
    }

    pub fn query_count(&self) -> usize {
        self.db.lock().expect("lock poisoned").statements.len()
    }

    pub fn statements(&self) -> Vec<String> {
        self.db.lock().expect("lock poisoned").statements.clone()
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, String> {
        let query = parse(sql)?;
        let db = self.db.lock().map_err(|e| e.to_string())?;

        let table = |name: &str| {
            db.tables
                .get(name)
                .ok_or_else(|| format!("no such table: {name}"))
        };

        // a binding maps each alias in scope to (table, row index)
        let base = table(&query.from.relation)?;
        let mut bindings: Vec<Vec<(String, &Table, usize)>> = (0..base.rows.len())
            .map(|i| vec![(query.from.alias.clone(), base, i)])
            .collect();

        for join in &query.joins {
            let joined = table(&join.source.relation)?;
            let mut next = Vec::new();
            for binding in &bindings {
                let left = lookup(binding, &join.left)?;
                for i in 0..joined.rows.len() {
                    let mut extended = binding.clone();
                    extended.push((join.source.alias.clone(), joined, i));
                    let right = lookup(&extended, &join.right)?;
                    if matches(left, right) {
                        next.push(extended);
                    }
                }
            }
            bindings = next;
        }

        if let Some((column, count)) = &query.filter {
            let wanted = params
                .get(..*count)
                .ok_or_else(|| format!("expected {count} parameters, got {}", params.len()))?;
            let mut kept = Vec::new();
            for binding in bindings {
                let value = lookup(&binding, column)?;
                if wanted.iter().any(|w| matches(value, w)) {
                    kept.push(binding);
                }
            }
            bindings = kept;
        }
        if query.empty {
            bindings.clear();
        }

        let names: Vec<String> = query.columns.iter().map(|(_, c)| c.clone()).collect();
        bindings
            .iter()
            .map(|binding| {
                let values = query
                    .columns
                    .iter()
                    .map(|col| lookup(binding, col).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, String>(Row::new(names.clone(), values))
            })
            .collect()
    }
}

impl Connection for MemoryConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.db
            .lock()
            .expect("lock poisoned")
            .statements
            .push(sql.to_string());
        let result = self.execute(sql, params);
        let sql = sql.to_string();
        async move {
            match result {
                Ok(rows) => Outcome::Ok(rows),
                Err(message) => Outcome::Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Database,
                    sql: Some(sql),
                    sqlstate: None,
                    message,
                    source: None,
                })),
            }
        }
    }
}

fn matches(a: &Value, b: &Value) -> bool {
    match (a.key(), b.key()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn lookup<'a>(
    binding: &[(String, &'a Table, usize)],
    (alias, column): &(String, String),
) -> Result<&'a Value, String> {
    let (table, row) = binding
        .iter()
        .find(|(a, _, _)| a == alias)
        .map(|(_, table, row)| (*table, *row))
        .ok_or_else(|| format!("unknown alias: {alias}"))?;
    let index = table
        .columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| format!("no such column: {alias}.{column}"))?;
    Ok(&table.rows[row][index])
}

struct Source {
    relation: String,
    alias: String,
}

struct JoinClause {
    source: Source,
    left: (String, String),
    right: (String, String),
}

struct Query {
    columns: Vec<(String, String)>,
    from: Source,
    joins: Vec<JoinClause>,
    /// Filtered column and number of bound values
    filter: Option<((String, String), usize)>,
    empty: bool,
}

impl Query {
    fn never(mut self) -> Self {
        self.empty = true;
        self
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn column(s: &str) -> Result<(String, String), String> {
    let (relation, attribute) = s
        .trim()
        .split_once("\".\"")
        .ok_or_else(|| format!("unqualified column: {s}"))?;
    Ok((unquote(relation), unquote(attribute)))
}

fn source(s: &str) -> Source {
    match s.split_once(" AS ") {
        Some((relation, alias)) => Source {
            relation: unquote(relation),
            alias: unquote(alias),
        },
        None => Source {
            relation: unquote(s),
            alias: unquote(s),
        },
    }
}

fn parse(sql: &str) -> Result<Query, String> {
    let rest = sql
        .strip_prefix("SELECT ")
        .ok_or_else(|| format!("unsupported statement: {sql}"))?;
    let (projection, rest) = rest
        .split_once(" FROM ")
        .ok_or_else(|| format!("missing FROM: {sql}"))?;
    let columns = projection
        .split(", ")
        .map(column)
        .collect::<Result<Vec<_>, _>>()?;

    let (from, filter) = match rest.split_once(" WHERE ") {
        Some((from, filter)) => (from, Some(filter)),
        None => (rest, None),
    };

    let mut parts = from.split(" INNER JOIN ");
    let base = source(parts.next().unwrap_or_default());
    let mut joins = Vec::new();
    for part in parts {
        let (relation, predicate) = part
            .split_once(" ON ")
            .ok_or_else(|| format!("join without ON: {part}"))?;
        let (left, right) = predicate
            .split_once(" = ")
            .ok_or_else(|| format!("unsupported predicate: {predicate}"))?;
        joins.push(JoinClause {
            source: source(relation),
            left: column(left)?,
            right: column(right)?,
        });
    }

    let filter = match filter {
        None => None,
        Some("1 = 0") => {
            return Ok(Query {
                columns,
                from: base,
                joins,
                filter: None,
                empty: false,
            }
            .never());
        }
        Some(filter) => {
            let (col, list) = filter
                .split_once(" IN (")
                .ok_or_else(|| format!("unsupported filter: {filter}"))?;
            let count = list.trim_end_matches(')').split(", ").count();
            Some((column(col)?, count))
        }
    };

    Ok(Query {
        columns,
        from: base,
        joins,
        filter,
        empty: false,
    })
}

/// Schemas of the tasks/tags/users database used throughout.
pub fn schemas() -> Vec<RelationSchema> {
    vec![
        RelationSchema::new("users")
            .attributes(["id", "name"])
            .primary_key(["id"]),
        RelationSchema::new("tasks")
            .attributes(["id", "user_id", "title"])
            .primary_key(["id"])
            .foreign_key("user_id", "users"),
        RelationSchema::new("tags")
            .attributes(["id", "name"])
            .primary_key(["id"]),
        RelationSchema::new("task_tags")
            .attributes(["tag_id", "task_id"])
            .primary_key(["tag_id", "task_id"])
            .foreign_key("tag_id", "tags")
            .foreign_key("task_id", "tasks"),
    ]
}

pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::from_schemas(schemas()).expect("valid schemas")
}

/// Jane and Joe each own one task; Joe's task is tagged "important".
pub fn seeded() -> MemoryConnection {
    let conn = MemoryConnection::new();
    for schema in schemas() {
        conn.create(&schema);
    }
    conn.insert("users", vec![Value::BigInt(1), Value::Text("Jane".into())]);
    conn.insert("users", vec![Value::BigInt(2), Value::Text("Joe".into())]);
    conn.insert(
        "tasks",
        vec![Value::BigInt(1), Value::BigInt(2), Value::Text("Joe's task".into())],
    );
    conn.insert(
        "tasks",
        vec![Value::BigInt(2), Value::BigInt(1), Value::Text("Jane's task".into())],
    );
    conn.insert("tags", vec![Value::BigInt(1), Value::Text("important".into())]);
    conn.insert("task_tags", vec![Value::BigInt(1), Value::BigInt(1)]);
    conn
}
