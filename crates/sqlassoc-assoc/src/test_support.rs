//! Fixtures shared by the unit tests of this crate.

#![allow(clippy::manual_async_fn)]

use asupersync::{Cx, Outcome};
use sqlassoc_core::{
    AssociationDefinition, Connection, Dialect, Error, QueryError, QueryErrorKind,
    RelationSchema, Row, Value,
};
use sqlassoc_schema::SchemaCatalog;
use std::sync::{Arc, Mutex};

use crate::registry::AssociationRegistry;

pub(crate) fn catalog() -> SchemaCatalog {
    SchemaCatalog::from_schemas([
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
        RelationSchema::new("messages")
            .attributes(["id", "sender_id", "recipient_id", "body"])
            .primary_key(["id"])
            .foreign_key("sender_id", "users")
            .foreign_key("recipient_id", "users"),
        RelationSchema::new("people")
            .attributes(["id", "name", "manager_id"])
            .primary_key(["id"])
            .foreign_key("manager_id", "people"),
    ])
    .expect("fixture schemas are valid")
}

pub(crate) fn registry() -> AssociationRegistry {
    let mut registry = AssociationRegistry::new();
    for definition in [
        AssociationDefinition::one_to_many("users", "tasks").build(),
        AssociationDefinition::many_to_one("tasks", "users").build(),
        AssociationDefinition::many_to_many("tasks", "tags")
            .through("task_tags")
            .build(),
        AssociationDefinition::many_to_many("users", "tags")
            .through("tasks")
            .build(),
        AssociationDefinition::many_to_one("people", "people")
            .name("manager")
            .build(),
        AssociationDefinition::one_to_many("people", "people")
            .name("reports")
            .build(),
    ] {
        registry
            .register(definition.expect("fixture definition is valid"))
            .expect("fixture definition registers");
    }
    registry
}

pub(crate) fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().map(|c| (*c).to_string()).collect(), values)
}

pub(crate) fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub query_calls: usize,
    pub statements: Vec<String>,
    pub params: Vec<Vec<Value>>,
}

/// Returns the rows of the first response whose needle occurs in the SQL.
pub(crate) struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
    responses: Vec<(String, Vec<Row>)>,
    fail: bool,
}

impl MockConnection {
    pub fn new(state: Arc<Mutex<MockState>>) -> Self {
        Self {
            state,
            responses: Vec::new(),
            fail: false,
        }
    }

    pub fn respond(mut self, needle: &str, rows: Vec<Row>) -> Self {
        self.responses.push((needle.to_string(), rows));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        let rows = self
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        let fail = self.fail;
        async move {
            {
                let mut guard = state.lock().expect("lock poisoned");
                guard.query_calls += 1;
                guard.statements.push(sql.clone());
                guard.params.push(params);
            }
            if fail {
                return Outcome::Err(Error::Query(QueryError {
                    kind: QueryErrorKind::NotFound,
                    sql: Some(sql),
                    sqlstate: None,
                    message: "no such table: task_tags".to_string(),
                    source: None,
                }));
            }
            Outcome::Ok(rows)
        }
    }
}
