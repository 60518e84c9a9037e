//! End-to-end association loading against an in-memory database.

mod common;

use asupersync::runtime::RuntimeBuilder;
use common::{MemoryConnection, catalog, seeded, unwrap_outcome};
use sqlassoc::prelude::*;
use sqlassoc::{KeyInferenceErrorKind, Relation};

fn configuration() -> Configuration {
    let mut config = Configuration::new();
    config
        .relation("users")
        .relation("tasks")
        .relation("tags")
        .relation("task_tags");
    config
        .register(
            AssociationDefinition::one_to_many("users", "tasks")
                .build()
                .unwrap(),
        )
        .unwrap()
        .register(
            AssociationDefinition::many_to_one("tasks", "users")
                .build()
                .unwrap(),
        )
        .unwrap()
        .register(
            AssociationDefinition::many_to_many("tasks", "tags")
                .through("task_tags")
                .build()
                .unwrap(),
        )
        .unwrap()
        .register(
            AssociationDefinition::many_to_many("users", "tags")
                .through("tasks")
                .build()
                .unwrap(),
        )
        .unwrap();
    config
}

fn container() -> Container<SchemaCatalog> {
    configuration().finalize(catalog()).unwrap()
}

fn materialize(
    container: &Container<SchemaCatalog>,
    conn: &MemoryConnection,
    source: &str,
    name: &str,
) -> Relation {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    unwrap_outcome(rt.block_on(async { container.materialize(&cx, conn, source, name).await }))
}

fn text(row: &Row, column: &str) -> String {
    row.get_named::<String>(column).unwrap()
}

fn int(row: &Row, column: &str) -> i64 {
    row.get_named::<i64>(column).unwrap()
}

#[test]
fn test_many_to_many_through_join_table() {
    let container = container();
    let conn = seeded();

    let tags = materialize(&container, &conn, "tasks", "tags");
    assert_eq!(tags.attributes(), ["id", "name", "task_id"]);
    assert_eq!(tags.len(), 1);
    let tag = &tags.rows()[0];
    assert_eq!(int(tag, "id"), 1);
    assert_eq!(text(tag, "name"), "important");
    assert_eq!(int(tag, "task_id"), 1);
    assert_eq!(conn.query_count(), 1);
}

#[test]
fn test_many_to_many_through_association_chain() {
    let container = container();
    let conn = seeded();

    let tags = materialize(&container, &conn, "users", "tags");
    assert_eq!(tags.attributes(), ["id", "name", "user_id"]);
    assert_eq!(tags.len(), 1);
    let tag = &tags.rows()[0];
    assert_eq!(int(tag, "id"), 1);
    assert_eq!(text(tag, "name"), "important");
    assert_eq!(int(tag, "user_id"), 2);
    assert_eq!(conn.query_count(), 1);
}

#[test]
fn test_one_to_many_and_many_to_one() {
    let container = container();
    let conn = seeded();

    let tasks = materialize(&container, &conn, "users", "tasks");
    assert_eq!(tasks.attributes(), ["id", "user_id", "title"]);
    let mut titles: Vec<String> = tasks.iter().map(|r| text(r, "title")).collect();
    titles.sort();
    assert_eq!(titles, ["Jane's task", "Joe's task"]);

    let owners = materialize(&container, &conn, "tasks", "users");
    assert_eq!(owners.attributes(), ["id", "name"]);
    let mut names: Vec<String> = owners.iter().map(|r| text(r, "name")).collect();
    names.sort();
    assert_eq!(names, ["Jane", "Joe"]);
}

#[test]
fn test_combine_keys_per_kind() {
    let container = container();
    let expectations = [
        ("users", "tasks", "id", "user_id"),
        ("tasks", "users", "user_id", "id"),
        ("tasks", "tags", "id", "task_id"),
        ("users", "tags", "id", "user_id"),
    ];
    for (source, name, parent, child) in expectations {
        let plan = container.resolve(source, name).unwrap();
        let keys = container.combine_keys(&plan).unwrap();
        assert_eq!(keys.parent_key, parent, "{source}.{name}");
        assert_eq!(keys.child_key, child, "{source}.{name}");
    }
}

#[test]
fn test_for_combine_stitches_children_to_parents() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let container = container();
    let conn = seeded();

    let users = rt.block_on(async {
        Dataset::new("users")
            .select(vec![
                sqlassoc::ColumnRef::new("users", "id"),
                sqlassoc::ColumnRef::new("users", "name"),
            ])
            .all(&cx, &conn)
            .await
    });
    let users = unwrap_outcome(users);
    assert_eq!(users.len(), 2);

    let plan = container.resolve("users", "tags").unwrap();
    let keys = container.combine_keys(&plan).unwrap();
    let children = unwrap_outcome(rt.block_on(async {
        Materializer::new(&plan)
            .for_combine(&cx, &conn, &container, &keys, &users)
            .await
    }));
    assert_eq!(conn.query_count(), 2);
    assert!(!conn.statements()[1].contains("FROM \"users\""));

    let combined = combine(&users, &children, &keys).unwrap();
    assert_eq!(combined.len(), 2);
    for entry in &combined {
        let names: Vec<String> = entry.children.iter().map(|c| text(c, "name")).collect();
        match text(&entry.parent, "name").as_str() {
            "Jane" => assert!(names.is_empty()),
            "Joe" => assert_eq!(names, ["important"]),
            other => panic!("unexpected user {other}"),
        }
    }
}

#[test]
fn test_for_combine_without_parents_issues_no_query() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let container = container();
    let conn = seeded();

    let plan = container.resolve("tasks", "tags").unwrap();
    let keys = container.combine_keys(&plan).unwrap();
    let children = unwrap_outcome(rt.block_on(async {
        Materializer::new(&plan)
            .for_combine(&cx, &conn, &container, &keys, &[])
            .await
    }));
    assert!(children.is_empty());
    assert_eq!(conn.query_count(), 0);
}

#[test]
fn test_rematerializing_gives_identical_results() {
    let container = container();
    let conn = seeded();

    let first = materialize(&container, &conn, "users", "tags");
    let second = materialize(&container, &conn, "users", "tags");
    assert_eq!(first.to_json(), second.to_json());

    let statements = conn.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0], statements[1]);
}

#[test]
fn test_ambiguous_foreign_key_needs_override() {
    let mut schemas = common::schemas();
    schemas.push(
        RelationSchema::new("messages")
            .attributes(["id", "sender_id", "recipient_id", "body"])
            .primary_key(["id"])
            .foreign_key("sender_id", "users")
            .foreign_key("recipient_id", "users"),
    );
    let catalog = SchemaCatalog::from_schemas(schemas).unwrap();

    let mut ambiguous = configuration();
    ambiguous
        .register(
            AssociationDefinition::one_to_many("users", "messages")
                .build()
                .unwrap(),
        )
        .unwrap();
    match ambiguous.finalize(catalog.clone()) {
        Err(Error::KeyInference(e)) => {
            assert_eq!(e.kind, KeyInferenceErrorKind::Ambiguous);
            assert_eq!(e.candidates, ["sender_id", "recipient_id"]);
        }
        other => panic!("expected key inference error, got {other:?}"),
    }

    let mut config = configuration();
    config
        .register(
            AssociationDefinition::one_to_many("users", "messages")
                .name("received")
                .foreign_key("recipient_id")
                .build()
                .unwrap(),
        )
        .unwrap();
    let container = config.finalize(catalog).unwrap();

    let plan = container.resolve("users", "received").unwrap();
    let keys = container.combine_keys(&plan).unwrap();
    assert_eq!(keys.parent_key, "id");
    assert_eq!(keys.child_key, "recipient_id");
}

#[test]
fn test_missing_tables_degrade_gracefully() {
    let mut config = configuration();
    config.relation("accounts");
    config
        .register(
            AssociationDefinition::one_to_many("accounts", "users")
                .foreign_key("account_id")
                .build()
                .unwrap(),
        )
        .unwrap();
    let container = config.finalize(catalog()).unwrap();

    assert!(!container.is_finalized("accounts"));
    assert_eq!(container.skipped_relations(), ["accounts"]);
    assert!(container.resolve("users", "tags").is_ok());
    assert!(container.resolve("accounts", "users").is_err());
}

#[test]
fn test_catalog_loaded_from_json() {
    let json = catalog().to_json().unwrap();
    let reloaded = SchemaCatalog::from_json(&json).unwrap();
    let container = configuration().finalize(reloaded).unwrap();
    let conn = seeded();

    let tags = materialize(&container, &conn, "tasks", "tags");
    assert_eq!(tags.len(), 1);
}

#[test]
fn test_backend_errors_carry_sql() {
    let container = container();
    // tables exist in the catalog but were never created
    let conn = MemoryConnection::new();
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let outcome = rt.block_on(async { container.materialize(&cx, &conn, "tasks", "tags").await });
    match outcome {
        Outcome::Err(Error::Materialization(e)) => {
            assert_eq!(e.relation, "tasks");
            assert!(e.sql.is_some_and(|sql| sql.contains("INNER JOIN \"tags\"")));
        }
        Outcome::Err(other) => panic!("expected materialization error, got {other}"),
        _ => panic!("expected an error"),
    }
}
