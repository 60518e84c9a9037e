//! Combine keys: which parent attribute matches which child attribute.

use crate::resolver::ResolvedJoinPlan;
use serde::{Deserialize, Serialize};
use sqlassoc_core::{AssociationErrorKind, CombineKeyError, Error, Result};
use sqlassoc_query::ColumnRef;
use std::collections::BTreeMap;

/// The single-entry key map stitching parent rows to child rows.
///
/// | kind           | parent key               | child key                         |
/// |----------------|--------------------------|-----------------------------------|
/// | `one_to_many`  | source primary key       | target foreign key                |
/// | `many_to_one`  | source foreign key       | target primary key                |
/// | `many_to_many` | source primary key       | join-relation key carried along   |
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombineKeys {
    /// Attribute of the parent (source) rows
    pub parent_key: String,
    /// Attribute of the child rows, unique within the plan's projection
    pub child_key: String,
}

impl CombineKeys {
    /// The key map as `{parent_key: child_key}`.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.parent_key.clone(), self.child_key.clone())])
    }
}

/// Derive the combine keys of a resolved plan.
///
/// The first join step links the source to the rest of the path, so its
/// predicate is the pair. Its right column must be the only projected
/// attribute with that name. A duplicate name, or a target attribute of the
/// same name shadowing it, fails with a [`CombineKeyError`], which signals a
/// defect.
pub fn combine_keys(plan: &ResolvedJoinPlan) -> Result<CombineKeys> {
    let step = plan.first_step().ok_or_else(|| {
        Error::association(
            AssociationErrorKind::Invalid,
            plan.source.as_str(),
            plan.association.as_str(),
            "plan has no join steps",
        )
    })?;

    let carried = &step.right;
    let named: Vec<&ColumnRef> = plan
        .projection
        .iter()
        .filter(|p| p.name() == carried.attribute)
        .map(|p| &p.column)
        .collect();
    match named.as_slice() {
        [column] if *column == carried => {}
        [column] => {
            tracing::warn!(
                source = %plan.source,
                association = %plan.association,
                carried = %carried,
                shadowed_by = %column,
                "Combine key is shadowed in projection"
            );
            return Err(Error::CombineKey(CombineKeyError {
                attribute: carried.to_string(),
                candidates: 0,
            }));
        }
        columns => {
            tracing::warn!(
                source = %plan.source,
                association = %plan.association,
                attribute = %carried.attribute,
                candidates = columns.len(),
                "Combine key is not unique in projection"
            );
            return Err(Error::CombineKey(CombineKeyError {
                attribute: carried.attribute.clone(),
                candidates: columns.len(),
            }));
        }
    }

    Ok(CombineKeys {
        parent_key: step.left.attribute.clone(),
        child_key: carried.attribute.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::JoinResolver;
    use crate::test_support::{catalog, registry};
    use sqlassoc_core::RelationSchema;

    fn plan(source: &str, name: &str) -> ResolvedJoinPlan {
        let registry = registry();
        let catalog = catalog();
        JoinResolver::new(&registry, &catalog)
            .resolve(source, name)
            .unwrap()
    }

    fn pair(keys: &CombineKeys) -> (&str, &str) {
        (keys.parent_key.as_str(), keys.child_key.as_str())
    }

    #[test]
    fn test_direct_kinds() {
        let o2m = combine_keys(&plan("users", "tasks")).unwrap();
        assert_eq!(pair(&o2m), ("id", "user_id"));

        let m2o = combine_keys(&plan("tasks", "users")).unwrap();
        assert_eq!(pair(&m2o), ("user_id", "id"));
    }

    #[test]
    fn test_many_to_many_uses_join_table_key() {
        let keys = combine_keys(&plan("tasks", "tags")).unwrap();
        assert_eq!(pair(&keys), ("id", "task_id"));
        assert_eq!(
            keys.to_map(),
            BTreeMap::from([("id".to_string(), "task_id".to_string())])
        );
    }

    #[test]
    fn test_through_chain_uses_source_adjacent_key() {
        let keys = combine_keys(&plan("users", "tags")).unwrap();
        assert_eq!(pair(&keys), ("id", "user_id"));
    }

    #[test]
    fn test_self_join() {
        let keys = combine_keys(&plan("people", "manager")).unwrap();
        assert_eq!(pair(&keys), ("manager_id", "id"));
    }

    #[test]
    fn test_duplicate_child_attribute_is_fatal() {
        let plan = plan("tasks", "tags")
            .with_attribute("tasks", "id")
            .unwrap()
            .with_attribute("task_tags", "task_id")
            .unwrap();
        let err = combine_keys(&plan).unwrap_err();
        match &err {
            Error::CombineKey(e) => {
                assert_eq!(e.attribute, "task_id");
                assert_eq!(e.candidates, 2);
            }
            other => panic!("expected combine key error, got {other:?}"),
        }
        assert!(err.is_defect());
    }

    #[test]
    fn test_target_attribute_shadowing_carried_key_is_fatal() {
        let registry = registry();
        let mut catalog = catalog();
        catalog
            .insert(
                RelationSchema::new("tags")
                    .attributes(["id", "name", "task_id"])
                    .primary_key(["id"]),
            )
            .unwrap();
        let plan = JoinResolver::new(&registry, &catalog)
            .resolve("tasks", "tags")
            .unwrap();

        // the target's own task_id wins the name and the join-table key is dropped
        assert_eq!(plan.attributes(), ["id", "name", "task_id"]);
        assert!(plan.projection.iter().all(|p| p.column.relation == "tags"));

        let err = combine_keys(&plan).unwrap_err();
        match &err {
            Error::CombineKey(e) => {
                assert_eq!(e.attribute, "task_tags.task_id");
                assert_eq!(e.candidates, 0);
            }
            other => panic!("expected combine key error, got {other:?}"),
        }
        assert!(err.is_defect());
    }

    #[test]
    fn test_unprojected_child_attribute() {
        let mut plan = plan("users", "tasks");
        plan.projection.retain(|p| p.name() != "user_id");
        let err = combine_keys(&plan).unwrap_err();
        assert!(matches!(err, Error::CombineKey(CombineKeyError { candidates: 0, .. })));
    }

    #[test]
    fn test_empty_plan() {
        let mut plan = plan("users", "tasks");
        plan.steps.clear();
        assert_eq!(
            combine_keys(&plan).unwrap_err().association_kind(),
            Some(AssociationErrorKind::Invalid)
        );
    }
}
