//! In-memory combination of parent rows with batch-loaded children.

use crate::combine::CombineKeys;
use crate::materialize::Relation;
use sqlassoc_core::{CombineKeyError, Error, KeyValue, Result, Row};
use std::collections::HashMap;

/// A parent row with the child rows that matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub parent: Row,
    pub children: Vec<Row>,
}

/// Group `children` under `parents` by hashing the combine keys.
///
/// Parents keep their input order and children their fetched order. A child
/// may belong to several parents (many-to-many), and a parent whose key is
/// NULL gets no children.
pub fn combine(parents: &[Row], children: &Relation, keys: &CombineKeys) -> Result<Vec<Combined>> {
    let child_positions = children
        .attributes()
        .iter()
        .filter(|a| **a == keys.child_key)
        .count();
    if child_positions != 1 {
        return Err(Error::CombineKey(CombineKeyError {
            attribute: keys.child_key.clone(),
            candidates: child_positions,
        }));
    }

    let mut groups: HashMap<KeyValue, Vec<&Row>> = HashMap::new();
    for child in children {
        if let Some(key) = child.get_by_name(&keys.child_key).and_then(|v| v.key()) {
            groups.entry(key).or_default().push(child);
        }
    }

    let mut combined = Vec::with_capacity(parents.len());
    for parent in parents {
        if !parent.contains_column(&keys.parent_key) {
            return Err(Error::CombineKey(CombineKeyError {
                attribute: keys.parent_key.clone(),
                candidates: 0,
            }));
        }
        let matched = parent
            .get_by_name(&keys.parent_key)
            .and_then(|v| v.key())
            .and_then(|key| groups.get(&key))
            .map(|rows| rows.iter().map(|r| (*r).clone()).collect())
            .unwrap_or_default();
        combined.push(Combined {
            parent: parent.clone(),
            children: matched,
        });
    }

    tracing::trace!(
        parents = combined.len(),
        children = children.len(),
        "Combined rows"
    );
    Ok(combined)
}
