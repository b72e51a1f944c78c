//! Structural diff of two JSON documents.

use serde_json::{Map, Value};

use crate::operation::PatchOperation;
use crate::pointer;

/// Compute the operations that turn `previous` into `desired`.
///
/// Objects are compared key by key: keys of `desired` in document order
/// first, then keys only present in `previous`. Arrays are compared as a
/// whole and any difference replaces the entire array. A change of type at
/// a location replaces that location.
///
/// Identical documents produce no operations.
pub fn diff(previous: &Value, desired: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_at("", previous, desired, &mut ops);
    log::debug!("diff produced {} operations", ops.len());
    ops
}

fn diff_at(path: &str, previous: &Value, desired: &Value, ops: &mut Vec<PatchOperation>) {
    if previous == desired {
        return;
    }
    match (previous, desired) {
        (Value::Object(previous), Value::Object(desired)) => {
            diff_objects(path, previous, desired, ops);
        }
        _ => ops.push(PatchOperation::replace(path, desired.clone())),
    }
}

fn diff_objects(
    path: &str,
    previous: &Map<String, Value>,
    desired: &Map<String, Value>,
    ops: &mut Vec<PatchOperation>,
) {
    for (key, desired_value) in desired {
        let child = pointer::join(path, key);
        match previous.get(key) {
            Some(previous_value) => diff_at(&child, previous_value, desired_value, ops),
            None => ops.push(PatchOperation::add(child, desired_value.clone())),
        }
    }

    for key in previous.keys() {
        if !desired.contains_key(key) {
            ops.push(PatchOperation::remove(pointer::join(path, key)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::PatchKind;
    use serde_json::json;

    #[test]
    fn test_diff_identical_is_empty() {
        let doc = json!({
            "settings": {"replicas": 1, "shards": 1},
            "tags": ["a", "b"],
            "name": "logs",
            "enabled": true,
            "note": null
        });
        assert!(diff(&doc, &doc).is_empty());
        assert!(diff(&json!({}), &json!({})).is_empty());
    }

    #[test]
    fn test_diff_nested_scalar_replace() {
        let previous = json!({"settings": {"replicas": 1, "shards": 1}});
        let desired = json!({"settings": {"replicas": 2, "shards": 1}});

        let ops = diff(&previous, &desired);
        assert_eq!(ops, vec![PatchOperation::replace("/settings/replicas", json!(2))]);
    }

    #[test]
    fn test_diff_nested_remove() {
        let previous = json!({"a": {"b": 1, "c": 2}});
        let desired = json!({"a": {"b": 1}});

        let ops = diff(&previous, &desired);
        assert_eq!(ops, vec![PatchOperation::remove("/a/c")]);
    }

    #[test]
    fn test_diff_add_subtree() {
        let previous = json!({"a": 1});
        let desired = json!({"a": 1, "b": {"c": {"d": true}}});

        let ops = diff(&previous, &desired);
        assert_eq!(ops, vec![PatchOperation::add("/b", json!({"c": {"d": true}}))]);
    }

    #[test]
    fn test_diff_document_order() {
        let previous = json!({"z": 1, "gone": 0, "a": 1, "also_gone": 0});
        let desired = json!({"z": 2, "new": 1, "a": 3});

        let paths: Vec<_> = diff(&previous, &desired)
            .into_iter()
            .map(|op| (op.kind, op.path))
            .collect();
        assert_eq!(
            paths,
            vec![
                (PatchKind::Replace, "/z".to_string()),
                (PatchKind::Add, "/new".to_string()),
                (PatchKind::Replace, "/a".to_string()),
                (PatchKind::Remove, "/gone".to_string()),
                (PatchKind::Remove, "/also_gone".to_string()),
            ]
        );
    }

    #[test]
    fn test_diff_arrays_are_atomic() {
        let previous = json!({"hosts": [{"name": "a", "port": 1}, {"name": "b", "port": 2}]});
        let desired = json!({"hosts": [{"name": "a", "port": 1}, {"name": "b", "port": 3}]});

        let ops = diff(&previous, &desired);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, PatchKind::Replace);
        assert_eq!(ops[0].path, "/hosts");
        assert_eq!(ops[0].value, Some(desired["hosts"].clone()));
    }

    #[test]
    fn test_diff_type_change_replaces() {
        let previous = json!({"limits": {"cpu": 1}, "mode": "fast"});
        let desired = json!({"limits": 4, "mode": {"kind": "fast"}});

        let ops = diff(&previous, &desired);
        assert_eq!(
            ops,
            vec![
                PatchOperation::replace("/limits", json!(4)),
                PatchOperation::replace("/mode", json!({"kind": "fast"})),
            ]
        );
    }

    #[test]
    fn test_diff_null_is_a_value() {
        let ops = diff(&json!({"a": null}), &json!({"a": 1}));
        assert_eq!(ops, vec![PatchOperation::replace("/a", json!(1))]);

        let ops = diff(&json!({}), &json!({"a": null}));
        assert_eq!(ops, vec![PatchOperation::add("/a", Value::Null)]);
    }

    #[test]
    fn test_diff_escapes_keys() {
        let ops = diff(&json!({"a/b": {"~c": 1}}), &json!({"a/b": {"~c": 2}}));
        assert_eq!(ops, vec![PatchOperation::replace("/a~1b/~0c", json!(2))]);
    }

    #[test]
    fn test_diff_non_object_root() {
        let ops = diff(&json!(1), &json!("one"));
        assert_eq!(ops, vec![PatchOperation::replace("", json!("one"))]);
    }
}
