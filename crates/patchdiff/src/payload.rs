//! Folding patch operations into a sparse nested update payload.
//!
//! The payload is the body sent to an update API that only accepts
//! "set these fields". Each operation's path becomes a chain of nested
//! maps ending in a leaf. Removals become an explicit [`PayloadEntry::Unset`]
//! leaf, serialised as `null`, so the body reads as a JSON Merge Patch
//! (RFC 7396). Keys keep the order in which operations first touched them.
//!
//! A merge patch cannot express "set this field to `null`", so rendering a
//! payload that sets a null (at a leaf or inside an object value) fails
//! with [`PatchError::NullValue`] instead of sending a removal.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{PatchError, Result};
use crate::operation::{PatchKind, PatchOperation};
use crate::pointer;

/// One key of a [`PatchPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEntry {
    /// Set the field to this value
    Set(Value),
    /// Clear the field
    Unset,
    /// Descend into a nested object
    Nested(PatchPayload),
}

/// Sparse nested update built by [`fold`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPayload {
    entries: IndexMap<String, PayloadEntry>,
}

/// Fold `operations` in order onto an empty payload.
///
/// `add` and `replace` both set the leaf; later operations on the same path
/// win. An operation below a leaf that was previously set replaces the
/// leaf with a nested map.
pub fn fold(operations: &[PatchOperation]) -> Result<PatchPayload> {
    let mut payload = PatchPayload::new();
    for op in operations {
        payload.apply(op)?;
    }
    Ok(payload)
}

impl PatchPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a single operation into the payload.
    pub fn apply(&mut self, op: &PatchOperation) -> Result<()> {
        let segments = pointer::parse(&op.path)?;
        if segments.is_empty() {
            return Err(PatchError::RootPath { kind: op.kind });
        }

        let entry = match op.kind {
            PatchKind::Add | PatchKind::Replace => {
                let value = op.value.clone().ok_or_else(|| PatchError::MissingValue {
                    kind: op.kind,
                    path: op.path.clone(),
                })?;
                PayloadEntry::Set(value)
            }
            PatchKind::Remove => PayloadEntry::Unset,
        };

        log::trace!("fold {op}");
        self.insert(&segments, entry);
        Ok(())
    }

    fn insert(&mut self, segments: &[String], entry: PayloadEntry) {
        match segments {
            [] => {}
            [leaf] => {
                self.entries.insert(leaf.clone(), entry);
            }
            [head, rest @ ..] => {
                let slot = self
                    .entries
                    .entry(head.clone())
                    .or_insert_with(|| PayloadEntry::Nested(Self::new()));
                match slot {
                    PayloadEntry::Nested(child) => child.insert(rest, entry),
                    PayloadEntry::Set(_) | PayloadEntry::Unset => {
                        let mut child = Self::new();
                        child.insert(rest, entry);
                        *slot = PayloadEntry::Nested(child);
                    }
                }
            }
        }
    }

    /// True when the payload would change nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Look up the entry at `pointer`.
    ///
    /// Returns `None` for the root pointer, malformed pointers, and paths
    /// the payload does not touch.
    pub fn get(&self, pointer: &str) -> Option<&PayloadEntry> {
        let segments = pointer::parse(pointer).ok()?;
        let (last, parents) = segments.split_last()?;

        let mut node = self;
        for segment in parents {
            match node.entries.get(segment)? {
                PayloadEntry::Nested(child) => node = child,
                PayloadEntry::Set(_) | PayloadEntry::Unset => return None,
            }
        }
        node.entries.get(last)
    }

    /// Render as a JSON merge patch, with removed fields as `null`.
    pub fn to_value(&self) -> Result<Value> {
        self.render("")
    }

    fn render(&self, base: &str) -> Result<Value> {
        let mut map = Map::new();
        for (key, entry) in &self.entries {
            let path = pointer::join(base, key);
            let value = match entry {
                PayloadEntry::Set(value) => {
                    if let Some(path) = first_null(value, &path) {
                        return Err(PatchError::NullValue { path });
                    }
                    value.clone()
                }
                PayloadEntry::Unset => Value::Null,
                PayloadEntry::Nested(child) => child.render(&path)?,
            };
            map.insert(key.clone(), value);
        }
        Ok(Value::Object(map))
    }

    /// Apply the payload to `document` as a merge patch.
    ///
    /// Set leaves overwrite, unset leaves delete, nested maps merge. A
    /// nested entry over a non-object replaces it with an object.
    pub fn merge_into(&self, document: &mut Value) {
        if !document.is_object() {
            *document = Value::Object(Map::new());
        }
        let Value::Object(map) = document else {
            return;
        };

        for (key, entry) in &self.entries {
            match entry {
                PayloadEntry::Set(value) => {
                    map.insert(key.clone(), value.clone());
                }
                PayloadEntry::Unset => {
                    map.remove(key);
                }
                PayloadEntry::Nested(child) => {
                    child.merge_into(map.entry(key.clone()).or_insert(Value::Null));
                }
            }
        }
    }
}

impl Serialize for PatchPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// Pointer to the first `null` a merge patch would read as a removal.
///
/// Arrays are replaced whole by a merge patch, so nulls inside them are kept.
fn first_null(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Null => Some(path.to_string()),
        Value::Object(map) => map
            .iter()
            .find_map(|(key, child)| first_null(child, &pointer::join(path, key))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use serde_json::json;

    #[test]
    fn test_fold_empty() {
        let payload = fold(&[]).unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.to_value().unwrap(), json!({}));
    }

    #[test]
    fn test_fold_of_identical_diff_is_empty() {
        let doc = json!({"settings": {"replicas": 1}, "tags": ["x"]});
        assert!(fold(&diff(&doc, &doc)).unwrap().is_empty());
    }

    #[test]
    fn test_fold_nested_replace() {
        let previous = json!({"settings": {"replicas": 1, "shards": 1}});
        let desired = json!({"settings": {"replicas": 2, "shards": 1}});

        let payload = fold(&diff(&previous, &desired)).unwrap();
        assert_eq!(payload.to_value().unwrap(), json!({"settings": {"replicas": 2}}));
        assert_eq!(payload.len(), 1);
        assert_eq!(
            payload.get("/settings/replicas"),
            Some(&PayloadEntry::Set(json!(2)))
        );
        assert_eq!(payload.get("/settings/shards"), None);
    }

    #[test]
    fn test_fold_remove_is_unset() {
        let previous = json!({"a": {"b": 1, "c": 2}});
        let desired = json!({"a": {"b": 1}});

        let payload = fold(&diff(&previous, &desired)).unwrap();
        assert_eq!(payload.get("/a/c"), Some(&PayloadEntry::Unset));
        assert_eq!(payload.to_value().unwrap(), json!({"a": {"c": null}}));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"a": {"c": null}})
        );
    }

    #[test]
    fn test_unset_differs_from_explicit_null() {
        let payload = fold(&[
            PatchOperation::add("/a", Value::Null),
            PatchOperation::remove("/b"),
        ])
        .unwrap();
        assert_eq!(payload.get("/a"), Some(&PayloadEntry::Set(Value::Null)));
        assert_eq!(payload.get("/b"), Some(&PayloadEntry::Unset));
    }

    #[test]
    fn test_explicit_null_is_not_rendered_as_removal() {
        let set_null = fold(&diff(&json!({"a": 1}), &json!({"a": null}))).unwrap();
        let removed = fold(&diff(&json!({"a": 1}), &json!({}))).unwrap();

        assert_eq!(removed.to_value().unwrap(), json!({"a": null}));
        assert_eq!(
            set_null.to_value().unwrap_err(),
            PatchError::NullValue {
                path: "/a".to_string()
            }
        );
        assert!(serde_json::to_value(&set_null).is_err());
    }

    #[test]
    fn test_null_inside_object_value_is_rejected() {
        let payload = fold(&[PatchOperation::add(
            "/limits",
            json!({"cpu": 2, "memory": null}),
        )])
        .unwrap();
        assert_eq!(
            payload.to_value().unwrap_err(),
            PatchError::NullValue {
                path: "/limits/memory".to_string()
            }
        );

        let payload = fold(&[PatchOperation::add("/hosts", json!(["a", null]))]).unwrap();
        assert_eq!(payload.to_value().unwrap(), json!({"hosts": ["a", null]}));
    }

    #[test]
    fn test_payload_keeps_document_order() {
        let previous = json!({"zone": "a", "name": "x", "mode": {"kind": "fast", "cpu": 1}});
        let desired = json!({"zone": "b", "name": "y", "mode": {"kind": "slow", "cpu": 2}});

        let payload = fold(&diff(&previous, &desired)).unwrap();
        let keys: Vec<&str> = payload.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["zone", "name", "mode"]);

        let value = payload.to_value().unwrap();
        let rendered: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(rendered, ["zone", "name", "mode"]);
        let nested: Vec<&String> = value["mode"].as_object().unwrap().keys().collect();
        assert_eq!(nested, ["kind", "cpu"]);
    }

    #[test]
    fn test_fold_last_write_wins() {
        let payload = fold(&[
            PatchOperation::add("/x", json!(1)),
            PatchOperation::replace("/x", json!(2)),
        ])
        .unwrap();
        assert_eq!(payload.to_value().unwrap(), json!({"x": 2}));

        let payload = fold(&[
            PatchOperation::replace("/x", json!(2)),
            PatchOperation::remove("/x"),
        ])
        .unwrap();
        assert_eq!(payload.get("/x"), Some(&PayloadEntry::Unset));
    }

    #[test]
    fn test_fold_deeper_op_replaces_scalar() {
        let payload = fold(&[
            PatchOperation::replace("/limits", json!(4)),
            PatchOperation::add("/limits/cpu", json!(2)),
        ])
        .unwrap();
        assert_eq!(payload.to_value().unwrap(), json!({"limits": {"cpu": 2}}));

        // And a later set at the parent overwrites the nested map
        let payload = fold(&[
            PatchOperation::add("/limits/cpu", json!(2)),
            PatchOperation::replace("/limits", json!(4)),
        ])
        .unwrap();
        assert_eq!(payload.to_value().unwrap(), json!({"limits": 4}));
    }

    #[test]
    fn test_fold_rejects_bad_paths() {
        assert_eq!(
            fold(&[PatchOperation::replace("", json!(1))]).unwrap_err(),
            PatchError::RootPath {
                kind: PatchKind::Replace
            }
        );
        assert!(matches!(
            fold(&[PatchOperation::add("a/b", json!(1))]),
            Err(PatchError::MalformedPointer { .. })
        ));

        let missing = PatchOperation {
            kind: PatchKind::Add,
            path: "/a".to_string(),
            value: None,
        };
        assert!(matches!(
            fold(&[missing]),
            Err(PatchError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_fold_unescapes_keys() {
        let payload = fold(&[PatchOperation::replace("/a~1b/~0c", json!(true))]).unwrap();
        assert_eq!(payload.to_value().unwrap(), json!({"a/b": {"~c": true}}));
        assert_eq!(payload.get("/a~1b/~0c"), Some(&PayloadEntry::Set(json!(true))));
    }

    #[test]
    fn test_single_scalar_change_yields_single_leaf() {
        let previous = json!({
            "name": "logs",
            "settings": {"index": {"refresh": "1s", "replicas": 1}, "shards": 3},
            "tags": ["a"]
        });
        let mut desired = previous.clone();
        desired["settings"]["index"]["refresh"] = json!("30s");

        let ops = diff(&previous, &desired);
        assert_eq!(ops.len(), 1);

        let payload = fold(&ops).unwrap();
        assert_eq!(
            payload.to_value().unwrap(),
            json!({"settings": {"index": {"refresh": "30s"}}})
        );
    }

    #[test]
    fn test_merge_into_reproduces_desired() {
        let previous = json!({
            "name": "logs",
            "settings": {"replicas": 1, "shards": 1, "legacy": true},
            "hosts": ["a", "b"],
            "mode": {"kind": "fast"}
        });
        let desired = json!({
            "name": "logs",
            "settings": {"replicas": 2, "shards": 1},
            "hosts": ["a", "c"],
            "mode": "slow",
            "owner": {"team": "search"}
        });

        let payload = fold(&diff(&previous, &desired)).unwrap();
        let mut document = previous;
        payload.merge_into(&mut document);
        assert_eq!(document, desired);
    }
}
