//! Patch operations, serialised in RFC 6902 shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    /// Path exists only in the desired document
    Add,
    /// Path exists only in the previous document
    Remove,
    /// Path exists in both with different values
    Replace,
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        })
    }
}

/// One structural delta between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    #[serde(rename = "op")]
    pub kind: PatchKind,
    /// JSON pointer to the changed location
    pub path: String,
    /// New value; absent for `remove`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            kind: PatchKind::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            kind: PatchKind::Remove,
            path: path.into(),
            value: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            kind: PatchKind::Replace,
            path: path.into(),
            value: Some(value),
        }
    }
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.value {
            Some(value) => write!(f, "{} {path} = {value}", self.kind),
            None => write!(f, "{} {path}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_serializes_as_json_patch() {
        let op = PatchOperation::replace("/settings/replicas", json!(2));
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "replace", "path": "/settings/replicas", "value": 2})
        );

        let op = PatchOperation::remove("/a/c");
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "remove", "path": "/a/c"})
        );
    }

    #[test]
    fn test_operation_deserializes() {
        let op: PatchOperation =
            serde_json::from_value(json!({"op": "add", "path": "/x", "value": [1, 2]})).unwrap();
        assert_eq!(op, PatchOperation::add("/x", json!([1, 2])));
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(
            PatchOperation::replace("/settings/replicas", json!(2)).to_string(),
            "replace /settings/replicas = 2"
        );
        assert_eq!(PatchOperation::remove("/a/c").to_string(), "remove /a/c");
    }
}
