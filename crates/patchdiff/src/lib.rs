//! # Patchdiff
//!
//! Structural diff of JSON documents, folded into the sparse nested payload
//! expected by update APIs that only accept the fields that changed.
//!
//! ## Example
//!
//! ```ignore
//! use patchdiff::{diff, fold};
//! use serde_json::json;
//!
//! let previous = json!({"settings": {"replicas": 1, "shards": 1}});
//! let desired = json!({"settings": {"replicas": 2, "shards": 1}});
//!
//! let ops = diff(&previous, &desired);
//! // [replace /settings/replicas = 2]
//!
//! let payload = fold(&ops)?;
//! assert_eq!(payload.to_value()?, json!({"settings": {"replicas": 2}}));
//! ```
//!
//! Identical documents diff to no operations and fold to an empty payload,
//! so a no-op update is never sent. Removed fields fold to an explicit
//! unset marker that serialises as `null`; an explicit `null` value cannot
//! be told apart from that on the wire and is rejected when rendering.

pub mod diff;
pub mod error;
pub mod operation;
pub mod payload;
pub mod pointer;

pub use diff::diff;
pub use error::{PatchError, Result};
pub use operation::{PatchKind, PatchOperation};
pub use payload::{PatchPayload, PayloadEntry, fold};
