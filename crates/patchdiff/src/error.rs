//! Error types for pointer parsing and patch folding.

use thiserror::Error;

use crate::operation::PatchKind;

/// Errors that can occur when folding patch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// A non-empty pointer must start with `/`
    #[error("malformed pointer '{pointer}': must be empty or start with '/'")]
    MalformedPointer { pointer: String },

    /// `~` must be followed by `0` or `1`
    #[error("invalid escape in pointer '{pointer}'")]
    InvalidEscape { pointer: String },

    /// The payload is a map keyed by path segments; the root has no key
    #[error("cannot fold {kind} at the document root")]
    RootPath { kind: PatchKind },

    /// `add` and `replace` carry the value to set
    #[error("{kind} at '{path}' has no value")]
    MissingValue { kind: PatchKind, path: String },

    /// A merge patch reads `null` as "remove this field"
    #[error("cannot send an explicit null at '{path}': a merge patch would remove the field")]
    NullValue { path: String },
}

/// Result type for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;
