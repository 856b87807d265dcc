use thiserror::Error;

use crate::object::ObjectType;

/// Errors from object creation, encoding and traversal.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("object content is missing")]
    MissingContent,

    #[error("{0} is empty")]
    EmptyField(&'static str),

    #[error("{0} contains a separator character")]
    InvalidField(&'static str),

    #[error("tree entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("invalid object format: {0}")]
    InvalidFormat(String),

    #[error("content length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("{what} is too long to encode ({len} bytes)")]
    FieldTooLong { what: &'static str, len: usize },

    #[error("unsupported object type: {0}")]
    UnsupportedType(String),

    #[error("expected a {expected} object, got a {actual}")]
    UnexpectedType {
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("invalid commit range: {0}")]
    InvalidRange(String),

    #[error("object is not in native language")]
    NotNativeLanguage,

    #[error("object resolution failed: {0}")]
    Resolver(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Convenience result type for object operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
