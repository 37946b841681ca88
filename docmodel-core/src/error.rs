//! Error types and result types for schema compilation, validation and persistence.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Schema and
//! validation failures carry structured payloads ([`SchemaError`], [`ValidationError`]) so
//! callers can match on the violated constraint and the offending field.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when declaring, saving or loading documents.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A field declaration could not be compiled into a descriptor.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A field value violated its descriptor at save time.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A stored identifier could not be resolved while populating references.
    #[error("Referenced document {id} not found in collection {collection}")]
    ReferenceNotFound {
        /// Collection of the referenced document type.
        collection: String,
        /// The identifier that failed to resolve.
        id: String,
    },
    /// A reference field holds a live document that has never been saved.
    #[error("Field `{field}` references a document that has not been saved")]
    UnsavedReference {
        /// Name of the reference field.
        field: String,
    },
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A malformed or unrecognized field declaration.
///
/// Raised while compiling a document type's declaration; the document type cannot be used
/// until the declaration is fixed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid declaration for field `{field}`: {reason}")]
pub struct SchemaError {
    /// Name of the offending field.
    pub field: String,
    /// Human readable description of what is wrong.
    pub reason: String,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The constraint a value violated.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    /// A required field has no value and no default.
    RequiredMissing,
    /// The value's shape does not match the declared type.
    TypeMismatch {
        /// The declared type, rendered for display.
        expected: String,
    },
    /// The value is not one of the declared choices.
    ChoiceViolation,
    /// The numeric value lies outside `[min, max]`.
    RangeViolation,
    /// A weak back-reference points at a document that no longer exists.
    DroppedReference,
}

/// A field value that failed validation during `save`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Validation failed for field `{field}`: {kind}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            kind,
            field: field.into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: impl ToString) -> Self {
        Self::new(
            field,
            ValidationErrorKind::TypeMismatch {
                expected: expected.to_string(),
            },
        )
    }
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationErrorKind::RequiredMissing => write!(f, "required value is missing"),
            ValidationErrorKind::TypeMismatch { expected } => write!(f, "expected {expected}"),
            ValidationErrorKind::ChoiceViolation => write!(f, "value is not one of the allowed choices"),
            ValidationErrorKind::RangeViolation => write!(f, "value is out of range"),
            ValidationErrorKind::DroppedReference => write!(f, "referenced document was dropped"),
        }
    }
}

/// A specialized `Result` type for document operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Returns the validation failure kind, if this error is a validation error.
    pub fn validation_kind(&self) -> Option<&ValidationErrorKind> {
        match self {
            DocumentStoreError::Validation(err) => Some(&err.kind),
            _ => None,
        }
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
