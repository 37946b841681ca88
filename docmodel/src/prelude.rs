//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use bson::doc;

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    descriptor::{FieldDescriptor, FieldType, SchemaDescriptor},
    document::{Document, WeakDocument},
    error::{DocumentStoreError, DocumentStoreResult, SchemaError, ValidationError, ValidationErrorKind},
    model::{Model, ModelRef},
    query::{Expr, FieldOp, Filter, Query, SortDirection},
    resolve::{LoadOptions, Populate},
    schema::{Declaration, FieldDecl, FieldOptions, TypeMarker},
    store::{DocumentStore, DynDocumentStore},
    value::Value,
};
