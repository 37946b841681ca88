//! Document type declarations.
//!
//! A document type is any Rust type implementing [`Model`]: it names its backing collection
//! and declares its fields once. The compiled schema is cached per type, so the type itself is
//! usually a unit struct that carries no data.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! struct Employee;
//! struct Boss;
//!
//! impl Model for Employee {
//!     fn collection_name() -> &'static str { "employee" }
//!
//!     fn declare(schema: &mut Declaration) {
//!         schema
//!             .field("name", TypeMarker::String)
//!             .field("boss", Boss::reference());
//!     }
//! }
//!
//! impl Model for Boss {
//!     fn collection_name() -> &'static str { "boss" }
//!
//!     fn declare(schema: &mut Declaration) {
//!         schema.schema([
//!             ("salary", FieldDecl::from(TypeMarker::Number)),
//!             ("employees", FieldDecl::array_of(Employee::reference())),
//!         ]);
//!     }
//! }
//! ```

use std::{any::TypeId, fmt, sync::Arc};

use crate::{
    descriptor::SchemaDescriptor,
    document::Document,
    error::DocumentStoreResult,
    schema::{self, Declaration},
};

/// A user-declared document type bound to one collection and one compiled schema.
pub trait Model: Sized + Send + Sync + 'static {
    /// The collection records of this type are stored in.
    fn collection_name() -> &'static str;

    /// Declares the fields of this type.
    fn declare(schema: &mut Declaration);

    /// Returns the compiled schema, compiling and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`](crate::error::SchemaError) if the declaration is malformed.
    fn schema() -> DocumentStoreResult<Arc<SchemaDescriptor>> {
        schema::compiled::<Self>()
    }

    /// Creates a new unsaved instance with every field unset.
    fn create() -> DocumentStoreResult<Document> {
        Ok(Document::new(Self::schema()?))
    }

    /// A handle other declarations use to reference this type.
    fn reference() -> ModelRef {
        ModelRef::of::<Self>()
    }
}

/// A lazily resolved handle to a document type.
///
/// Holding a `ModelRef` does not compile the referenced schema; it is resolved the first
/// time it is needed. This is what lets two document types reference each other.
#[derive(Clone, Copy)]
pub struct ModelRef {
    type_id: TypeId,
    type_name: &'static str,
    collection: &'static str,
    schema: fn() -> DocumentStoreResult<Arc<SchemaDescriptor>>,
}

impl ModelRef {
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            collection: M::collection_name(),
            schema: M::schema,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The unqualified Rust type name of the referenced model.
    pub fn name(&self) -> &'static str {
        self.type_name
            .rsplit("::")
            .next()
            .unwrap_or(self.type_name)
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Resolves the referenced type's compiled schema.
    pub fn schema(&self) -> DocumentStoreResult<Arc<SchemaDescriptor>> {
        (self.schema)()
    }

    /// True if `schema` was compiled from the referenced type.
    pub fn matches(&self, schema: &SchemaDescriptor) -> bool {
        schema.model() == Some(self.type_id)
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelRef {}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRef")
            .field("name", &self.name())
            .field("collection", &self.collection)
            .finish()
    }
}
