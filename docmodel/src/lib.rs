//! Main docmodel crate providing schema-validated documents over pluggable storage.
//!
//! This crate is the primary entry point for users of the docmodel framework. It re-exports
//! the core types from the sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **Declared document types** - Fields with types, requirements, defaults, choices and ranges
//! - **Save-time validation** - Every declared field is checked before anything is written
//! - **References** - Fields pointing at other documents, stored by identifier and resolved on load
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! struct Employee;
//! struct Boss;
//!
//! impl Model for Employee {
//!     fn collection_name() -> &'static str { "employee" }
//!
//!     fn declare(schema: &mut Declaration) {
//!         schema
//!             .field("name", TypeMarker::String.options().required())
//!             .field("boss", Boss::reference());
//!     }
//! }
//!
//! impl Model for Boss {
//!     fn collection_name() -> &'static str { "boss" }
//!
//!     fn declare(schema: &mut Declaration) {
//!         schema
//!             .field("salary", TypeMarker::Number.options().min(0.0))
//!             .field("employees", FieldDecl::array_of(Employee::reference()));
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     let boss = store.create::<Boss>()?;
//!     boss.set("salary", 10_000);
//!     store.save(&boss).await?;
//!
//!     let employee = store.create::<Employee>()?;
//!     employee.set("name", "Scott");
//!     employee.set("boss", &boss);
//!     store.save(&employee).await?;
//!
//!     boss.push("employees", &employee)?;
//!     store.save(&boss).await?;
//!
//!     // References come back as live documents, one level deep.
//!     let loaded = store.load_one::<Boss>(doc! { "salary": 10_000 }).await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Choosing a backend at runtime
//!
//! [`connect`] opens a [`DynDocumentStore`](store::DynDocumentStore) from a URL:
//!
//! ```ignore
//! let store = docmodel::connect("memory://").await?;
//! let store = docmodel::connect("mongodb://localhost:27017/app").await?; // `mongodb` feature
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

mod connect;
pub mod prelude;

pub use connect::connect;
pub use docmodel_core::{
    backend, descriptor, document, error, model, query, resolve, schema, store, validate, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
