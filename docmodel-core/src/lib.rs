//! Schema-validated documents with cross-document references, over pluggable storage.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Document types** ([`model`], [`schema`]) - Declaring document types and compiling their schemas
//! - **Schema descriptors** ([`descriptor`]) - The compiled, immutable form of a declaration
//! - **Live documents** ([`document`], [`value`]) - Mutable instances and the values they hold
//! - **Validation** ([`validate`]) - Save-time checks of field values against their descriptors
//! - **Reference resolution** ([`resolve`]) - Flattening references on save, populating them on load
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Query and filtering API** ([`query`]) - Predicates over stored records
//! - **Document store** ([`store`]) - Saving and loading documents through a backend
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{model::Model, schema::{Declaration, TypeMarker}};
//!
//! struct Person;
//!
//! impl Model for Person {
//!     fn collection_name() -> &'static str {
//!         "people"
//!     }
//!
//!     fn declare(schema: &mut Declaration) {
//!         schema
//!             .field("name", TypeMarker::String.options().required())
//!             .field("age", TypeMarker::Number.options().min(0.0));
//!     }
//! }
//!
//! let person = Person::create()?;
//! person.set("name", "Ada");
//! store.save(&person).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod model;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod validate;
pub mod value;
