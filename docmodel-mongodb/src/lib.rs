//! MongoDB storage backend for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Queries are
//! translated into MongoDB filter documents and run by the server.
//!
//! To use this backend, enable the `mongodb` feature of the facade crate:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, mongodb::MongoDbStore, DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_mongodb;

mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
