//! The document store: saving and loading documents through a backend.
//!
//! [`DocumentStore`] is where the schema layer meets storage. Saving validates a document
//! against its schema, flattens its references and writes a single record. Loading reads
//! records back and resolves their references into live documents.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//!
//! let user = store.create::<User>()?;
//! user.set("name", "Alice");
//! store.save(&user).await?;
//!
//! let loaded = store.load_one::<User>(doc! { "name": "Alice" }).await?;
//! ```

use std::{collections::HashMap, sync::Arc};

use bson::Uuid;
use tracing::debug;

use crate::{
    backend::{StoreBackend, StoredRecord},
    descriptor::SchemaDescriptor,
    document::Document,
    error::DocumentStoreResult,
    model::Model,
    query::{Filter, Query},
    resolve::{self, LoadOptions},
    validate::validate_document,
    value::Value,
};

/// A document store bound to a backend.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A document store whose backend was chosen at runtime.
pub type DynDocumentStore = DocumentStore<Box<dyn crate::backend::DynStoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates a new unsaved instance of `M`.
    pub fn create<M: Model>(&self) -> DocumentStoreResult<Document> {
        M::create()
    }

    /// Validates `doc`, writes it as a single record and returns it.
    ///
    /// Validation runs over every declared field in declaration order and stops at the first
    /// failure, in which case nothing is written. Referenced documents must already be saved;
    /// they are stored by identifier and are not saved themselves. On success the document
    /// carries its identifier and any defaults that were applied.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`](crate::error::ValidationError) for an invalid field,
    /// [`UnsavedReference`](crate::error::DocumentStoreError::UnsavedReference) for a
    /// reference to an unsaved document, or any backend failure.
    pub async fn save(&self, doc: &Document) -> DocumentStoreResult<Document> {
        let (id, record, defaults) = prepare(doc)?;
        let collection = doc.collection_name();

        debug!(collection, id = ?id, "Saving document");

        let id = self
            .backend
            .insert_or_update(collection, id, record)
            .await?;
        doc.mark_saved(id, defaults);

        debug!(collection, %id, "Saved document");

        Ok(doc.clone())
    }

    /// Loads the first document of type `M` matching `query`, resolving its references.
    pub async fn load_one<M: Model>(&self, query: impl Into<Query>) -> DocumentStoreResult<Option<Document>> {
        self.load_one_with::<M>(query, LoadOptions::default())
            .await
    }

    pub async fn load_one_with<M: Model>(
        &self,
        query: impl Into<Query>,
        options: LoadOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let schema = M::schema()?;
        let query = query.into();

        debug!(collection = schema.collection(), ?query, "Loading document");

        match self
            .backend
            .find_one(schema.collection(), query)
            .await?
        {
            Some(stored) => Ok(Some(self.hydrate(&schema, stored, &options).await?)),
            None => Ok(None),
        }
    }

    /// Loads every document of type `M` matching `query`, resolving their references.
    pub async fn load_many<M: Model>(&self, query: impl Into<Query>) -> DocumentStoreResult<Vec<Document>> {
        self.load_many_with::<M>(query, LoadOptions::default())
            .await
    }

    pub async fn load_many_with<M: Model>(
        &self,
        query: impl Into<Query>,
        options: LoadOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let schema = M::schema()?;
        let query = query.into();

        debug!(collection = schema.collection(), ?query, "Loading documents");

        let records = self
            .backend
            .find(schema.collection(), query)
            .await?;

        let mut documents = Vec::with_capacity(records.len());
        for stored in records {
            documents.push(self.hydrate(&schema, stored, &options).await?);
        }

        Ok(documents)
    }

    /// Loads the document of type `M` with the given identifier.
    pub async fn load_by_id<M: Model>(&self, id: Uuid) -> DocumentStoreResult<Option<Document>> {
        self.load_one::<M>(Filter::id(id)).await
    }

    /// Counts documents of type `M` matching `query`.
    pub async fn count<M: Model>(&self, query: impl Into<Query>) -> DocumentStoreResult<u64> {
        self.backend
            .count(M::collection_name(), query.into())
            .await
    }

    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        debug!(collection = name, "Dropping collection");
        self.backend.drop_collection(name).await
    }

    pub async fn drop_database(&self) -> DocumentStoreResult<()> {
        debug!("Dropping database");
        self.backend.drop_database().await
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts the store down, releasing backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }

    async fn hydrate(
        &self,
        schema: &Arc<SchemaDescriptor>,
        stored: StoredRecord,
        options: &LoadOptions,
    ) -> DocumentStoreResult<Document> {
        let fields = resolve::populate(&self.backend, schema, &stored.record, &options.populate).await?;

        Ok(Document::from_parts(schema.clone(), Some(stored.id), fields))
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore {
        let backend: Box<dyn crate::backend::DynStoreBackend> = Box::new(self.backend);
        DocumentStore::new(backend)
    }
}

impl DynDocumentStore {
    /// Borrows the store with its concrete backend type, if the backend is a `B`.
    pub fn as_static<B: StoreBackend + 'static>(&self) -> Option<DocumentStore<&B>> {
        crate::backend::DynStoreBackend::as_any(&*self.backend)
            .downcast_ref::<B>()
            .map(DocumentStore::new)
    }

    /// Recovers the concrete backend type, if the backend is a `B`.
    pub fn into_static<B: StoreBackend + 'static>(self) -> Option<DocumentStore<B>> {
        crate::backend::DynStoreBackend::into_any(self.backend)
            .downcast::<B>()
            .ok()
            .map(|backend| DocumentStore::new(*backend))
    }
}

/// Validates and flattens a snapshot of `doc`. Kept synchronous so no lock or borrow of the
/// document outlives it.
fn prepare(doc: &Document) -> DocumentStoreResult<(Option<Uuid>, bson::Document, Vec<(String, Value)>)> {
    let (id, fields): (Option<Uuid>, HashMap<String, Value>) = doc.snapshot();
    let validated = validate_document(doc.schema(), &fields)?;
    let record = resolve::flatten(&validated)?;

    let defaults = validated
        .into_iter()
        .filter(|field| field.defaulted)
        .map(|field| (field.descriptor.name().to_string(), field.value))
        .collect();

    Ok((id, record, defaults))
}
