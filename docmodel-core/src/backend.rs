//! Storage adapter abstraction.
//!
//! A backend stores flat records: `bson::Document`s whose reference fields already hold
//! identifiers. It knows nothing about schemas, validation or references; those live in
//! [`DocumentStore`](crate::store::DocumentStore).
//!
//! Every record has an identifier assigned by the backend on first write. Backends keep it in
//! the [`ID_FIELD`](crate::query::ID_FIELD) field as its string form, so queries can filter on
//! it like any other field.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the adapter interface, implemented by each backend crate
//! - [`DynStoreBackend`]: an object-safe mirror, so a backend can be picked at runtime
//! - [`StoreBackendBuilder`]: asynchronous construction of a backend
//!
//! # Example
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = InMemoryStore::new();
//! let id = backend.insert_or_update("users", None, doc! { "name": "Alice" }).await?;
//! let record = backend.find_by_id("users", id).await?;
//! ```

use async_trait::async_trait;
use bson::Uuid;
use std::{any::Any, fmt::Debug};

use crate::{error::DocumentStoreResult, query::Query};

/// A record as returned by a backend, together with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Uuid,
    pub record: bson::Document,
}

/// Interface every storage backend implements.
///
/// Implementations must be safe to share between tasks. A single call to
/// [`insert_or_update`](StoreBackend::insert_or_update) is the unit of atomicity; nothing
/// spans more than one record.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Writes a record, returning its identifier.
    ///
    /// With `id` set, the record stored under that identifier is replaced (or created if it
    /// does not exist). Without one, a fresh identifier is generated.
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: bson::Document,
    ) -> DocumentStoreResult<Uuid>;

    /// Fetches one record by identifier.
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> DocumentStoreResult<Option<bson::Document>>;

    /// Returns every record of `collection` matching `query`.
    ///
    /// Without a sort, records come back in the backend's natural order. An unknown
    /// collection yields no records.
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>>;

    /// Returns the first record matching `query`.
    async fn find_one(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Option<StoredRecord>> {
        let query = Query {
            limit: Some(1),
            ..query
        };

        Ok(Self::find(self, collection, query)
            .await?
            .into_iter()
            .next())
    }

    /// Counts records matching `query`, ignoring its limit and offset.
    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        Ok(Self::find(self, collection, query.unbounded())
            .await?
            .len() as u64)
    }

    /// Removes a collection and all of its records. Dropping an unknown collection succeeds.
    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()>;

    /// Removes every collection.
    async fn drop_database(&self) -> DocumentStoreResult<()>;

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Releases any resources held by the backend.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: bson::Document,
    ) -> DocumentStoreResult<Uuid> {
        StoreBackend::insert_or_update(*self, collection, id, record).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        StoreBackend::find_by_id(*self, collection, id).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>> {
        StoreBackend::find(*self, collection, query).await
    }

    async fn find_one(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Option<StoredRecord>> {
        StoreBackend::find_one(*self, collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        StoreBackend::count(*self, collection, query).await
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(*self, collection).await
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(*self).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(*self).await
    }
}

/// Object-safe counterpart of [`StoreBackend`], implemented for every backend.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: bson::Document,
    ) -> DocumentStoreResult<Uuid>;
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> DocumentStoreResult<Option<bson::Document>>;
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>>;
    async fn find_one(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Option<StoredRecord>>;
    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;
    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()>;
    async fn drop_database(&self) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: bson::Document,
    ) -> DocumentStoreResult<Uuid> {
        StoreBackend::insert_or_update(self, collection, id, record).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        StoreBackend::find_by_id(self, collection, id).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>> {
        StoreBackend::find(self, collection, query).await
    }

    async fn find_one(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Option<StoredRecord>> {
        StoreBackend::find_one(self, collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        StoreBackend::count(self, collection, query).await
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, collection).await
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(self).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Lets a boxed backend chosen at runtime drive a [`DocumentStore`](crate::store::DocumentStore).
#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: bson::Document,
    ) -> DocumentStoreResult<Uuid> {
        DynStoreBackend::insert_or_update(&**self, collection, id, record).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        DynStoreBackend::find_by_id(&**self, collection, id).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>> {
        DynStoreBackend::find(&**self, collection, query).await
    }

    async fn find_one(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Option<StoredRecord>> {
        DynStoreBackend::find_one(&**self, collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        DynStoreBackend::count(&**self, collection, query).await
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        DynStoreBackend::drop_collection(&**self, collection).await
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        DynStoreBackend::drop_database(&**self).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        DynStoreBackend::list_collections(&**self).await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        DynStoreBackend::shutdown_boxed(self).await
    }
}

/// Asynchronous construction of a backend.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
