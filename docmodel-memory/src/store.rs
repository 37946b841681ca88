//! In-memory storage implementation.
//!
//! Records live in per-collection vectors behind an async-aware read-write lock. Each record
//! carries its identifier in the `_id` field, and insertion order is kept as the natural
//! order of a collection.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Uuid};
use mea::rwlock::RwLock;
use tracing::trace;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredRecord},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{ID_FIELD, Query, SortDirection},
};

use crate::evaluator::{RecordEvaluator, compare_field};

type Collection = Vec<bson::Document>;
type StoreMap = HashMap<String, Collection>;

/// Thread-safe in-memory storage backend.
///
/// Cloning an `InMemoryStore` yields a handle to the same data. Queries scan the whole
/// collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_or_update("users", None, doc! { "name": "Alice" }).await?;
/// assert!(store.find_by_id("users", id).await?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn key(id: Uuid) -> Bson {
    Bson::String(id.to_string())
}

fn position(collection: &Collection, id: Uuid) -> Option<usize> {
    let key = key(id);
    collection
        .iter()
        .position(|record| record.get(ID_FIELD) == Some(&key))
}

fn to_stored(mut record: bson::Document) -> DocumentStoreResult<StoredRecord> {
    let id = match record.remove(ID_FIELD) {
        Some(Bson::String(id)) => Uuid::parse_str(&id)
            .map_err(|err| DocumentStoreError::Backend(format!("Corrupt record id {id}: {err}")))?,
        _ => return Err(DocumentStoreError::Backend("Record is missing its id".to_string())),
    };

    Ok(StoredRecord { id, record })
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: bson::Document,
    ) -> DocumentStoreResult<Uuid> {
        let id = id.unwrap_or_else(Uuid::new);

        let mut stored = bson::Document::new();
        stored.insert(ID_FIELD, key(id));
        for (field, value) in record {
            if field != ID_FIELD {
                stored.insert(field, value);
            }
        }

        let mut store = self.store.write().await;
        let records = store
            .entry(collection.to_string())
            .or_default();

        match position(records, id) {
            Some(index) => records[index] = stored,
            None => records.push(stored),
        }

        trace!(collection, %id, "Wrote record");

        Ok(id)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|records| position(records, id).map(|index| records[index].clone())))
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>> {
        let store = self.store.read().await;
        let Some(records) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for record in records {
            let keep = match &query.filter {
                Some(filter) => RecordEvaluator::matches(record, filter)?,
                None => true,
            };
            if keep {
                matched.push(record);
            }
        }

        if let Some(sort) = &query.sort {
            // Stable, so ties keep insertion order.
            matched.sort_by(|a, b| match sort.direction {
                SortDirection::Asc => compare_field(a, b, &sort.field),
                SortDirection::Desc => compare_field(b, a, &sort.field),
            });
        }

        matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|record| to_stored(record.clone()))
            .collect()
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(collection);

        Ok(())
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        self.store.write().await.clear();

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }
}

/// Builder for [`InMemoryStore`]. Optionally seeds the store with existing records.
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, bson::Document)>,
}

impl InMemoryStoreBuilder {
    /// Adds a record to `collection`. Records without an `_id` get a fresh identifier.
    pub fn with_record(mut self, collection: impl Into<String>, record: bson::Document) -> Self {
        self.seed.push((collection.into(), record));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (collection, record) in self.seed {
            let id = match record.get(ID_FIELD) {
                Some(Bson::String(id)) => Some(Uuid::parse_str(id).map_err(|err| {
                    DocumentStoreError::Initialization(format!("Invalid seed id {id}: {err}"))
                })?),
                Some(other) => {
                    return Err(DocumentStoreError::Initialization(format!(
                        "Seed id must be a string, got {other}"
                    )));
                }
                None => None,
            };

            store
                .insert_or_update(&collection, id, record)
                .await?;
        }

        Ok(store)
    }
}
