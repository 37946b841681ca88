use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, trace};

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredRecord},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{ID_FIELD, Query, SortDirection},
};

use crate::query::MongoQueryTranslator;

fn backend_error(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

/// Storage backend persisting records in a MongoDB database.
///
/// Each record is one MongoDB document whose `_id` is the string form of its identifier.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// A builder connecting to `dsn` and using `database`.
    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(name)
    }

    fn to_stored(mut record: Document) -> DocumentStoreResult<StoredRecord> {
        let id = match record.remove(ID_FIELD) {
            Some(Bson::String(id)) => Uuid::parse_str(&id)
                .map_err(|err| DocumentStoreError::Backend(format!("Invalid record id {id}: {err}")))?,
            Some(other) => {
                return Err(DocumentStoreError::Backend(format!(
                    "Unsupported record id {other}"
                )));
            }
            None => return Err(DocumentStoreError::Backend("Record is missing its id".to_string())),
        };

        Ok(StoredRecord { id, record })
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_or_update(
        &self,
        collection: &str,
        id: Option<Uuid>,
        record: Document,
    ) -> DocumentStoreResult<Uuid> {
        let id = id.unwrap_or_else(Uuid::new);
        let key = id.to_string();

        let mut replacement = doc! { ID_FIELD: key.clone() };
        for (field, value) in record {
            if field != ID_FIELD {
                replacement.insert(field, value);
            }
        }

        self.collection(collection)
            .replace_one(doc! { ID_FIELD: key }, replacement)
            .upsert(true)
            .await
            .map_err(backend_error)?;

        trace!(collection, %id, "Wrote record");

        Ok(id)
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> DocumentStoreResult<Option<Document>> {
        self.collection(collection)
            .find_one(doc! { ID_FIELD: id.to_string() })
            .await
            .map_err(backend_error)
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<StoredRecord>> {
        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;

        let mut options = FindOptions::default();
        options.limit = query.limit.map(|limit| limit as i64);
        options.skip = query.offset.map(|offset| offset as u64);
        options.sort = query.sort.as_ref().map(|sort| {
            let mut order = Document::new();
            order.insert(
                sort.field.clone(),
                match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                },
            );
            order
        });

        trace!(collection, %filter, "Running query");

        self.collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(Self::to_stored)
            .collect()
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;

        self.collection(collection)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.collection(collection)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)?;
        names.sort();

        Ok(names)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        debug!(database = %self.database, "Shutting down MongoDB client");
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`].
///
/// The database is either given explicitly or taken from the path of the connection string
/// (`mongodb://host/<database>`).
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: Some(database.to_string()),
        }
    }

    /// Takes the database name from the connection string.
    pub fn from_url(url: &str) -> Self {
        Self {
            dsn: url.to_string(),
            database: None,
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|err| DocumentStoreError::Initialization(err.to_string()))?;

        let database = self
            .database
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| {
                DocumentStoreError::Initialization(
                    "Connection string does not name a database".to_string(),
                )
            })?;

        let client = Client::with_options(options)
            .map_err(|err| DocumentStoreError::Initialization(err.to_string()))?;

        debug!(%database, "Connected to MongoDB");

        Ok(MongoDbStore::new(client, database))
    }
}
