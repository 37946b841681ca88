//! Opening a store from a connection URL.

use tracing::info;

use docmodel_core::{
    backend::StoreBackendBuilder,
    error::{DocumentStoreError, DocumentStoreResult},
    store::{DocumentStore, DynDocumentStore},
};
use docmodel_memory::InMemoryStore;

/// Opens a store for `url`, picking the backend from its scheme.
///
/// - `memory://` opens a fresh in-memory store; the rest of the URL is ignored
/// - `mongodb://` and `mongodb+srv://` connect to MongoDB, using the database named in the
///   URL path (requires the `mongodb` feature)
///
/// # Errors
///
/// Returns [`DocumentStoreError::Initialization`] for an unsupported scheme or a failed
/// connection.
pub async fn connect(url: &str) -> DocumentStoreResult<DynDocumentStore> {
    let Some((scheme, _)) = url.split_once("://") else {
        return Err(DocumentStoreError::Initialization(format!(
            "Invalid connection URL: {url}"
        )));
    };

    info!(scheme, "Opening document store");

    match scheme {
        "memory" => Ok(DocumentStore::new(InMemoryStore::builder().build().await?).into_dyn()),
        #[cfg(feature = "mongodb")]
        "mongodb" | "mongodb+srv" => {
            let backend = docmodel_mongodb::MongoDbStoreBuilder::from_url(url)
                .build()
                .await?;

            Ok(DocumentStore::new(backend).into_dyn())
        }
        other => Err(DocumentStoreError::Initialization(format!(
            "Unsupported connection scheme: {other}"
        ))),
    }
}
