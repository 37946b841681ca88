//! Live document instances.
//!
//! A [`Document`] is a cheap-to-clone handle to one mutable instance of a document type.
//! Clones share the same instance, so a document can be referenced from several places (or
//! from itself, through a cycle) without any of them owning it exclusively. Use
//! [`Document::downgrade`] for back-references that should not keep their target alive.
//!
//! Field assignment is unchecked; validation is deferred to save time.

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
};

use bson::Uuid;

use crate::{
    backend::StoreBackend,
    descriptor::SchemaDescriptor,
    error::{DocumentStoreResult, ValidationError},
    model::Model,
    query::ID_FIELD,
    store::DocumentStore,
    value::Value,
};

struct DocumentInner {
    schema: Arc<SchemaDescriptor>,
    state: RwLock<DocumentState>,
}

#[derive(Default)]
struct DocumentState {
    id: Option<Uuid>,
    fields: HashMap<String, Value>,
}

/// A live instance of a document type.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    /// Creates an unsaved instance with every field unset.
    pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
        Self::from_parts(schema, None, HashMap::new())
    }

    pub(crate) fn from_parts(
        schema: Arc<SchemaDescriptor>,
        id: Option<Uuid>,
        fields: HashMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                schema,
                state: RwLock::new(DocumentState { id, fields }),
            }),
        }
    }

    /// Builds an instance from a stored record without resolving any reference.
    pub(crate) fn hydrate(schema: Arc<SchemaDescriptor>, id: Uuid, record: &bson::Document) -> Self {
        let fields = record
            .iter()
            .filter(|(key, _)| key.as_str() != ID_FIELD)
            .map(|(key, value)| (key.clone(), Value::from_bson(value)))
            .collect();

        Self::from_parts(schema, Some(id), fields)
    }

    fn read(&self) -> RwLockReadGuard<'_, DocumentState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DocumentState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.inner.schema
    }

    pub fn collection_name(&self) -> &str {
        self.inner.schema.collection()
    }

    /// The identifier assigned by the backend, once saved or loaded.
    pub fn id(&self) -> Option<Uuid> {
        self.read().id
    }

    pub fn is_saved(&self) -> bool {
        self.id().is_some()
    }

    /// True if this instance was created from `M`'s schema.
    pub fn is<M: Model>(&self) -> bool {
        self.inner.schema.model() == Some(TypeId::of::<M>())
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().fields.get(field).cloned()
    }

    /// Assigns a field. Nothing is checked until the document is saved, and fields the
    /// schema does not declare are kept in memory but never written.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.write()
            .fields
            .insert(field.into(), value.into());
    }

    pub fn unset(&self, field: &str) -> Option<Value> {
        self.write().fields.remove(field)
    }

    /// Appends to an array field, starting a new array if the field is unset.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the field currently holds something other than an array.
    pub fn push(&self, field: &str, value: impl Into<Value>) -> DocumentStoreResult<()> {
        let value = value.into();
        let mut state = self.write();
        let slot = state
            .fields
            .entry(field.to_string())
            .or_insert(Value::Null);

        match slot {
            Value::Array(items) => items.push(value),
            Value::Null => *slot = Value::Array(vec![value]),
            _ => return Err(ValidationError::type_mismatch(field, "Array").into()),
        }

        Ok(())
    }

    /// Names of the fields currently assigned.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = self
            .read()
            .fields
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Validates, flattens and writes this document. See [`DocumentStore::save`].
    pub async fn save<B: StoreBackend>(&self, store: &DocumentStore<B>) -> DocumentStoreResult<Document> {
        store.save(self).await
    }

    pub(crate) fn snapshot(&self) -> (Option<Uuid>, HashMap<String, Value>) {
        let state = self.read();
        (state.id, state.fields.clone())
    }

    /// Records a successful write: assigns the id and fills in materialized defaults for
    /// fields that are still unset.
    pub(crate) fn mark_saved(&self, id: Uuid, defaults: Vec<(String, Value)>) {
        let mut state = self.write();
        state.id = Some(id);

        for (field, value) in defaults {
            let slot = state.fields.entry(field).or_insert(Value::Null);
            if slot.is_null() {
                *slot = value;
            }
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Document {
    // Field values are left out: they may lead back to this document.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("collection", &self.collection_name())
            .field("id", &self.id())
            .field("fields", &self.field_names())
            .finish()
    }
}

/// A reference to a document that does not keep it alive.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocumentInner>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner
            .upgrade()
            .map(|inner| Document { inner })
    }
}

impl PartialEq for WeakDocument {
    fn eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl fmt::Debug for WeakDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(doc) => f
                .debug_struct("WeakDocument")
                .field("collection", &doc.collection_name())
                .field("id", &doc.id())
                .finish(),
            None => f.write_str("WeakDocument(dropped)"),
        }
    }
}
