//! Conversion between live documents and flat records.
//!
//! On save, [`flatten`] replaces every referenced document by its identifier. On load,
//! [`populate`] does the reverse for one level: each stored identifier is fetched from the
//! referenced type's collection and hydrated into a live [`Document`] whose own reference fields
//! keep their identifiers. Stopping after one level is what keeps cyclic graphs finite.

use std::collections::HashMap;

use bson::{Bson, Uuid};
use futures::future::try_join_all;
use tracing::{trace, warn};

use crate::{
    backend::StoreBackend,
    descriptor::{FieldType, SchemaDescriptor},
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult, ValidationError, ValidationErrorKind},
    model::ModelRef,
    query::ID_FIELD,
    validate::ValidatedField,
    value::Value,
};

/// Which reference fields a load resolves into live documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Populate {
    /// Every reference and array-of-reference field.
    #[default]
    All,
    /// None; reference fields keep their stored identifiers.
    None,
    /// Only the named fields.
    Fields(Vec<String>),
}

impl Populate {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Populate::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, field: &str) -> bool {
        match self {
            Populate::All => true,
            Populate::None => false,
            Populate::Fields(fields) => fields.iter().any(|name| name == field),
        }
    }
}

/// Options accepted by the loading operations of [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub populate: Populate,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate = populate;
        self
    }
}

/// Builds the flat record written for a set of validated fields.
///
/// # Errors
///
/// Fails with [`DocumentStoreError::UnsavedReference`] if a reference field holds a document
/// that has no identifier yet.
pub(crate) fn flatten(fields: &[ValidatedField<'_>]) -> DocumentStoreResult<bson::Document> {
    let mut record = bson::Document::new();

    for field in fields {
        let name = field.descriptor.name();
        let value = flatten_value(name, field.descriptor.field_type(), &field.value)?;
        record.insert(name, value);
    }

    Ok(record)
}

fn flatten_value(field: &str, field_type: &FieldType, value: &Value) -> DocumentStoreResult<Bson> {
    match (field_type, value) {
        (FieldType::Reference(_), _) => reference_id(field, value),
        (FieldType::TypedArray(element), Value::Array(items)) => Ok(Bson::Array(
            items
                .iter()
                .map(|item| flatten_value(field, element, item))
                .collect::<DocumentStoreResult<_>>()?,
        )),
        _ => value
            .to_bson()
            .ok_or_else(|| ValidationError::type_mismatch(field, field_type).into()),
    }
}

fn reference_id(field: &str, value: &Value) -> DocumentStoreResult<Bson> {
    let target = match value {
        Value::String(id) => return Ok(Bson::String(id.clone())),
        Value::Document(doc) => doc.clone(),
        Value::WeakDocument(weak) => weak.upgrade().ok_or_else(|| {
            DocumentStoreError::from(ValidationError::new(
                field,
                ValidationErrorKind::DroppedReference,
            ))
        })?,
        other => return Err(ValidationError::type_mismatch(field, other.kind()).into()),
    };

    target
        .id()
        .map(|id| Bson::String(id.to_string()))
        .ok_or_else(|| DocumentStoreError::UnsavedReference {
            field: field.to_string(),
        })
}

/// Hydrates a stored record into field values, resolving the reference fields selected by
/// `populate` one level deep.
///
/// # Errors
///
/// Fails with [`DocumentStoreError::ReferenceNotFound`] if a stored identifier does not
/// resolve to a record of the referenced type.
pub(crate) async fn populate<B: StoreBackend>(
    backend: &B,
    schema: &SchemaDescriptor,
    record: &bson::Document,
    populate: &Populate,
) -> DocumentStoreResult<HashMap<String, Value>> {
    let mut fields = HashMap::with_capacity(record.len());

    for (name, stored) in record {
        if name == ID_FIELD {
            continue;
        }

        let field_type = schema
            .field(name)
            .filter(|_| populate.includes(name))
            .map(|descriptor| descriptor.field_type());

        let value = match (field_type, stored) {
            (Some(FieldType::Reference(model)), Bson::String(id)) => {
                Value::Document(fetch(backend, model, id).await?)
            }
            (Some(FieldType::TypedArray(element)), Bson::Array(items)) => match element.reference() {
                Some(model) => Value::Array(
                    try_join_all(items.iter().map(|item| fetch_element(backend, model, item))).await?,
                ),
                None => Value::from_bson(stored),
            },
            _ => Value::from_bson(stored),
        };

        fields.insert(name.clone(), value);
    }

    Ok(fields)
}

async fn fetch_element<B: StoreBackend>(
    backend: &B,
    model: &ModelRef,
    item: &Bson,
) -> DocumentStoreResult<Value> {
    match item {
        Bson::String(id) => Ok(Value::Document(fetch(backend, model, id).await?)),
        other => Ok(Value::from_bson(other)),
    }
}

/// Loads one referenced record and hydrates it without resolving its own references.
async fn fetch<B: StoreBackend>(backend: &B, model: &ModelRef, id: &str) -> DocumentStoreResult<Document> {
    let schema = model.schema()?;
    let not_found = || DocumentStoreError::ReferenceNotFound {
        collection: schema.collection().to_string(),
        id: id.to_string(),
    };

    trace!(collection = schema.collection(), id, "Resolving reference");

    let Ok(uuid) = Uuid::parse_str(id) else {
        warn!(collection = schema.collection(), id, "Stored reference is not a valid identifier");
        return Err(not_found());
    };

    let Some(record) = backend
        .find_by_id(schema.collection(), uuid)
        .await?
    else {
        warn!(collection = schema.collection(), id, "Referenced document not found");
        return Err(not_found());
    };

    Ok(Document::hydrate(schema.clone(), uuid, &record))
}
