//! Runtime field values.
//!
//! A [`Value`] is what a live [`Document`] holds in each field. Data variants mirror the
//! primitive kinds a schema can declare; the two document variants hold live references to
//! other instances and only ever exist in memory. Before a record reaches a backend, live
//! references are flattened to identifier strings (see [`crate::resolve`]).

use bson::{
    Binary, Bson, DateTime, ser::serialize_to_bson, spec::BinarySubtype,
};

use crate::{
    document::{Document, WeakDocument},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicitly empty. Treated the same as an unset field during validation.
    Null,
    String(String),
    /// All numbers are stored as doubles.
    Number(f64),
    Boolean(bool),
    /// A point in time with millisecond precision.
    Date(DateTime),
    /// A free-form embedded structure.
    Object(bson::Document),
    /// Raw bytes.
    Buffer(Vec<u8>),
    Array(Vec<Value>),
    /// A live reference to another document instance.
    Document(Document),
    /// A live reference that does not keep its target alive.
    WeakDocument(WeakDocument),
}

impl Value {
    /// Builds a buffer value from raw bytes.
    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Buffer(bytes.into())
    }

    /// Builds an array value from anything convertible into values.
    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&bson::Document> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Value::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the referenced live document, upgrading weak references that are still alive.
    pub fn as_document(&self) -> Option<Document> {
        match self {
            Value::Document(doc) => Some(doc.clone()),
            Value::WeakDocument(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// True for values that can be written to a backend without flattening.
    pub fn is_plain(&self) -> bool {
        match self {
            Value::Document(_) | Value::WeakDocument(_) => false,
            Value::Array(items) => items.iter().all(Value::is_plain),
            _ => true,
        }
    }

    /// Converts a plain value to its wire representation.
    ///
    /// Returns `None` when the value, or any nested array element, is a live document.
    pub fn to_bson(&self) -> Option<Bson> {
        Some(match self {
            Value::Null => Bson::Null,
            Value::String(s) => Bson::String(s.clone()),
            Value::Number(n) => Bson::Double(*n),
            Value::Boolean(b) => Bson::Boolean(*b),
            Value::Date(d) => Bson::DateTime(*d),
            Value::Object(o) => Bson::Document(o.clone()),
            Value::Buffer(bytes) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            }),
            Value::Array(items) => Bson::Array(
                items
                    .iter()
                    .map(Value::to_bson)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Document(_) | Value::WeakDocument(_) => return None,
        })
    }

    /// Rehydrates a stored wire value.
    ///
    /// Every numeric representation becomes a [`Value::Number`]. Object ids are kept as their
    /// hex string; wire types with no counterpart (regexes, code, timestamps, ...) become
    /// [`Value::Null`].
    pub fn from_bson(bson: &Bson) -> Self {
        match bson {
            Bson::String(s) => Value::String(s.clone()),
            Bson::Int32(n) => Value::Number(*n as f64),
            Bson::Int64(n) => Value::Number(*n as f64),
            Bson::Double(n) => Value::Number(*n),
            Bson::Boolean(b) => Value::Boolean(*b),
            Bson::DateTime(d) => Value::Date(*d),
            Bson::Document(doc) => Value::Object(doc.clone()),
            Bson::Binary(binary) => Value::Buffer(binary.bytes.clone()),
            Bson::Array(items) => Value::Array(items.iter().map(Value::from_bson).collect()),
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            _ => Value::Null,
        }
    }

    /// Converts a JSON literal, as found in JSON schema declarations.
    pub fn from_json(json: &serde_json::Value) -> DocumentStoreResult<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().ok_or_else(|| {
                DocumentStoreError::Serialization(format!("number {n} is not representable"))
            })?),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ),
            serde_json::Value::Object(map) => match serialize_to_bson(map)? {
                Bson::Document(doc) => Value::Object(doc),
                other => {
                    return Err(DocumentStoreError::Serialization(format!(
                        "expected an embedded document, got {other}"
                    )));
                }
            },
        })
    }

    /// Short name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::String(_) => "String",
            Value::Number(_) => "Number",
            Value::Boolean(_) => "Boolean",
            Value::Date(_) => "Date",
            Value::Object(_) => "Object",
            Value::Buffer(_) => "Buffer",
            Value::Array(_) => "Array",
            Value::Document(_) | Value::WeakDocument(_) => "Document",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<DateTime> for Value {
    fn from(value: DateTime) -> Self {
        Value::Date(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Value::Date(DateTime::from_chrono(value))
    }
}

impl From<bson::Document> for Value {
    fn from(value: bson::Document) -> Self {
        Value::Object(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<&Document> for Value {
    fn from(value: &Document) -> Self {
        Value::Document(value.clone())
    }
}

impl From<WeakDocument> for Value {
    fn from(value: WeakDocument) -> Self {
        Value::WeakDocument(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::array(iter)
    }
}
