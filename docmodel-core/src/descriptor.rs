//! Compiled, immutable schema descriptors.
//!
//! A [`SchemaDescriptor`] is produced once per document type by the schema compiler
//! ([`crate::schema`]) and shared read-only by every instance of that type.

use std::{any::TypeId, fmt, sync::Arc};

use crate::{model::ModelRef, value::Value};

/// The declared type of a field. Closed set; the validator dispatches on this tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Buffer,
    /// An ordered sequence of arbitrary plain values.
    Array,
    /// A reference to another document type.
    Reference(ModelRef),
    /// An ordered sequence whose every element has the given type.
    TypedArray(Box<FieldType>),
}

impl FieldType {
    /// Scalar types are the ones `choices` may be attached to.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Number
                | FieldType::Boolean
                | FieldType::Date
                | FieldType::Object
                | FieldType::Buffer
        )
    }

    /// The referenced document type of a direct reference field.
    pub fn reference(&self) -> Option<&ModelRef> {
        match self {
            FieldType::Reference(model) => Some(model),
            _ => None,
        }
    }

    /// The referenced document type of an array-of-reference field.
    pub fn reference_array(&self) -> Option<&ModelRef> {
        match self {
            FieldType::TypedArray(element) => element.reference(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Number => write!(f, "Number"),
            FieldType::Boolean => write!(f, "Boolean"),
            FieldType::Date => write!(f, "Date"),
            FieldType::Object => write!(f, "Object"),
            FieldType::Buffer => write!(f, "Buffer"),
            FieldType::Array => write!(f, "Array"),
            FieldType::Reference(model) => write!(f, "{}", model.name()),
            FieldType::TypedArray(element) => write!(f, "[{element}]"),
        }
    }
}

/// Value used when a field is unset at save time.
#[derive(Clone)]
pub enum DefaultValue {
    /// Used as-is.
    Literal(Value),
    /// Invoked on every save that finds the field unset.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn materialize(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Producer(producer) => producer(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Literal(a), DefaultValue::Literal(b)) => a == b,
            (DefaultValue::Producer(a), DefaultValue::Producer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Canonical description of one declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) required: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) choices: Option<Vec<Value>>,
    pub(crate) min: Option<f64>,
    pub(crate) max: Option<f64>,
}

impl FieldDescriptor {
    /// A descriptor with the given type and no constraints.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            choices: None,
            min: None,
            max: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

/// The compiled schema of one document type.
///
/// Fields keep their declaration order, which is also the order validation runs in.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    collection: String,
    model: Option<TypeId>,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub(crate) fn new(
        collection: impl Into<String>,
        model: Option<TypeId>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            collection: collection.into(),
            model,
            fields,
        }
    }

    /// Name of the collection records of this type are stored in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Type id of the declaring [`Model`](crate::model::Model), if compiled from one.
    pub fn model(&self) -> Option<TypeId> {
        self.model
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
