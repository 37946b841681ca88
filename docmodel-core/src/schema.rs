//! Field declarations and the schema compiler.
//!
//! Declarations are written in a shorthand that mirrors how a field would be described in
//! prose: a bare type marker, a single-element array for "sequence of T", or a full
//! [`FieldOptions`] block carrying constraints. [`compile`] normalizes all of them into
//! [`FieldDescriptor`]s; [`compiled`] does the same for a [`Model`] and caches the result.
//!
//! Both declaration styles produce the same [`Declaration`]:
//!
//! ```ignore
//! // field by field
//! schema
//!     .field("str", TypeMarker::String)
//!     .field("tags", FieldDecl::array_of(TypeMarker::String));
//!
//! // all at once
//! schema.schema([
//!     ("str", FieldDecl::from(TypeMarker::String)),
//!     ("tags", FieldDecl::array_of(TypeMarker::String)),
//! ]);
//! ```

use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use serde::Deserialize;
use tracing::debug;

use crate::{
    descriptor::{DefaultValue, FieldDescriptor, FieldType, SchemaDescriptor},
    error::{DocumentStoreResult, SchemaError},
    model::{Model, ModelRef},
    validate,
    value::Value,
};

/// A bare type marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeMarker {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Buffer,
    Array,
    /// Another document type; compiles to a reference.
    Model(ModelRef),
}

impl TypeMarker {
    pub fn model<M: Model>() -> Self {
        TypeMarker::Model(ModelRef::of::<M>())
    }

    /// Starts an options block with this marker as its type.
    pub fn options(self) -> FieldOptions {
        FieldOptions::new(self)
    }

    fn field_type(self) -> FieldType {
        match self {
            TypeMarker::String => FieldType::String,
            TypeMarker::Number => FieldType::Number,
            TypeMarker::Boolean => FieldType::Boolean,
            TypeMarker::Date => FieldType::Date,
            TypeMarker::Object => FieldType::Object,
            TypeMarker::Buffer => FieldType::Buffer,
            TypeMarker::Array => FieldType::Array,
            TypeMarker::Model(model) => FieldType::Reference(model),
        }
    }
}

/// One field's declaration, before compilation.
#[derive(Debug, Clone)]
pub enum FieldDecl {
    Type(TypeMarker),
    /// `[T]` declares a typed array; `[]` an untyped one.
    Array(Vec<FieldDecl>),
    Options(FieldOptions),
}

impl FieldDecl {
    /// `[T]`
    pub fn array_of(element: impl Into<FieldDecl>) -> Self {
        FieldDecl::Array(vec![element.into()])
    }
}

impl From<TypeMarker> for FieldDecl {
    fn from(marker: TypeMarker) -> Self {
        FieldDecl::Type(marker)
    }
}

impl From<ModelRef> for FieldDecl {
    fn from(model: ModelRef) -> Self {
        FieldDecl::Type(TypeMarker::Model(model))
    }
}

impl From<FieldOptions> for FieldDecl {
    fn from(options: FieldOptions) -> Self {
        FieldDecl::Options(options)
    }
}

/// The `{ type, required, default, choices, min, max }` form of a declaration.
#[derive(Debug, Clone)]
pub struct FieldOptions {
    field_type: Box<FieldDecl>,
    required: bool,
    default: Option<DefaultValue>,
    choices: Option<Vec<Value>>,
    min: Option<f64>,
    max: Option<f64>,
}

impl FieldOptions {
    pub fn new(field_type: impl Into<FieldDecl>) -> Self {
        Self {
            field_type: Box::new(field_type.into()),
            required: false,
            default: None,
            choices: None,
            min: None,
            max: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Uses `value` when the field is unset at save time.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Calls `producer` at save time when the field is unset.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// The declared fields of a document type, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    fields: Vec<(String, FieldDecl)>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a single field. Declaring the same name again replaces it at compile time.
    pub fn field(&mut self, name: impl Into<String>, decl: impl Into<FieldDecl>) -> &mut Self {
        self.fields.push((name.into(), decl.into()));
        self
    }

    /// Declares several fields at once.
    pub fn schema<I, K, D>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<FieldDecl>,
    {
        for (name, decl) in fields {
            self.field(name, decl);
        }
        self
    }

    /// Parses a JSON declaration object.
    ///
    /// Type markers are written as strings (`"String"`, `"Number"`, ...). Any other string
    /// must name one of `models`, either by collection or by type name. Arrays and option
    /// objects follow the same shapes as [`FieldDecl`].
    ///
    /// ```ignore
    /// let declaration = Declaration::from_json(
    ///     &json!({
    ///         "name": "String",
    ///         "tags": ["String"],
    ///         "age": { "type": "Number", "min": 0, "required": true },
    ///         "boss": "boss",
    ///     }),
    ///     &[Boss::reference()],
    /// )?;
    /// ```
    pub fn from_json(
        value: &serde_json::Value,
        models: &[ModelRef],
    ) -> Result<Self, SchemaError> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaError::new("", "declaration must be a JSON object"))?;

        let mut declaration = Declaration::new();
        for (name, decl) in object {
            declaration.field(name.clone(), parse_json_decl(name, decl, models)?);
        }

        Ok(declaration)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDecl)> {
        self.fields
            .iter()
            .map(|(name, decl)| (name.as_str(), decl))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonFieldOptions {
    #[serde(rename = "type")]
    field_type: serde_json::Value,
    #[serde(default)]
    required: bool,
    default: Option<serde_json::Value>,
    choices: Option<Vec<serde_json::Value>>,
    min: Option<f64>,
    max: Option<f64>,
}

fn parse_json_decl(
    name: &str,
    value: &serde_json::Value,
    models: &[ModelRef],
) -> Result<FieldDecl, SchemaError> {
    match value {
        serde_json::Value::String(marker) => Ok(FieldDecl::Type(parse_marker(name, marker, models)?)),
        serde_json::Value::Array(items) => Ok(FieldDecl::Array(
            items
                .iter()
                .map(|item| parse_json_decl(name, item, models))
                .collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(_) => {
            let raw = JsonFieldOptions::deserialize(value)
                .map_err(|err| SchemaError::new(name, err.to_string()))?;
            let literal = |json: &serde_json::Value| {
                Value::from_json(json).map_err(|err| SchemaError::new(name, err.to_string()))
            };

            let mut options = FieldOptions::new(parse_json_decl(name, &raw.field_type, models)?);
            options.required = raw.required;
            options.min = raw.min;
            options.max = raw.max;
            if let Some(default) = &raw.default {
                options.default = Some(DefaultValue::Literal(literal(default)?));
            }
            if let Some(choices) = &raw.choices {
                options.choices = Some(choices.iter().map(literal).collect::<Result<_, _>>()?);
            }

            Ok(FieldDecl::Options(options))
        }
        other => Err(SchemaError::new(name, format!("unrecognized type marker {other}"))),
    }
}

fn parse_marker(name: &str, marker: &str, models: &[ModelRef]) -> Result<TypeMarker, SchemaError> {
    Ok(match marker {
        "String" => TypeMarker::String,
        "Number" => TypeMarker::Number,
        "Boolean" => TypeMarker::Boolean,
        "Date" => TypeMarker::Date,
        "Object" => TypeMarker::Object,
        "Buffer" => TypeMarker::Buffer,
        "Array" => TypeMarker::Array,
        other => models
            .iter()
            .find(|model| model.collection() == other || model.name() == other)
            .copied()
            .map(TypeMarker::Model)
            .ok_or_else(|| SchemaError::new(name, format!("unrecognized type marker `{other}`")))?,
    })
}

/// Compiles a declaration into a schema bound to `collection`.
///
/// Pure: compiling the same declaration twice yields equal descriptors.
pub fn compile(
    collection: &str,
    model: Option<TypeId>,
    declaration: &Declaration,
) -> Result<SchemaDescriptor, SchemaError> {
    let mut fields: Vec<FieldDescriptor> = Vec::new();

    for (name, decl) in declaration.iter() {
        let descriptor = compile_field(name, decl)?;

        match fields.iter_mut().find(|field| field.name == name) {
            Some(existing) => *existing = descriptor,
            None => fields.push(descriptor),
        }
    }

    Ok(SchemaDescriptor::new(collection, model, fields))
}

fn compile_field(name: &str, decl: &FieldDecl) -> Result<FieldDescriptor, SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::new(name, "field name must not be empty"));
    }
    if name == "_id" {
        return Err(SchemaError::new(name, "`_id` is reserved for the document identifier"));
    }

    let FieldDecl::Options(options) = decl else {
        return Ok(FieldDescriptor::new(name, compile_type(name, decl)?));
    };

    let field_type = compile_type(name, &options.field_type)?;

    if let Some(choices) = &options.choices {
        if !field_type.is_scalar() {
            return Err(SchemaError::new(
                name,
                format!("choices are not allowed on {field_type} fields"),
            ));
        }
        if let Some(choice) = choices
            .iter()
            .find(|choice| !validate::matches_type(&field_type, choice))
        {
            return Err(SchemaError::new(
                name,
                format!("choice of kind {} does not match {field_type}", choice.kind()),
            ));
        }
    }

    if options.min.is_some() || options.max.is_some() {
        if field_type != FieldType::Number {
            return Err(SchemaError::new(
                name,
                format!("min/max are only allowed on Number fields, not {field_type}"),
            ));
        }
        if options.min.is_some_and(f64::is_nan) || options.max.is_some_and(f64::is_nan) {
            return Err(SchemaError::new(name, "min/max must be numbers"));
        }
        if let (Some(min), Some(max)) = (options.min, options.max) {
            if min > max {
                return Err(SchemaError::new(name, format!("min {min} is greater than max {max}")));
            }
        }
    }

    Ok(FieldDescriptor {
        name: name.to_string(),
        field_type,
        required: options.required,
        default: options.default.clone(),
        choices: options.choices.clone(),
        min: options.min,
        max: options.max,
    })
}

fn compile_type(name: &str, decl: &FieldDecl) -> Result<FieldType, SchemaError> {
    match decl {
        FieldDecl::Type(marker) => Ok(marker.field_type()),
        FieldDecl::Array(elements) => match elements.as_slice() {
            [] => Ok(FieldType::Array),
            [element] => Ok(FieldType::TypedArray(Box::new(compile_type(name, element)?))),
            many => Err(SchemaError::new(
                name,
                format!("array declarations take a single element type, got {}", many.len()),
            )),
        },
        FieldDecl::Options(_) => Err(SchemaError::new(
            name,
            "an options block cannot be used as a type marker",
        )),
    }
}

static COMPILED: LazyLock<RwLock<HashMap<TypeId, Arc<SchemaDescriptor>>>> =
    LazyLock::new(Default::default);

/// Returns the cached schema of `M`, compiling it on first use.
pub fn compiled<M: Model>() -> DocumentStoreResult<Arc<SchemaDescriptor>> {
    let key = TypeId::of::<M>();

    if let Some(schema) = COMPILED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(schema.clone());
    }

    let mut declaration = Declaration::new();
    M::declare(&mut declaration);
    let schema = Arc::new(compile(M::collection_name(), Some(key), &declaration)?);

    debug!(
        collection = M::collection_name(),
        fields = schema.len(),
        "compiled document schema"
    );

    Ok(COMPILED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(schema)
        .clone())
}
