//! Save-time validation of field values against their descriptors.
//!
//! Assignment is never checked; everything happens here, once per field, when a document is
//! saved. Per field the order is: default materialization, required check, type check,
//! choices, then range. A document is validated field by field in declaration order and the
//! first failure aborts.

use std::collections::HashMap;

use crate::{
    descriptor::{FieldDescriptor, FieldType, SchemaDescriptor},
    error::{ValidationError, ValidationErrorKind},
    value::Value,
};

/// Validates one field value.
///
/// Returns the value to persist, which is `None` when the field is unset, optional and has
/// no default. Materialized defaults are trusted and skip the remaining checks.
pub fn validate(
    descriptor: &FieldDescriptor,
    value: Option<Value>,
) -> Result<Option<Value>, ValidationError> {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        if let Some(default) = descriptor.default() {
            return Ok(Some(default.materialize()));
        }
        if descriptor.is_required() {
            return Err(ValidationError::new(
                descriptor.name(),
                ValidationErrorKind::RequiredMissing,
            ));
        }
        return Ok(None);
    };

    check_type(descriptor.name(), descriptor.field_type(), &value)?;

    if let Some(choices) = descriptor.choices() {
        if descriptor.field_type().is_scalar() && !choices.contains(&value) {
            return Err(ValidationError::new(
                descriptor.name(),
                ValidationErrorKind::ChoiceViolation,
            ));
        }
    }

    if let Value::Number(number) = value {
        let bounded = descriptor.min().is_some() || descriptor.max().is_some();
        let below = descriptor.min().is_some_and(|min| number < min);
        let above = descriptor.max().is_some_and(|max| number > max);

        // NaN compares false against either bound.
        if below || above || (bounded && number.is_nan()) {
            return Err(ValidationError::new(
                descriptor.name(),
                ValidationErrorKind::RangeViolation,
            ));
        }
    }

    Ok(Some(value))
}

/// True if `value` structurally matches `field_type`.
pub fn matches_type(field_type: &FieldType, value: &Value) -> bool {
    check_type("", field_type, value).is_ok()
}

fn check_type(field: &str, field_type: &FieldType, value: &Value) -> Result<(), ValidationError> {
    let matches = match (field_type, value) {
        (FieldType::String, Value::String(_))
        | (FieldType::Number, Value::Number(_))
        | (FieldType::Boolean, Value::Boolean(_))
        | (FieldType::Date, Value::Date(_))
        | (FieldType::Object, Value::Object(_))
        | (FieldType::Buffer, Value::Buffer(_)) => true,
        (FieldType::Array, Value::Array(_)) => value.is_plain(),
        (FieldType::TypedArray(element), Value::Array(items)) => {
            for item in items {
                check_type(field, element, item)?;
            }
            true
        }
        // Already flattened to an identifier.
        (FieldType::Reference(_), Value::String(_)) => true,
        (FieldType::Reference(model), Value::Document(doc)) => model.matches(doc.schema()),
        (FieldType::Reference(model), Value::WeakDocument(weak)) => match weak.upgrade() {
            Some(doc) => model.matches(doc.schema()),
            None => {
                return Err(ValidationError::new(
                    field,
                    ValidationErrorKind::DroppedReference,
                ));
            }
        },
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(ValidationError::type_mismatch(field, field_type))
    }
}

/// A field that passed validation and will be written.
#[derive(Debug)]
pub(crate) struct ValidatedField<'a> {
    pub descriptor: &'a FieldDescriptor,
    pub value: Value,
    /// Set when `value` came from the descriptor's default.
    pub defaulted: bool,
}

/// Validates every declared field of a document, stopping at the first failure.
pub(crate) fn validate_document<'a>(
    schema: &'a SchemaDescriptor,
    fields: &HashMap<String, Value>,
) -> Result<Vec<ValidatedField<'a>>, ValidationError> {
    let mut validated = Vec::with_capacity(schema.len());

    for descriptor in schema.fields() {
        let current = fields
            .get(descriptor.name())
            .filter(|value| !value.is_null())
            .cloned();
        let defaulted = current.is_none();

        if let Some(value) = validate(descriptor, current)? {
            validated.push(ValidatedField {
                descriptor,
                value,
                defaulted,
            });
        }
    }

    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::Model,
        schema::{Declaration, FieldDecl, FieldOptions, TypeMarker, compile},
    };
    use bson::{DateTime, doc};

    struct Article;
    struct Comment;

    impl Model for Article {
        fn collection_name() -> &'static str {
            "articles"
        }

        fn declare(schema: &mut Declaration) {
            schema
                .field("title", TypeMarker::String)
                .field("comments", FieldDecl::array_of(Comment::reference()));
        }
    }

    impl Model for Comment {
        fn collection_name() -> &'static str {
            "comments"
        }

        fn declare(schema: &mut Declaration) {
            schema.field("article", Article::reference());
        }
    }

    fn descriptor(decl: impl Into<FieldDecl>) -> FieldDescriptor {
        let mut declaration = Declaration::new();
        declaration.field("f", decl);
        compile("c", None, &declaration)
            .unwrap()
            .field("f")
            .cloned()
            .unwrap()
    }

    fn kind_of(result: Result<Option<Value>, ValidationError>) -> ValidationErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn scalars_of_the_declared_type_pass() {
        let cases = [
            (TypeMarker::String, Value::from("hello")),
            (TypeMarker::Number, Value::from(26)),
            (TypeMarker::Boolean, Value::from(true)),
            (TypeMarker::Date, Value::from(DateTime::now())),
            (TypeMarker::Object, Value::from(doc! { "hi": "bye" })),
            (TypeMarker::Buffer, Value::buffer(b"hello".to_vec())),
        ];

        for (marker, value) in cases {
            assert_eq!(validate(&descriptor(marker), Some(value.clone())), Ok(Some(value)));
        }
    }

    #[test]
    fn scalar_mismatch_is_rejected() {
        assert!(matches!(
            kind_of(validate(&descriptor(TypeMarker::Number), Some(Value::from("1")))),
            ValidationErrorKind::TypeMismatch { .. }
        ));
        assert!(matches!(
            kind_of(validate(&descriptor(TypeMarker::Array), Some(Value::from(1)))),
            ValidationErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn typed_arrays_check_every_element() {
        let strings = descriptor(FieldDecl::array_of(TypeMarker::String));

        assert!(validate(&strings, Some(Value::array(["1", "2", "3"]))).is_ok());
        assert!(matches!(
            kind_of(validate(&strings, Some(Value::array([1, 2, 3])))),
            ValidationErrorKind::TypeMismatch { .. }
        ));
        assert!(matches!(
            kind_of(validate(&strings, Some(Value::array(vec![Value::from("a"), Value::from(2)])))),
            ValidationErrorKind::TypeMismatch { .. }
        ));
        assert!(matches!(
            kind_of(validate(&strings, Some(Value::from("a")))),
            ValidationErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn untyped_arrays_accept_mixed_plain_values() {
        let array = descriptor(TypeMarker::Array);
        let mixed = Value::array(vec![Value::from(1), Value::from("number"), Value::from(true)]);

        assert_eq!(validate(&array, Some(mixed.clone())), Ok(Some(mixed)));

        let comment = Comment::create().unwrap();
        assert!(validate(&array, Some(Value::array([comment]))).is_err());
    }

    #[test]
    fn references_accept_matching_documents_and_identifiers() {
        let schema = Article::schema().unwrap();
        let comments = schema.field("comments").unwrap();
        let comment = Comment::create().unwrap();
        let article = Article::create().unwrap();

        assert!(validate(comments, Some(Value::array([comment.clone()]))).is_ok());
        assert!(validate(comments, Some(Value::array(["an-id"]))).is_ok());
        assert!(validate(comments, Some(Value::array([article]))).is_err());

        let reference = Comment::schema().unwrap();
        let reference = reference.field("article").unwrap();
        assert!(validate(reference, Some(Value::from(Article::create().unwrap().downgrade()))).is_ok());
        assert!(validate(reference, Some(Value::from(comment))).is_err());
    }

    #[test]
    fn dropped_weak_references_are_reported() {
        let schema = Comment::schema().unwrap();
        let field = schema.field("article").unwrap();
        let weak = {
            let article = Article::create().unwrap();
            article.downgrade()
        };

        assert_eq!(
            kind_of(validate(field, Some(Value::from(weak)))),
            ValidationErrorKind::DroppedReference
        );
    }

    #[test]
    fn required_fields_need_a_value() {
        let required = descriptor(TypeMarker::String.options().required());

        assert_eq!(kind_of(validate(&required, None)), ValidationErrorKind::RequiredMissing);
        assert_eq!(kind_of(validate(&required, Some(Value::Null))), ValidationErrorKind::RequiredMissing);
        assert_eq!(validate(&descriptor(TypeMarker::String), None), Ok(None));
    }

    #[test]
    fn defaults_fill_unset_fields_without_revalidation() {
        let literal = descriptor(
            TypeMarker::String
                .options()
                .required()
                .default_value("reddit")
                .choices(["reddit", "wired"]),
        );
        assert_eq!(validate(&literal, None), Ok(Some(Value::from("reddit"))));

        // Defaults are trusted even if they would fail the field's own constraints.
        let trusted = descriptor(TypeMarker::Number.options().max(1.0).default_value(5));
        assert_eq!(validate(&trusted, None), Ok(Some(Value::from(5))));

        let produced = descriptor(TypeMarker::Date.options().default_with(|| DateTime::now().into()));
        assert!(matches!(validate(&produced, None), Ok(Some(Value::Date(_)))));
    }

    #[test]
    fn choices_accept_members_only() {
        let source = descriptor(TypeMarker::String.options().choices(["reddit", "wired"]));

        assert!(validate(&source, Some(Value::from("wired"))).is_ok());
        assert_eq!(
            kind_of(validate(&source, Some(Value::from("google")))),
            ValidationErrorKind::ChoiceViolation
        );
    }

    #[test]
    fn ranges_are_inclusive() {
        let item = descriptor(FieldOptions::new(TypeMarker::Number).min(0.0).max(100.0));

        for accepted in [0, 1, 99, 100] {
            assert!(validate(&item, Some(Value::from(accepted))).is_ok());
        }
        for rejected in [-1.0, 101.0, f64::NAN] {
            assert_eq!(
                kind_of(validate(&item, Some(Value::from(rejected)))),
                ValidationErrorKind::RangeViolation
            );
        }

        let floor = descriptor(FieldOptions::new(TypeMarker::Number).min(0.0));
        assert_eq!(
            kind_of(validate(&floor, Some(Value::Number(f64::NAN)))),
            ValidationErrorKind::RangeViolation
        );
        assert!(validate(&floor, Some(Value::Number(f64::INFINITY))).is_ok());
    }

    #[test]
    fn documents_fail_fast_in_declaration_order() {
        let mut declaration = Declaration::new();
        declaration
            .field("first", TypeMarker::Number.options().required())
            .field("second", TypeMarker::String.options().required());
        let schema = compile("c", None, &declaration).unwrap();

        let err = validate_document(&schema, &HashMap::new()).unwrap_err();
        assert_eq!(err.field, "first");
    }

    #[test]
    fn documents_report_defaulted_fields() {
        let mut declaration = Declaration::new();
        declaration
            .field("given", TypeMarker::String)
            .field("filled", TypeMarker::String.options().default_value("x"))
            .field("skipped", TypeMarker::String);
        let schema = compile("c", None, &declaration).unwrap();

        let fields = HashMap::from([("given".to_string(), Value::from("y"))]);
        let validated = validate_document(&schema, &fields).unwrap();
        let summary = validated
            .iter()
            .map(|field| (field.descriptor.name(), field.defaulted))
            .collect::<Vec<_>>();

        assert_eq!(summary, vec![("given", false), ("filled", true)]);
    }
}
