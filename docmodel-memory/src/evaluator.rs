//! Evaluation of query expressions against in-memory records.

use std::cmp::Ordering;

use bson::{Bson, DateTime};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Borrowed view of a BSON value that compares across numeric representations.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Bytes(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Document(&'a bson::Document),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Bytes(&binary.bytes),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Document(doc),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Bytes(a), Comparable::Bytes(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Document(a), Comparable::Document(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Looks up `path` in `record`, descending into embedded documents on `.`.
pub(crate) fn lookup<'a>(record: &'a bson::Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Orders two records by a field, missing fields first.
pub(crate) fn compare_field(a: &bson::Document, b: &bson::Document, field: &str) -> Ordering {
    let left = lookup(a, field).map_or(Comparable::Null, Comparable::from);
    let right = lookup(b, field).map_or(Comparable::Null, Comparable::from);

    match (&left, &right) {
        (Comparable::Null, Comparable::Null) => Ordering::Equal,
        (Comparable::Null, _) => Ordering::Less,
        (_, Comparable::Null) => Ordering::Greater,
        _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

pub(crate) struct RecordEvaluator<'a> {
    record: &'a bson::Document,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a bson::Document) -> Self {
        Self { record }
    }

    pub fn matches(record: &'a bson::Document, expr: &Expr) -> DocumentStoreResult<bool> {
        Self::new(record).visit_expr(expr)
    }
}

impl QueryVisitor for RecordEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.record, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf) && !matches!(value, Bson::Array(_)) {
            return Err(DocumentStoreError::Backend(format!(
                "{op:?} on `{field}` requires an array of values"
            )));
        }

        let expected = Comparable::from(value);
        let Some(actual) = lookup(self.record, field).map(Comparable::from) else {
            // A missing field equals nothing, so only the negative operators hold.
            return Ok(matches!(op, FieldOp::Ne | FieldOp::NoneOf));
        };

        Ok(match op {
            FieldOp::Eq => actual == expected,
            FieldOp::Ne => actual != expected,
            FieldOp::Gt => actual.partial_cmp(&expected) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(
                actual.partial_cmp(&expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FieldOp::Lt => actual.partial_cmp(&expected) == Some(Ordering::Less),
            FieldOp::Lte => matches!(
                actual.partial_cmp(&expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FieldOp::Contains => match (&actual, &expected) {
                (Comparable::Array(items), _) => items.contains(&expected),
                (Comparable::String(haystack), Comparable::String(needle)) => haystack.contains(needle),
                _ => false,
            },
            FieldOp::AnyOf => any_of(&actual, &expected),
            FieldOp::NoneOf => !any_of(&actual, &expected),
        })
    }
}

/// True if `actual`, or any of its elements when it is an array, is among `candidates`.
fn any_of(actual: &Comparable<'_>, candidates: &Comparable<'_>) -> bool {
    let Comparable::Array(candidates) = candidates else {
        return false;
    };

    match actual {
        Comparable::Array(items) => items.iter().any(|item| candidates.contains(item)),
        single => candidates.contains(single),
    }
}
