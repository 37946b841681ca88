//! Queries against stored records.
//!
//! Loading operations accept anything convertible into a [`Query`]. The common case is a
//! plain `bson::Document` of field/value pairs, which matches records whose fields equal every
//! given value:
//!
//! ```ignore
//! let user = store.load_one::<User>(doc! { "name": "Alice" }).await?;
//! ```
//!
//! Richer predicates are built with [`Filter`] and combined with [`Expr::and`] / [`Expr::or`]:
//!
//! ```ignore
//! use docmodel::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::gte("age", 18).and(Filter::exists("email")))
//!     .sort("age", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```
//!
//! Backends translate the expression tree with a [`QueryVisitor`].

use bson::{Bson, Uuid};

use crate::error::DocumentStoreError;

/// Field name under which every backend keeps the record identifier.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Comparison applied by an [`Expr::Field`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// The field is a string containing the value, or an array with an element equal to it.
    Contains,
    /// The field equals one of the values in the given array.
    AnyOf,
    /// The field equals none of the values in the given array.
    NoneOf,
}

/// A predicate over stored records.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present (`true`) or absent (`false`).
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Expr::Field {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Conjunction with `other`, flattening into an existing `And`.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut exprs) => {
                exprs.push(other);
                Expr::And(exprs)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Disjunction with `other`, flattening into an existing `Or`.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut exprs) => {
                exprs.push(other);
                Expr::Or(exprs)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Constructors for [`Expr`] nodes.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lte, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Contains, value)
    }

    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(field, FieldOp::AnyOf, collect_array(values))
    }

    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(field, FieldOp::NoneOf, collect_array(values))
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches the record with the given identifier.
    pub fn id(id: Uuid) -> Expr {
        Filter::eq(ID_FIELD, id.to_string())
    }
}

fn collect_array(values: impl IntoIterator<Item = impl Into<Bson>>) -> Bson {
    Bson::Array(values.into_iter().map(Into::into).collect())
}

/// Filter, ordering and window of a load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<Sort>,
}

impl Query {
    /// A query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// The same query with its window removed, as used for counting.
    pub fn unbounded(self) -> Self {
        Self {
            limit: None,
            offset: None,
            ..self
        }
    }
}

impl From<Expr> for Query {
    fn from(filter: Expr) -> Self {
        Query {
            filter: Some(filter),
            ..Query::default()
        }
    }
}

/// Field/value equality on every key. An empty document matches everything.
impl From<bson::Document> for Query {
    fn from(document: bson::Document) -> Self {
        if document.is_empty() {
            return Query::new();
        }

        Filter::and(
            document
                .into_iter()
                .map(|(field, value)| Filter::eq(field, value)),
        )
        .into()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`] tree, producing a backend-specific representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn documents_become_conjunctions_of_equalities() {
        let query = Query::from(doc! { "name": "Alice", "age": 30 });

        assert_eq!(
            query.filter,
            Some(Expr::And(vec![
                Filter::eq("name", "Alice"),
                Filter::eq("age", 30),
            ]))
        );
        assert_eq!(Query::from(doc! {}), Query::new());
    }

    #[test]
    fn combinators_flatten() {
        let expr = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::eq("c", 3));

        assert!(matches!(expr, Expr::And(ref exprs) if exprs.len() == 3));

        let expr = Filter::eq("a", 1).or(Filter::eq("b", 2)).or(Filter::exists("c"));
        assert!(matches!(expr, Expr::Or(ref exprs) if exprs.len() == 3));
    }

    #[test]
    fn unbounded_drops_the_window_only() {
        let query = Query::builder()
            .filter(Filter::exists("a"))
            .limit(1)
            .offset(4)
            .sort("a", SortDirection::Asc)
            .build()
            .unbounded();

        assert_eq!(query.limit, None);
        assert_eq!(query.offset, None);
        assert!(query.filter.is_some());
        assert!(query.sort.is_some());
    }

    #[test]
    fn id_filter_matches_the_string_form() {
        let id = Uuid::new();
        assert_eq!(Filter::id(id), Filter::eq("_id", id.to_string()));
    }
}
