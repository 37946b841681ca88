//! Translation of query expressions into MongoDB filter documents.

use bson::{Bson, Document, doc};

use docmodel_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Builds a MongoDB filter document from an [`Expr`] tree.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub fn translate(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, DocumentStoreError> {
        exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! { "$and": self.visit_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            // An empty disjunction matches nothing.
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$nor": [self.visit_expr(expr)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { "$exists": should_exist } })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::Contains => {
                return Ok(match value {
                    Bson::String(needle) => doc! {
                        "$or": [
                            { field: { "$regex": escape_regex(needle) } },
                            { field: { "$elemMatch": { "$eq": value } } },
                        ]
                    },
                    _ => doc! { field: { "$elemMatch": { "$eq": value } } },
                });
            }
            FieldOp::AnyOf | FieldOp::NoneOf => {
                let Bson::Array(values) = value else {
                    return Err(DocumentStoreError::Backend(format!(
                        "{op:?} on `{field}` requires an array of values"
                    )));
                };

                match op {
                    FieldOp::AnyOf => doc! { "$in": values },
                    _ => doc! { "$nin": values },
                }
            }
        };

        Ok(doc! { field: condition })
    }
}

/// Escapes regex metacharacters so `needle` matches literally.
fn escape_regex(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());

    for ch in needle.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}
