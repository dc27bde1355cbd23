//! Find specifications and the filter expression API.
//!
//! A [`Query`] bundles everything a find operation needs: a filter document, an optional
//! projection, sort keys, and skip/limit bounds. Backends that speak the filter language
//! natively (MongoDB) forward the filter document untouched. Backends that evaluate
//! filters themselves parse it into an [`Expr`] tree with [`Expr::parse`] and walk it
//! with a [`QueryVisitor`].
//!
//! # Query Building
//!
//! ```ignore
//! use docgate::query::{Query, SortDirection};
//! use bson::doc;
//!
//! let query = Query::builder()
//!     .filter(doc! { "status": "shipped" })
//!     .sort("createdAt", SortDirection::Desc)
//!     .skip(20)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Returns the numeric form used in sort documents (`1` or `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    fn from_bson(field: &str, value: &Bson) -> DocumentStoreResult<Self> {
        let numeric = match value {
            Bson::Int32(n) => Some(*n as f64),
            Bson::Int64(n) => Some(*n as f64),
            Bson::Double(n) => Some(*n),
            _ => None,
        };

        match (numeric, value) {
            (Some(n), _) if n == 1.0 => Ok(SortDirection::Asc),
            (Some(n), _) if n == -1.0 => Ok(SortDirection::Desc),
            (None, Bson::String(s)) => match s.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => Ok(SortDirection::Asc),
                "desc" | "descending" => Ok(SortDirection::Desc),
                _ => Err(DocumentStoreError::InvalidQuery(format!(
                    "invalid sort direction for {field}: {s}"
                ))),
            },
            _ => Err(DocumentStoreError::InvalidQuery(format!(
                "invalid sort direction for {field}: {value}"
            ))),
        }
    }
}

/// Sort specification for query results.
///
/// Specifies which field to sort by and in which direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by. Dotted names address nested fields.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Creates a sort key.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort { field: field.into(), direction }
    }

    /// Parses a client supplied sort specification.
    ///
    /// Accepts a document mapping field names to `1`, `-1`, `"asc"` or `"desc"`
    /// (applied in key order), or a single field name where a leading `-` means
    /// descending.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for any other shape.
    pub fn parse_spec(spec: &Bson) -> DocumentStoreResult<Vec<Sort>> {
        match spec {
            Bson::Document(keys) => keys
                .iter()
                .map(|(field, dir)| SortDirection::from_bson(field, dir).map(|d| Sort::new(field, d)))
                .collect(),
            Bson::String(field) if !field.is_empty() => Ok(vec![match field.strip_prefix('-') {
                Some(name) => Sort::new(name, SortDirection::Desc),
                None => Sort::new(field, SortDirection::Asc),
            }]),
            other => Err(DocumentStoreError::InvalidQuery(format!(
                "sort must be an object or a field name, found {other}"
            ))),
        }
    }

    /// Renders sort keys as a sort document (`{field: 1 | -1, ...}`).
    pub fn to_document(sorts: &[Sort]) -> Document {
        sorts
            .iter()
            .map(|s| (s.field.clone(), Bson::Int32(s.direction.as_i32())))
            .collect()
    }
}

/// A find specification for retrieving documents from one collection.
///
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter document; empty matches every document.
    pub filter: Document,
    /// Fields to include or exclude from returned documents.
    pub projection: Option<Document>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return. Zero means no limit and a negative
    /// value is treated as its absolute value.
    pub limit: Option<i64>,
}

impl Query {
    /// Creates a new query matching every document, with no bounds.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Returns the effective limit, or `None` when results are unbounded.
    pub fn effective_limit(&self) -> Option<u64> {
        match self.limit {
            Some(0) | None => None,
            Some(n) => Some(n.unsigned_abs()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter document.
    pub fn filter(mut self, filter: Document) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the projection document.
    pub fn projection(mut self, projection: Document) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort::new(field, direction));
        self
    }

    /// Replaces all sort keys.
    pub fn sorts(mut self, sorts: Vec<Sort>) -> Self {
        self.query.sort = sorts;
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: i64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (`$eq`, or an implicit `{field: value}`).
    Eq,
    /// Not equal to (`$ne`). Also matches documents missing the field.
    Ne,
    /// Greater than (`$gt`).
    Gt,
    /// Greater than or equal to (`$gte`).
    Gte,
    /// Less than (`$lt`).
    Lt,
    /// Less than or equal to (`$lte`).
    Lte,
    /// Field equals any of the listed values (`$in`).
    AnyOf,
    /// Field equals none of the listed values (`$nin`). Also matches documents missing the field.
    NoneOf,
}

/// A parsed filter expression.
///
/// An empty `And` matches every document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The (possibly dotted) field path to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Parses a filter document into an expression tree.
    ///
    /// Supports implicit equality, the comparison operators `$eq`, `$ne`, `$gt`,
    /// `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists` and `$not`, and the logical
    /// operators `$and`, `$or` and `$nor`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for unknown operators or
    /// malformed operands.
    pub fn parse(filter: &Document) -> DocumentStoreResult<Expr> {
        let mut clauses = filter
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Filter::and(parse_clause_list(key, value)?)),
                "$or" => Ok(Filter::or(parse_clause_list(key, value)?)),
                "$nor" => Ok(Filter::or(parse_clause_list(key, value)?).not()),
                op if op.starts_with('$') => Err(DocumentStoreError::InvalidQuery(format!(
                    "unknown top level operator: {op}"
                ))),
                field => parse_field(field, value),
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }
}

fn parse_clause_list(op: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    match value {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(doc) => Expr::parse(doc),
                other => Err(DocumentStoreError::InvalidQuery(format!(
                    "{op} entries must be objects, found {other}"
                ))),
            })
            .collect(),
        _ => Err(DocumentStoreError::InvalidQuery(format!(
            "{op} must be a nonempty array"
        ))),
    }
}

fn is_operator_document(doc: &Document) -> DocumentStoreResult<bool> {
    let operators = doc.keys().filter(|k| k.starts_with('$')).count();

    match operators {
        0 => Ok(false),
        n if n == doc.len() => Ok(true),
        _ => Err(DocumentStoreError::InvalidQuery(
            "cannot mix operators and plain fields in one condition".to_string(),
        )),
    }
}

fn parse_field(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let operators = match value {
        Bson::Document(doc) if is_operator_document(doc)? => doc,
        _ => return Ok(Filter::eq(field, value.clone())),
    };

    let mut exprs = operators
        .iter()
        .map(|(op, operand)| match op.as_str() {
            "$eq" => Ok(Filter::eq(field, operand.clone())),
            "$ne" => Ok(Filter::ne(field, operand.clone())),
            "$gt" => Ok(Filter::gt(field, operand.clone())),
            "$gte" => Ok(Filter::gte(field, operand.clone())),
            "$lt" => Ok(Filter::lt(field, operand.clone())),
            "$lte" => Ok(Filter::lte(field, operand.clone())),
            "$in" | "$nin" => match operand {
                Bson::Array(_) if op == "$in" => Ok(Filter::any_of(field, operand.clone())),
                Bson::Array(_) => Ok(Filter::none_of(field, operand.clone())),
                _ => Err(DocumentStoreError::InvalidQuery(format!("{op} needs an array"))),
            },
            "$exists" => Ok(match is_truthy(operand) {
                true => Filter::exists(field),
                false => Filter::not_exists(field),
            }),
            "$not" => match operand {
                Bson::Document(inner) if is_operator_document(inner)? => {
                    Ok(parse_field(field, operand)?.not())
                }
                _ => Err(DocumentStoreError::InvalidQuery("$not needs an operator object".to_string())),
            },
            unknown => Err(DocumentStoreError::InvalidQuery(format!(
                "unknown operator: {unknown}"
            ))),
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the specified value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the specified value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the specified value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the specified value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals any of the listed values.
    pub fn any_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, values.into())
    }

    /// Matches documents where the field equals none of the listed values.
    pub fn none_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, values.into())
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(Expr::parse(&doc! {}).unwrap(), Expr::And(vec![]));
    }

    #[test]
    fn plain_fields_are_implicit_equality() {
        assert_eq!(
            Expr::parse(&doc! { "status": "shipped" }).unwrap(),
            Filter::eq("status", "shipped"),
        );
        assert_eq!(
            Expr::parse(&doc! { "a": 1, "b": { "c": 2 } }).unwrap(),
            Filter::and([Filter::eq("a", 1), Filter::eq("b", doc! { "c": 2 })]),
        );
    }

    #[test]
    fn operator_objects_expand_per_operator() {
        assert_eq!(
            Expr::parse(&doc! { "age": { "$gte": 18, "$lt": 65 } }).unwrap(),
            Filter::and([Filter::gte("age", 18), Filter::lt("age", 65)]),
        );
        assert_eq!(
            Expr::parse(&doc! { "tag": { "$nin": ["x"] }, "deleted": { "$exists": 0 } }).unwrap(),
            Filter::and([Filter::none_of("tag", vec![Bson::from("x")]), Filter::not_exists("deleted")]),
        );
    }

    #[test]
    fn logical_operators_nest() {
        let expr = Expr::parse(&doc! {
            "$or": [{ "city": "Delhi" }, { "age": { "$not": { "$lt": 30 } } }],
            "$nor": [{ "isActive": false }],
        })
        .unwrap();

        assert_eq!(
            expr,
            Filter::and([
                Filter::or([Filter::eq("city", "Delhi"), Filter::lt("age", 30).not()]),
                Filter::or([Filter::eq("isActive", false)]).not(),
            ]),
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_operators() {
        for filter in [
            doc! { "$where": "1" },
            doc! { "a": { "$regex": "x" } },
            doc! { "a": { "$in": 3 } },
            doc! { "$and": [] },
            doc! { "$or": [1] },
            doc! { "a": { "$gt": 1, "b": 2 } },
            doc! { "a": { "$not": 5 } },
        ] {
            assert!(
                matches!(Expr::parse(&filter), Err(DocumentStoreError::InvalidQuery(_))),
                "{filter}"
            );
        }
    }

    #[test]
    fn sort_specs_from_documents_and_names() {
        assert_eq!(
            Sort::parse_spec(&Bson::Document(doc! { "age": -1, "name": "asc" })).unwrap(),
            vec![Sort::new("age", SortDirection::Desc), Sort::new("name", SortDirection::Asc)],
        );
        assert_eq!(
            Sort::parse_spec(&Bson::String("-createdAt".into())).unwrap(),
            vec![Sort::new("createdAt", SortDirection::Desc)],
        );
        assert!(Sort::parse_spec(&Bson::Document(doc! { "age": 2 })).is_err());
        assert!(Sort::parse_spec(&Bson::Int32(1)).is_err());
    }

    #[test]
    fn sort_keys_render_in_order() {
        let sorts = vec![Sort::new("b", SortDirection::Desc), Sort::new("a", SortDirection::Asc)];
        assert_eq!(Sort::to_document(&sorts), doc! { "b": -1, "a": 1 });
    }

    #[test]
    fn zero_limit_is_unbounded() {
        assert_eq!(Query::builder().limit(0).build().effective_limit(), None);
        assert_eq!(Query::builder().limit(-5).build().effective_limit(), Some(5));
        assert_eq!(Query::new().effective_limit(), None);
    }
}
