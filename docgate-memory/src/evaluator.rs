//! Filter evaluation, projection and sorting for in-memory documents.
//!
//! Filters are parsed into the core [`Expr`] tree and evaluated against one document at
//! a time by [`DocumentEvaluator`]. Field paths may be dotted to reach into nested
//! documents.

use bson::{Bson, DateTime, Document, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use docgate_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64. Values of different kinds are never equal
/// and have no partial order; [`Comparable::total_cmp`] supplies the cross-kind order
/// used for sorting.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes() == b.bytes(),
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Orders any two values: first by kind, then by value within a kind.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

/// Resolves a dotted field path inside a document.
///
/// Path segments step into nested documents, or into arrays by numeric index.
pub(crate) fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(doc) => doc.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn matches_eq(field_value: Option<&Bson>, value: &Bson) -> bool {
    let expected = Comparable::from(value);

    match field_value {
        None => expected == Comparable::Null,
        Some(Bson::Array(items)) if !matches!(value, Bson::Array(_)) => items
            .iter()
            .any(|item| Comparable::from(item) == expected),
        Some(actual) => Comparable::from(actual) == expected,
    }
}

fn matches_order(field_value: Option<&Bson>, value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let expected = Comparable::from(value);
    let compare = |item: &Bson| {
        Comparable::from(item)
            .partial_cmp(&expected)
            .is_some_and(&accept)
    };

    match field_value {
        None => false,
        Some(Bson::Array(items)) if !matches!(value, Bson::Array(_)) => items.iter().any(compare),
        Some(actual) => compare(actual),
    }
}

fn matches_any(field_value: Option<&Bson>, values: &Bson) -> bool {
    match values {
        Bson::Array(candidates) => candidates
            .iter()
            .any(|candidate| matches_eq(field_value, candidate)),
        _ => false,
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for doc in documents {
            if DocumentEvaluator::new(doc).evaluate(expr)? {
                matched.push(doc.clone());
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
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
        Ok(lookup_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup_path(self.document, field);

        Ok(match op {
            FieldOp::Eq => matches_eq(field_value, value),
            FieldOp::Ne => !matches_eq(field_value, value),
            FieldOp::Gt => matches_order(field_value, value, |o| o == Ordering::Greater),
            FieldOp::Gte => matches_order(field_value, value, |o| o != Ordering::Less),
            FieldOp::Lt => matches_order(field_value, value, |o| o == Ordering::Less),
            FieldOp::Lte => matches_order(field_value, value, |o| o != Ordering::Greater),
            FieldOp::AnyOf => matches_any(field_value, value),
            FieldOp::NoneOf => !matches_any(field_value, value),
        })
    }
}

/// Sorts documents by the given keys, in key order. The sort is stable.
pub(crate) fn sort_documents(documents: &mut [Document], sorts: &[Sort]) {
    if sorts.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        sorts
            .iter()
            .map(|sort| {
                let left = lookup_path(a, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup_path(b, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.total_cmp(&right),
                    SortDirection::Desc => right.total_cmp(&left),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn is_included(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Applies an inclusion or exclusion projection.
///
/// `_id` is kept unless the projection excludes it explicitly. Inclusion keeps the
/// document's own field order.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidQuery`] when a projection mixes inclusion and
/// exclusion of fields other than `_id`.
pub(crate) fn project(document: &Document, projection: &Document) -> DocumentStoreResult<Document> {
    let keep_id = projection.get("_id").is_none_or(is_included);
    let (included, excluded): (Vec<_>, Vec<_>) = projection
        .iter()
        .filter(|(path, _)| path.as_str() != "_id")
        .partition(|(_, value)| is_included(value));

    match (included.is_empty(), excluded.is_empty()) {
        (false, false) => Err(DocumentStoreError::InvalidQuery(
            "projection cannot mix inclusion and exclusion".to_string(),
        )),
        (false, true) => {
            let paths: Vec<&str> = included.iter().map(|(path, _)| path.as_str()).collect();
            let mut projected = include_paths(document, &paths);

            if keep_id {
                if let Some(id) = document.get("_id") {
                    let mut with_id = Document::new();
                    with_id.insert("_id", id.clone());
                    for (key, value) in projected {
                        with_id.insert(key, value);
                    }
                    projected = with_id;
                }
            }

            Ok(projected)
        }
        _ => {
            let mut projected = document.clone();

            for (path, _) in &excluded {
                remove_path(&mut projected, path);
            }
            if !keep_id {
                projected.remove("_id");
            }

            Ok(projected)
        }
    }
}

fn include_paths(document: &Document, paths: &[&str]) -> Document {
    let mut projected = Document::new();

    for (key, value) in document {
        if paths.contains(&key.as_str()) {
            projected.insert(key.clone(), value.clone());
            continue;
        }

        let prefix = format!("{key}.");
        let nested: Vec<&str> = paths
            .iter()
            .filter_map(|path| path.strip_prefix(prefix.as_str()))
            .collect();

        if let (false, Bson::Document(inner)) = (nested.is_empty(), value) {
            let sub = include_paths(inner, &nested);
            if !sub.is_empty() {
                projected.insert(key.clone(), sub);
            }
        }
    }

    projected
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&Expr::parse(&filter).unwrap())
            .unwrap()
    }

    #[test]
    fn equality_handles_numbers_nulls_and_arrays() {
        let order = doc! { "qty": 3, "price": 3.0, "tags": ["rush", "gift"], "note": null };

        assert!(matches(&order, doc! { "qty": 3.0 }));
        assert!(matches(&order, doc! { "price": 3 }));
        assert!(matches(&order, doc! { "tags": "gift" }));
        assert!(matches(&order, doc! { "tags": ["rush", "gift"] }));
        assert!(!matches(&order, doc! { "tags": ["gift", "rush"] }));
        assert!(matches(&order, doc! { "note": null }));
        assert!(matches(&order, doc! { "missing": null }));
        assert!(!matches(&order, doc! { "qty": "3" }));
    }

    #[test]
    fn negations_match_missing_fields() {
        let order = doc! { "status": "shipped" };

        assert!(matches(&order, doc! { "carrier": { "$ne": "ups" } }));
        assert!(matches(&order, doc! { "carrier": { "$nin": ["ups"] } }));
        assert!(!matches(&order, doc! { "status": { "$nin": ["shipped", "lost"] } }));
        assert!(matches(&order, doc! { "status": { "$in": ["shipped", "lost"] } }));
    }

    #[test]
    fn range_operators_do_not_cross_types() {
        let user = doc! { "age": 30, "name": "Rahul" };

        assert!(matches(&user, doc! { "age": { "$gt": 25, "$lte": 30 } }));
        assert!(!matches(&user, doc! { "age": { "$gt": "25" } }));
        assert!(!matches(&user, doc! { "height": { "$lt": 200 } }));
        assert!(matches(&user, doc! { "name": { "$gte": "R" } }));
    }

    #[test]
    fn dotted_paths_reach_nested_values() {
        let user = doc! { "address": { "city": "Delhi", "geo": { "lat": 28.6 } }, "phones": ["a", "b"] };

        assert!(matches(&user, doc! { "address.city": "Delhi" }));
        assert!(matches(&user, doc! { "address.geo.lat": { "$gt": 28 } }));
        assert!(matches(&user, doc! { "phones.1": "b" }));
        assert!(matches(&user, doc! { "address.zip": { "$exists": false } }));
    }

    #[test]
    fn logical_operators_compose() {
        let user = doc! { "city": "Mumbai", "isActive": true };

        assert!(matches(&user, doc! { "$or": [{ "city": "Delhi" }, { "isActive": true }] }));
        assert!(!matches(&user, doc! { "$nor": [{ "city": "Mumbai" }] }));
        assert!(matches(&user, doc! { "city": { "$not": { "$eq": "Delhi" } } }));
    }

    #[test]
    fn sorting_uses_keys_in_order_and_a_total_type_order() {
        let mut docs = vec![
            doc! { "n": 1, "s": "b" },
            doc! { "n": "text", "s": "a" },
            doc! { "s": "c" },
            doc! { "n": 1, "s": "a" },
        ];

        sort_documents(&mut docs, &[Sort::new("n", SortDirection::Asc), Sort::new("s", SortDirection::Desc)]);

        let order: Vec<_> = docs.iter().map(|d| d.get_str("s").unwrap()).collect();
        assert_eq!(order, vec!["c", "b", "a", "a"]);
        assert_eq!(docs[3].get("n"), Some(&Bson::String("text".into())));
    }

    #[test]
    fn inclusion_projection_keeps_id_and_document_order() {
        let user = doc! { "_id": 1, "name": "Priya", "age": 28, "address": { "city": "Pune", "zip": "411001" } };

        assert_eq!(
            project(&user, &doc! { "address.city": 1, "name": 1 }).unwrap(),
            doc! { "_id": 1, "name": "Priya", "address": { "city": "Pune" } },
        );
        assert_eq!(
            project(&user, &doc! { "name": 1, "_id": 0 }).unwrap(),
            doc! { "name": "Priya" },
        );
    }

    #[test]
    fn exclusion_projection_drops_fields() {
        let user = doc! { "_id": 1, "name": "Priya", "address": { "city": "Pune", "zip": "411001" } };

        assert_eq!(
            project(&user, &doc! { "address.zip": 0, "_id": false }).unwrap(),
            doc! { "name": "Priya", "address": { "city": "Pune" } },
        );
    }

    #[test]
    fn mixed_projection_is_rejected() {
        let err = project(&doc! { "a": 1 }, &doc! { "a": 1, "b": 0 }).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidQuery(_)));
    }
}
