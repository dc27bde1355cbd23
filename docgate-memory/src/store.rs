//! In-memory storage implementation for document stores.
//!
//! Collections are vectors of BSON documents kept in insertion order, so unsorted
//! queries return documents in the order they were written.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};

use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
};

use crate::evaluator::{DocumentEvaluator, project, sort_documents};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries and lookups by `_id` scan the whole collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_documents(vec![doc! { "_id": 1, "name": "Alice" }], "users").await?;
///
/// let alice = store.find_document(1.into(), "users").await?;
/// assert!(alice.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docgate_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn position_of(documents: &[Document], id: &Bson) -> Option<usize> {
    documents
        .iter()
        .position(|doc| doc.get(ID_FIELD) == Some(id))
}

fn matching(documents: &[Document], filter: &Document) -> DocumentStoreResult<Vec<Document>> {
    if filter.is_empty() {
        return Ok(documents.to_vec());
    }

    DocumentEvaluator::filter_documents(documents, &Expr::parse(filter)?)
}

/// Sets `value` at a dotted `path`, creating intermediate documents as needed.
fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    if !document.contains_key(head) {
        document.insert(head, Document::new());
    }

    match document.get_mut(head) {
        Some(Bson::Document(inner)) => set_path(inner, rest, value),
        other => Err(DocumentStoreError::Backend(format!(
            "Cannot create field '{rest}' in element {{{head}: {}}}",
            other.map(|v| v.to_string()).unwrap_or_default()
        ))),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut store = self.store.write().await;
        let stored = store
            .entry(collection.to_string())
            .or_default();

        let mut ids = Vec::with_capacity(documents.len());

        for doc in documents {
            let id = doc
                .get(ID_FIELD)
                .cloned()
                .ok_or_else(|| DocumentStoreError::InvalidDocument("document has no _id".to_string()))?;

            if position_of(stored, &id).is_some() {
                return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
            }

            stored.push(doc);
            ids.push(id);
        }

        Ok(ids)
    }

    async fn find_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.get(ID_FIELD) == Some(&id)))
            .cloned())
    }

    async fn update_document(&self, id: Bson, changes: Document, collection: &str) -> DocumentStoreResult<Option<Document>> {
        let mut store = self.store.write().await;
        let Some(stored) = store.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = position_of(stored, &id) else {
            return Ok(None);
        };

        // Apply to a copy so a failed merge leaves the stored document untouched
        let mut merged = stored[index].clone();

        for (path, value) in changes {
            set_path(&mut merged, &path, value)?;
        }

        if merged.get(ID_FIELD) != Some(&id) {
            return Err(DocumentStoreError::Backend(
                "Performing an update on the path '_id' would modify the immutable field '_id'".to_string(),
            ));
        }

        stored[index] = merged.clone();

        Ok(Some(merged))
    }

    async fn delete_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<bool> {
        let mut store = self.store.write().await;
        let Some(stored) = store.get_mut(collection) else {
            return Ok(false);
        };

        match position_of(stored, &id) {
            Some(index) => {
                stored.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(stored) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = matching(stored, &query.filter)?;
        sort_documents(&mut documents, &query.sort);

        let limit = query
            .effective_limit()
            .map(|n| n as usize)
            .unwrap_or(usize::MAX);

        documents
            .into_iter()
            .skip(query.skip.unwrap_or(0) as usize)
            .take(limit)
            .map(|doc| match &query.projection {
                Some(projection) => project(&doc, projection),
                None => Ok(doc),
            })
            .collect()
    }

    async fn count_documents(&self, filter: Option<Document>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(stored) = store.get(collection) else {
            return Ok(0);
        };

        let count = match filter {
            Some(filter) => matching(stored, &filter)?.len(),
            None => stored.len(),
        };

        Ok(count as u64)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names: Vec<String> = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect();

        names.sort();

        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await.unwrap();
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new, empty [`InMemoryStore`] instance.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use docgate_core::query::SortDirection;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                vec![
                    doc! { "_id": 1, "name": "Rahul", "age": 30, "city": "Delhi" },
                    doc! { "_id": 2, "name": "Priya", "age": 25, "city": "Mumbai" },
                    doc! { "_id": 3, "name": "Amit", "age": 35, "city": "Delhi" },
                ],
                "users",
            )
            .await
            .unwrap();
        store
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.get_str("name").unwrap()).collect()
    }

    #[tokio::test]
    async fn insert_is_ordered_and_stops_at_duplicates() {
        let store = seeded().await;

        let result = store
            .insert_documents(vec![doc! { "_id": 4, "name": "Neha" }, doc! { "_id": 1 }, doc! { "_id": 5 }], "users")
            .await;

        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));
        assert_eq!(store.count_documents(None, "users").await.unwrap(), 4);
        assert!(store.find_document(Bson::Int32(5), "users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_applies_filter_sort_skip_limit_and_projection() {
        let store = seeded().await;

        let query = Query::builder()
            .filter(doc! { "city": "Delhi" })
            .sort("age", SortDirection::Desc)
            .projection(doc! { "name": 1, "_id": 0 })
            .build();
        let found = store.find_documents(query, "users").await.unwrap();
        assert_eq!(found, vec![doc! { "name": "Amit" }, doc! { "name": "Rahul" }]);

        let page = Query::builder().sort("name", SortDirection::Asc).skip(1).limit(-1).build();
        let found = store.find_documents(page, "users").await.unwrap();
        assert_eq!(names(&found), vec!["Priya"]);
    }

    #[tokio::test]
    async fn unsorted_results_keep_insertion_order() {
        let store = seeded().await;
        let found = store.find_documents(Query::builder().limit(0).build(), "users").await.unwrap();
        assert_eq!(names(&found), vec!["Rahul", "Priya", "Amit"]);
    }

    #[tokio::test]
    async fn missing_collections_read_as_empty() {
        let store = InMemoryStore::new();

        assert!(store.find_documents(Query::new(), "ghosts").await.unwrap().is_empty());
        assert_eq!(store.count_documents(Some(doc! { "a": 1 }), "ghosts").await.unwrap(), 0);
        assert!(!store.delete_document(Bson::Int32(1), "ghosts").await.unwrap());
        assert!(store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counts_respect_the_filter() {
        let store = seeded().await;

        assert_eq!(store.count_documents(Some(doc! { "age": { "$gte": 30 } }), "users").await.unwrap(), 2);
        assert_eq!(store.count_documents(Some(doc! {}), "users").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn invalid_filters_are_reported() {
        let store = seeded().await;
        let query = Query::builder().filter(doc! { "age": { "$where": 1 } }).build();

        assert!(matches!(
            store.find_documents(query, "users").await,
            Err(DocumentStoreError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn update_merges_fields_and_returns_the_result() {
        let store = seeded().await;

        let updated = store
            .update_document(Bson::Int32(2), doc! { "age": 26, "address.city": "Pune" }, "users")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            updated,
            doc! { "_id": 2, "name": "Priya", "age": 26, "city": "Mumbai", "address": { "city": "Pune" } }
        );
        assert_eq!(store.find_document(Bson::Int32(2), "users").await.unwrap(), Some(updated));
        assert!(store.update_document(Bson::Int32(9), doc! { "a": 1 }, "users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_cannot_change_the_identity() {
        let store = seeded().await;

        let same = store.update_document(Bson::Int32(1), doc! { "_id": 1, "age": 31 }, "users").await;
        assert!(same.unwrap().is_some());

        let changed = store.update_document(Bson::Int32(1), doc! { "_id": 7 }, "users").await;
        assert!(matches!(changed, Err(DocumentStoreError::Backend(_))));
        assert!(store.find_document(Bson::Int32(1), "users").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_exactly_one_document() {
        let store = seeded().await;

        assert!(store.delete_document(Bson::Int32(3), "users").await.unwrap());
        assert!(!store.delete_document(Bson::Int32(3), "users").await.unwrap());
        assert_eq!(store.count_documents(None, "users").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn object_ids_are_matched_by_value() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();
        store.insert_documents(vec![doc! { "_id": id, "n": 1 }], "things").await.unwrap();

        let copy = ObjectId::parse_str(id.to_hex()).unwrap();
        assert!(store.find_document(Bson::ObjectId(copy), "things").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn collections_are_listed_by_name() {
        let store = InMemoryStore::new();
        for name in ["orders", "audit", "users"] {
            store.insert_documents(vec![doc! { "_id": 1 }], name).await.unwrap();
        }

        assert_eq!(store.list_collections().await.unwrap(), vec!["audit", "orders", "users"]);
    }
}
