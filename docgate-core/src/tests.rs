use async_trait::async_trait;
use bson::{Bson, Document, doc};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    page::TotalScope,
    query::Query,
    store::{ConnectionManager, DocumentStore},
};

/// Records the calls it receives and answers with canned values.
#[derive(Debug, Default, Clone)]
struct RecordingBackend {
    healthy: bool,
    inserted: Arc<Mutex<Vec<Document>>>,
    counted: Arc<Mutex<Vec<Option<Document>>>>,
    shutdowns: Arc<AtomicUsize>,
}

impl RecordingBackend {
    fn healthy() -> Self {
        Self { healthy: true, ..Default::default() }
    }
}

#[async_trait]
impl StoreBackend for RecordingBackend {
    async fn ping(&self) -> DocumentStoreResult<()> {
        match self.healthy {
            true => Ok(()),
            false => Err(DocumentStoreError::Backend("connection refused".into())),
        }
    }

    async fn insert_documents(&self, documents: Vec<Document>, _collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let ids = documents
            .iter()
            .map(|d| d.get(ID_FIELD).cloned().unwrap_or(Bson::Null))
            .collect();
        self.inserted.lock().unwrap().extend(documents);
        Ok(ids)
    }

    async fn find_document(&self, _id: Bson, _collection: &str) -> DocumentStoreResult<Option<Document>> {
        Ok(None)
    }

    async fn update_document(&self, _id: Bson, _changes: Document, _collection: &str) -> DocumentStoreResult<Option<Document>> {
        Ok(None)
    }

    async fn delete_document(&self, _id: Bson, _collection: &str) -> DocumentStoreResult<bool> {
        Ok(false)
    }

    async fn find_documents(&self, _query: Query, _collection: &str) -> DocumentStoreResult<Vec<Document>> {
        Ok(vec![doc! { "n": 1 }])
    }

    async fn count_documents(&self, filter: Option<Document>, _collection: &str) -> DocumentStoreResult<u64> {
        self.counted.lock().unwrap().push(filter);
        Ok(42)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(vec![])
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RecordingBuilder {
    backend: RecordingBackend,
    builds: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreBackendBuilder for RecordingBuilder {
    type Backend = RecordingBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend)
    }
}

#[tokio::test]
async fn database_is_unavailable_before_connect() {
    let manager = ConnectionManager::new();

    assert!(matches!(manager.database().await, Err(DocumentStoreError::Uninitialized)));
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn connect_happens_once() {
    let manager = ConnectionManager::new();
    let builds = Arc::new(AtomicUsize::new(0));

    let first = manager
        .connect(RecordingBuilder { backend: RecordingBackend::healthy(), builds: builds.clone() })
        .await
        .unwrap();
    let second = manager
        .connect(RecordingBuilder { backend: RecordingBackend::healthy(), builds: builds.clone() })
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &manager.database().await.unwrap()));
}

#[tokio::test]
async fn failed_liveness_probe_is_an_initialization_error() {
    let manager = ConnectionManager::new();
    let result = manager
        .connect(RecordingBuilder { backend: RecordingBackend::default(), builds: Default::default() })
        .await;

    assert!(matches!(result, Err(DocumentStoreError::Initialization(_))));
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn close_is_idempotent() {
    let backend = RecordingBackend::healthy();
    let shutdowns = backend.shutdowns.clone();
    let manager = ConnectionManager::connected(DocumentStore::new(backend));

    manager.close().await.unwrap();
    manager.close().await.unwrap();
    ConnectionManager::new().close().await.unwrap();

    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert!(matches!(manager.database().await, Err(DocumentStoreError::Uninitialized)));
}

#[tokio::test]
async fn insert_one_assigns_an_object_id() {
    let backend = RecordingBackend::healthy();
    let inserted = backend.inserted.clone();
    let store = DocumentStore::new(backend);

    let (id, stored) = store
        .collection("users")
        .insert_one(doc! { "name": "Alice" })
        .await
        .unwrap();

    assert!(matches!(id, Bson::ObjectId(_)));
    assert_eq!(stored.get(ID_FIELD), Some(&id));
    assert_eq!(inserted.lock().unwrap().as_slice(), &[stored]);
}

#[tokio::test]
async fn insert_many_skips_the_backend_for_empty_batches() {
    let backend = RecordingBackend::healthy();
    let inserted = backend.inserted.clone();
    let store = DocumentStore::new(backend);

    let ids = store.collection("users").insert_many(vec![]).await.unwrap();

    assert!(ids.is_empty());
    assert!(inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn page_totals_follow_the_requested_scope() {
    let backend = RecordingBackend::healthy();
    let counted = backend.counted.clone();
    let store = DocumentStore::new(backend);
    let orders = store.collection("orders");
    let query = Query::builder().filter(doc! { "status": "shipped" }).limit(1).build();

    let everything = orders.find_page(query.clone(), TotalScope::Collection).await.unwrap();
    let matching = orders.find_page(query, TotalScope::Matching).await.unwrap();

    assert_eq!(everything.total, 42);
    assert_eq!(matching.count(), 1);
    assert_eq!(
        counted.lock().unwrap().as_slice(),
        &[None, Some(doc! { "status": "shipped" })]
    );
}

#[test]
fn backend_can_be_recovered_from_the_store() {
    let store = DocumentStore::new(RecordingBackend::healthy());
    assert!(store.backend_as::<RecordingBackend>().is_some());
}
