//! Document store handle and the process-wide connection manager.
//!
//! - [`DocumentStore`] wraps one backend chosen at runtime and hands out [`Collection`]s
//! - [`ConnectionManager`] owns the single live store for the process: it connects once,
//!   hands the handle to request handlers, and closes it on shutdown
//!
//! # Example
//!
//! ```ignore
//! use docgate::store::ConnectionManager;
//! use docgate::memory::InMemoryStore;
//!
//! let manager = ConnectionManager::new();
//! manager.connect(InMemoryStore::builder()).await?;
//!
//! let store = manager.database().await?;
//! let names = store.list_collections().await?;
//!
//! manager.close().await?;
//! ```

use mea::rwlock::RwLock;
use std::sync::Arc;

use crate::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A document store bound to a dynamically dispatched backend.
#[derive(Debug)]
pub struct DocumentStore {
    backend: Box<dyn DynStoreBackend>,
}

impl DocumentStore {
    /// Creates a new document store with the given backend.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self { backend: Box::new(backend) }
    }

    /// Gets a handle to the named collection.
    ///
    /// The collection does not need to exist; it is created by the first write.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a> {
        Collection::new(name.to_string(), &*self.backend)
    }

    /// Sends a liveness probe to the backend.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Releases backend resources.
    pub async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }

    /// Returns the concrete backend if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }
}

/// Owns the one live store of the process.
///
/// The manager is an explicit object rather than process-global state: it is created
/// by the entry point, connected once, and shared with request handlers through the
/// router state. Handlers call [`ConnectionManager::database`] per request.
///
/// There is no reconnection logic. A dropped connection surfaces as failures on
/// subsequent store calls.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    store: RwLock<Option<Arc<DocumentStore>>>,
}

impl ConnectionManager {
    /// Creates a manager with no connection.
    pub fn new() -> Self {
        Self { store: RwLock::new(None) }
    }

    /// Creates a manager that is already connected to `store`.
    pub fn connected(store: DocumentStore) -> Self {
        Self { store: RwLock::new(Some(Arc::new(store))) }
    }

    /// Builds the backend and sends the initial liveness probe.
    ///
    /// The connection is established exactly once: calling `connect` on a connected
    /// manager returns the existing handle without touching `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if the backend cannot be built or
    /// does not answer the liveness probe.
    pub async fn connect<B>(&self, builder: B) -> DocumentStoreResult<Arc<DocumentStore>>
    where
        B: StoreBackendBuilder,
        B::Backend: 'static,
    {
        let mut slot = self.store.write().await;

        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }

        let backend = builder.build().await?;
        StoreBackend::ping(&backend)
            .await
            .map_err(|e| DocumentStoreError::Initialization(format!("liveness probe failed: {e}")))?;

        let store = Arc::new(DocumentStore::new(backend));
        *slot = Some(store.clone());

        Ok(store)
    }

    /// Returns the active store handle.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Uninitialized`] before [`connect`](Self::connect)
    /// completed or after [`close`](Self::close).
    pub async fn database(&self) -> DocumentStoreResult<Arc<DocumentStore>> {
        self.store
            .read()
            .await
            .clone()
            .ok_or(DocumentStoreError::Uninitialized)
    }

    /// Returns whether a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.store.read().await.is_some()
    }

    /// Closes the connection.
    ///
    /// Does nothing if no connection was ever opened, so it is safe to call twice.
    pub async fn close(&self) -> DocumentStoreResult<()> {
        let store = self.store.write().await.take();

        match store {
            Some(store) => store.shutdown().await,
            None => Ok(()),
        }
    }
}
