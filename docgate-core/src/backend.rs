//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over concrete document databases,
//! allowing the gateway to run against MongoDB in production and an in-memory store
//! in tests.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: An object-safe mirror used for dynamic dispatch
//! - [`StoreBackendBuilder`]: Factory trait for creating (connecting) backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docgate::backend::StoreBackend;
//! use docgate::query::Query;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.insert_documents(vec![doc! { "_id": 1, "name": "Alice" }], "users").await?;
//! let users = backend.find_documents(Query::new(), "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{any::Any, fmt::Debug};

use crate::{error::DocumentStoreResult, query::Query};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. A single backend instance is shared by every in-flight request.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Failures reported by the underlying database surface as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend) carrying
/// the database's own message. Nothing is retried.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Sends a liveness probe to the database.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Inserts documents into a collection, in order.
    ///
    /// Every document must already carry an `_id`. The collection is created if it
    /// doesn't exist. Insertion stops at the first failure; documents inserted before
    /// the failure stay inserted.
    ///
    /// # Returns
    ///
    /// The inserted identities, in input order.
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Retrieves the document whose `_id` equals `id`.
    async fn find_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<Option<Document>>;

    /// Merges `changes` into the document whose `_id` equals `id`.
    ///
    /// Only the fields present in `changes` are overwritten; dotted keys address
    /// nested fields.
    ///
    /// # Returns
    ///
    /// The document as it exists after the merge, or `None` if nothing matched.
    async fn update_document(
        &self,
        id: Bson,
        changes: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Deletes the document whose `_id` equals `id`.
    ///
    /// # Returns
    ///
    /// `true` if a document was removed.
    async fn delete_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<bool>;

    /// Runs a find specification against a collection.
    ///
    /// A missing collection behaves like an empty one.
    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Counts the documents matching `filter`, or all documents when `filter` is `None`.
    async fn count_documents(
        &self,
        filter: Option<Document>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Releases backend resources. Calls after the first are no-ops.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Object-safe counterpart of [`StoreBackend`].
///
/// Every [`StoreBackend`] implements this trait automatically, so a backend chosen at
/// runtime can be stored as `Box<dyn DynStoreBackend>`.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn ping(&self) -> DocumentStoreResult<()>;
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn find_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<Option<Document>>;
    async fn update_document(
        &self,
        id: Bson,
        changes: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn delete_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<bool>;
    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>>;
    async fn count_documents(
        &self,
        filter: Option<Document>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown(&self) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn ping(&self) -> DocumentStoreResult<()> {
        StoreBackend::ping(self).await
    }

    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn find_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_document(self, id, collection).await
    }

    async fn update_document(
        &self,
        id: Bson,
        changes: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::update_document(self, id, changes, collection).await
    }

    async fn delete_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<bool> {
        StoreBackend::delete_document(self, id, collection).await
    }

    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find_documents(self, query, collection).await
    }

    async fn count_documents(
        &self,
        filter: Option<Document>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds (and connects) a backend.
#[async_trait]
pub trait StoreBackendBuilder: Send {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
