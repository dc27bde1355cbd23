//! Named collection handles.
//!
//! A [`Collection`] pairs a collection name with a reference to the store backend and
//! exposes the operations the gateway performs against one collection. Collections are
//! schema-less and are created implicitly by the first write.
//!
//! # Example
//!
//! ```ignore
//! use docgate::store::DocumentStore;
//! use bson::doc;
//!
//! # async fn example(store: &DocumentStore) -> docgate::error::DocumentStoreResult<()> {
//! let orders = store.collection("orders");
//! let (id, _) = orders.insert_one(doc! { "status": "shipped" }).await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Document, oid::ObjectId};

use crate::{
    backend::DynStoreBackend,
    document::DocumentExt,
    error::DocumentStoreResult,
    page::{Page, TotalScope},
    query::Query,
};

/// A collection name bound to a backend reference.
#[derive(Debug)]
pub struct Collection<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts one document, assigning an [`ObjectId`] identity if it carries none.
    ///
    /// # Returns
    ///
    /// The identity and the document as stored.
    pub async fn insert_one(&self, mut document: Document) -> DocumentStoreResult<(Bson, Document)> {
        let id = document.ensure_id();

        self.backend
            .insert_documents(vec![document.clone()], self.name())
            .await?;

        Ok((id, document))
    }

    /// Inserts documents in order, assigning identities where missing.
    ///
    /// Insertion stops at the first failure; earlier documents stay inserted.
    ///
    /// # Returns
    ///
    /// The identities of the inserted documents, in input order.
    pub async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<Bson>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let documents = documents
            .into_iter()
            .map(|mut doc| {
                doc.ensure_id();
                doc
            })
            .collect();

        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    /// Retrieves a document by identity.
    pub async fn find_by_id(&self, id: ObjectId) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .find_document(Bson::ObjectId(id), self.name())
            .await
    }

    /// Merges `changes` into the document with the given identity.
    ///
    /// # Returns
    ///
    /// The merged document, or `None` if no document has that identity.
    pub async fn update_by_id(
        &self,
        id: ObjectId,
        changes: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .update_document(Bson::ObjectId(id), changes, self.name())
            .await
    }

    /// Deletes the document with the given identity.
    ///
    /// # Returns
    ///
    /// `true` if a document was removed.
    pub async fn delete_by_id(&self, id: ObjectId) -> DocumentStoreResult<bool> {
        self.backend
            .delete_document(Bson::ObjectId(id), self.name())
            .await
    }

    /// Runs a find specification.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .find_documents(query, self.name())
            .await
    }

    /// Counts matching documents, or every document when `filter` is `None`.
    pub async fn count(&self, filter: Option<Document>) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }

    /// Runs a find specification and counts the documents in `scope`.
    pub async fn find_page(&self, query: Query, scope: TotalScope) -> DocumentStoreResult<Page> {
        let count_filter = match scope {
            TotalScope::Collection => None,
            TotalScope::Matching => Some(query.filter.clone()),
        };

        let items = self.find(query).await?;
        let total = self.count(count_filter).await?;

        Ok(Page::builder(items)
            .with_total(total)
            .build())
    }
}
