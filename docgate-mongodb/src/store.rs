use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, Database,
    options::{ClientOptions, FindOptions, ReturnDocument, ServerApi, ServerApiVersion},
};

use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, Sort},
};

/// Database used when neither the builder nor the connection string names one.
pub const DEFAULT_DATABASE: &str = "test";

fn backend_error(e: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}

/// MongoDB backed document store.
///
/// Filters, projections and sort documents are handed to the server as they are, so the
/// full MongoDB query language is available to callers.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    /// Creates a builder for the given connection string.
    pub fn builder(dsn: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn)
    }

    /// Name of the database this store operates on.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database().collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        self.database()
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let ids = documents
            .iter()
            .map(|doc| {
                doc.get(ID_FIELD)
                    .cloned()
                    .ok_or_else(|| DocumentStoreError::InvalidDocument("document has no _id".into()))
            })
            .collect::<DocumentStoreResult<Vec<Bson>>>()?;

        // insert_many is ordered: the server stops at the first failing document
        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(backend_error)?;

        Ok(ids)
    }

    async fn find_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(doc! { ID_FIELD: id })
            .await
            .map_err(backend_error)
    }

    async fn update_document(&self, id: Bson, changes: Document, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_update(doc! { ID_FIELD: id }, doc! { "$set": changes })
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend_error)
    }

    async fn delete_document(&self, id: Bson, collection: &str) -> DocumentStoreResult<bool> {
        let result = self.get_collection(collection)
            .delete_one(doc! { ID_FIELD: id })
            .await
            .map_err(backend_error)?;

        Ok(result.deleted_count > 0)
    }

    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.effective_limit() {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.skip {
            options.skip = Some(skip);
        }
        if !query.sort.is_empty() {
            options.sort = Some(Sort::to_document(&query.sort));
        }
        options.projection = query.projection;

        self.get_collection(collection)
            .find(query.filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn count_documents(&self, filter: Option<Document>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter.unwrap_or_default())
            .await
            .map_err(backend_error)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.database()
            .list_collection_names()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Connects a [`MongoDbStore`].
///
/// The client is configured for the stable server API (version 1, strict, with
/// deprecation errors). Connecting itself is lazy; the first round trip to the server
/// happens on the liveness probe.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: None,
        }
    }

    /// Overrides the database named in the connection string.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Parses the connection string into driver options and picks the database, without
    /// touching the network.
    ///
    /// The database is the one set on the builder, else the one named in the connection
    /// string, else [`DEFAULT_DATABASE`].
    pub async fn resolve(&self) -> DocumentStoreResult<(ClientOptions, String)> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        options.server_api = Some(
            ServerApi::builder()
                .version(ServerApiVersion::V1)
                .strict(true)
                .deprecation_errors(true)
                .build(),
        );

        let database = self
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        Ok((options, database))
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let (options, database) = self.resolve().await?;

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_v1() -> ServerApi {
        ServerApi::builder()
            .version(ServerApiVersion::V1)
            .strict(true)
            .deprecation_errors(true)
            .build()
    }

    #[tokio::test]
    async fn database_comes_from_the_connection_string() {
        let (options, database) = MongoDbStore::builder("mongodb://localhost:27017/shop")
            .resolve()
            .await
            .unwrap();

        assert_eq!(database, "shop");
        assert_eq!(options.server_api, Some(strict_v1()));
    }

    #[tokio::test]
    async fn database_falls_back_to_test() {
        let (_, database) = MongoDbStore::builder("mongodb://localhost:27017")
            .resolve()
            .await
            .unwrap();

        assert_eq!(database, DEFAULT_DATABASE);
    }

    #[tokio::test]
    async fn builder_database_overrides_the_connection_string() {
        let store = MongoDbStore::builder("mongodb://localhost:27017/shop")
            .database("inventory")
            .build()
            .await
            .unwrap();

        assert_eq!(store.database_name(), "inventory");
    }

    #[tokio::test]
    async fn malformed_connection_strings_fail_initialization() {
        let err = MongoDbStore::builder("postgres://localhost/shop")
            .resolve()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
    }
}
