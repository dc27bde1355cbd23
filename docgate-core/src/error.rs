//! Error types and result types for document store operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// This enum covers conversion errors, connection lifecycle issues, malformed
/// client input and backend-specific errors.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization, connection setup or the initial liveness probe.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The store handle was requested before a connection was established.
    #[error("Database not initialized. Call connect first.")]
    Uninitialized,
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A supplied document identifier is not a 24 character hexadecimal string.
    #[error("Invalid document ID format: {0}")]
    InvalidId(String),
    /// The document has an invalid structure (for instance, it is not an object).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A filter, projection or sort specification could not be understood.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An error occurred in the underlying storage backend.
    #[error("{0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;
