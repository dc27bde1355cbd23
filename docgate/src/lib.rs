//! HTTP gateway exposing generic CRUD and query operations over document collections.
//!
//! Clients address any collection by name and documents by their ObjectId; the
//! gateway forwards filters, projections and sorts to the store and wraps every result
//! in a `{"success": ...}` envelope. Collections need no declaration.
//!
//! # Backends
//!
//! - [`memory`] - In-process storage, selected with a `memory://` connection string
//! - [`mongodb`] - MongoDB (requires the `mongodb` feature, enabled by default)
//!
//! # Embedding
//!
//! The router can be served from any tokio program:
//!
//! ```ignore
//! use std::sync::Arc;
//! use docgate::{app::{AppState, router}, memory::InMemoryStore, store::ConnectionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Arc::new(ConnectionManager::new());
//!     manager.connect(InMemoryStore::builder()).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//!     axum::serve(listener, router(AppState::new(manager))).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod logging;
pub mod prelude;
pub mod response;

pub use docgate_core::{backend, collection, document, page, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbStore, MongoDbStoreBuilder, store::DEFAULT_DATABASE};
}
