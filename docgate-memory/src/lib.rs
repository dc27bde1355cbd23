//! In-memory document storage backend for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and backs the gateway when
//! it is started with a `memory://` connection string, as well as the HTTP test suite.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Mongo-style filters** - Comparison, membership, existence and logical operators
//!   over dotted field paths
//! - **Full find support** - Projection, multi-key sorting, skip and limit
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{store::DocumentStore, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!
//!     let (id, _) = store
//!         .collection("users")
//!         .insert_one(doc! { "name": "Alice" })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

pub mod store;
mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
