//! Core of the docgate project: a thin abstraction over JSON document stores.
//!
//! This crate provides:
//!
//! - **Documents** ([`document`]) - Schema-less documents, identity parsing and JSON conversion
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Find specifications** ([`query`]) - Filters, projections, sort keys and bounds
//! - **Collections** ([`collection`]) - Per-collection operations used by the HTTP routes
//! - **Store and connection management** ([`store`]) - The shared store handle and its lifecycle
//! - **Result pages** ([`page`]) - Page of documents plus a total count
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::{store::ConnectionManager, query::Query};
//! use bson::doc;
//!
//! let manager = ConnectionManager::new();
//! let store = manager.connect(backend_builder).await?;
//!
//! let orders = store.collection("orders");
//! orders.insert_one(doc! { "status": "shipped" }).await?;
//! let shipped = orders.find(Query::builder().filter(doc! { "status": "shipped" }).build()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod page;
pub mod query;
pub mod store;

#[cfg(test)]
mod tests;
