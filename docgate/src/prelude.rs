//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```

pub use docgate_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::Collection,
    document::{DocumentExt, ID_FIELD, bson_to_json, json_to_bson, parse_object_id},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, TotalScope},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::{ConnectionManager, DocumentStore},
};

pub use crate::{
    app::{AppState, router},
    config::Config,
    error::{ApiError, ApiResult},
};
