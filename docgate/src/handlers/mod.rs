//! Request handlers.

pub mod data;
pub mod service;
