//! tours-api - A REST service for tours backed by a document store
//!
//! Layers, bottom up:
//! - [`store`]: explicit database handle and JSON document collections
//! - [`query`]: record selections and the query-string feature builder
//! - [`model`]: tour schema, validation rules, lifecycle hooks, aggregations
//! - [`rest_api`]: axum routes, response envelope, error mapping
//! - [`cli`]: `serve`, `import` and `delete` commands

pub mod cli;
pub mod config;
pub mod model;
pub mod observability;
pub mod query;
pub mod rest_api;
pub mod store;
