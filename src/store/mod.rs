//! # Document Store
//!
//! An explicit document store: a [`Database`] handle giving access to named
//! [`Collection`]s of JSON documents, with filter documents, sorting,
//! projection, pagination, unique indexes and a small aggregation pipeline.

pub mod collection;
pub mod database;
pub mod errors;
pub mod filter;
pub mod object_id;
pub mod order;
pub mod pipeline;
pub mod projection;

/// A stored document
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use collection::{Collection, FindOptions, ID_FIELD};
pub use database::{Database, StoreConfig};
pub use errors::{StoreError, StoreResult};
pub use filter::{FilterExpr, FilterOperator, FilterSet};
pub use object_id::ObjectId;
pub use pipeline::{Accumulator, Group, GroupKey, Pipeline, Stage};
