//! # Query Layer
//!
//! Request-scoped query building: the parsed query string ([`QuerySpec`]),
//! the pending selection ([`RecordSelection`]) and the query-string
//! features that refine one into the other ([`QueryFeatures`]).

pub mod features;
pub mod selection;
pub mod spec;

pub use features::QueryFeatures;
pub use selection::{QueryContext, QueryHook, QueryHooks, QueryOperation, RecordSelection};
pub use spec::{QuerySpec, QueryValue};
