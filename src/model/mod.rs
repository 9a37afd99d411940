//! # Model Layer
//!
//! Schema casting, the validation rule table, lifecycle hooks and the tour
//! model built from them.

pub mod errors;
pub mod hooks;
pub mod rules;
pub mod schema;
pub mod stats;
pub mod tour;

pub use errors::{FieldError, ModelError, ModelResult, ValidationErrors};
pub use hooks::{AggregateHook, LifecycleHooks, PipelineLogger, QueryTimer, SaveHook, SaveLogger};
pub use rules::{Rule, RuleKind};
pub use schema::{CastMode, FieldDef, FieldKind, Schema, VirtualField, VERSION_FIELD};
pub use stats::{monthly_plan, tour_stats};
pub use tour::{tour_schema, HideSecretTours, SlugFromName, TourModel};
