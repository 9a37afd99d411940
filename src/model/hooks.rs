//! # Lifecycle Hooks
//!
//! Explicit, ordered callbacks that the model invokes around writes,
//! queries and aggregations. Nothing is registered implicitly: a model is
//! built with the list it runs.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::query::{QueryContext, QueryHook, QueryHooks};
use crate::store::{Document, Pipeline};

/// Runs around document creation
pub trait SaveHook: Send + Sync {
    /// Runs after validation, before the document is written
    fn before_save(&self, _doc: &mut Document) {}

    /// Runs once the document is stored
    fn after_save(&self, _doc: &Document) {}
}

/// Runs before an aggregation pipeline executes
pub trait AggregateHook: Send + Sync {
    fn before_aggregate(&self, pipeline: &mut Pipeline);
}

/// Every hook a model runs, in registration order per kind
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    save: Vec<Arc<dyn SaveHook>>,
    query: QueryHooks,
    aggregate: Vec<Arc<dyn AggregateHook>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_save(mut self, hook: impl SaveHook + 'static) -> Self {
        self.save.push(Arc::new(hook));
        self
    }

    pub fn on_query(mut self, hook: impl QueryHook + 'static) -> Self {
        self.query = self.query.with(hook);
        self
    }

    pub fn on_aggregate(mut self, hook: impl AggregateHook + 'static) -> Self {
        self.aggregate.push(Arc::new(hook));
        self
    }

    pub fn query(&self) -> &QueryHooks {
        &self.query
    }

    pub fn run_before_save(&self, doc: &mut Document) {
        for hook in &self.save {
            hook.before_save(doc);
        }
    }

    pub fn run_after_save(&self, doc: &Document) {
        for hook in &self.save {
            hook.after_save(doc);
        }
    }

    pub fn run_before_aggregate(&self, pipeline: &mut Pipeline) {
        for hook in &self.aggregate {
            hook.before_aggregate(pipeline);
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("save", &self.save.len())
            .field("query", &self.query.len())
            .field("aggregate", &self.aggregate.len())
            .finish()
    }
}

// ==================
// General purpose hooks
// ==================

/// Logs writes at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveLogger;

impl SaveHook for SaveLogger {
    fn before_save(&self, _doc: &mut Document) {
        tracing::debug!("will save document");
    }

    fn after_save(&self, doc: &Document) {
        tracing::debug!(document = %serde_json::Value::Object(doc.clone()), "document saved");
    }
}

/// Measures how long each query takes
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTimer;

impl QueryHook for QueryTimer {
    fn before_query(&self, ctx: &mut QueryContext) {
        ctx.started_at = Some(Instant::now());
    }

    fn after_query(&self, ctx: &QueryContext, returned: usize) {
        if let Some(started) = ctx.started_at {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            tracing::info!(
                operation = ctx.operation.as_str(),
                returned,
                elapsed_ms,
                "query took {} milliseconds",
                elapsed_ms
            );
        }
    }
}

/// Logs each pipeline before it runs
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineLogger;

impl AggregateHook for PipelineLogger {
    fn before_aggregate(&self, pipeline: &mut Pipeline) {
        tracing::debug!(stages = ?pipeline.stages(), "running aggregation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryOperation;
    use crate::store::Stage;
    use serde_json::{json, Value};

    struct Stamp(&'static str);

    impl SaveHook for Stamp {
        fn before_save(&self, doc: &mut Document) {
            let trail = doc
                .get("trail")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            doc.insert("trail".to_string(), json!(format!("{}{}", trail, self.0)));
        }
    }

    struct LimitTo(usize);

    impl AggregateHook for LimitTo {
        fn before_aggregate(&self, pipeline: &mut Pipeline) {
            pipeline.prepend(Stage::Limit(self.0));
        }
    }

    #[test]
    fn test_save_hooks_run_in_order() {
        let hooks = LifecycleHooks::new()
            .on_save(Stamp("a"))
            .on_save(SaveLogger)
            .on_save(Stamp("b"));

        let mut doc = Document::new();
        hooks.run_before_save(&mut doc);
        hooks.run_after_save(&doc);
        assert_eq!(doc["trail"], json!("ab"));
    }

    #[test]
    fn test_aggregate_hooks() {
        let hooks = LifecycleHooks::new()
            .on_aggregate(LimitTo(3))
            .on_aggregate(PipelineLogger);

        let mut pipeline = Pipeline::new();
        hooks.run_before_aggregate(&mut pipeline);
        assert_eq!(pipeline.stages(), &[Stage::Limit(3)]);
    }

    #[test]
    fn test_query_timer_records_start() {
        let hooks = LifecycleHooks::new().on_query(QueryTimer);
        let mut ctx = QueryContext::new(QueryOperation::Find, Document::new());
        hooks.query().run_before(&mut ctx);
        assert!(ctx.started_at.is_some());
        hooks.query().run_after(&ctx, 0);
    }

    #[test]
    fn test_save_logger_formats_document() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let hooks = LifecycleHooks::new().on_save(SaveLogger);
            let mut doc = json!({"name": "The Forest Hiker"}).as_object().cloned().unwrap();
            hooks.run_before_save(&mut doc);
            hooks.run_after_save(&doc);
            assert_eq!(doc["name"], "The Forest Hiker");
        });
    }
}
