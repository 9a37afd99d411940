//! # Record Selection
//!
//! A pending request for records of one collection. Built up with named
//! methods, then executed exactly once with [`RecordSelection::exec`].
//!
//! Query hooks run around execution: `before_query` may rewrite the filter
//! (for instance to hide records), `after_query` sees the number of records
//! returned.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::store::{Collection, Document, FindOptions, StoreResult};

/// Kind of query being run, as reported to hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperation {
    Find,
    FindOne,
    FindOneAndUpdate,
    FindOneAndDelete,
}

impl QueryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::Find => "find",
            QueryOperation::FindOne => "findOne",
            QueryOperation::FindOneAndUpdate => "findOneAndUpdate",
            QueryOperation::FindOneAndDelete => "findOneAndDelete",
        }
    }
}

/// State shared with hooks for one query
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub operation: QueryOperation,
    pub filter: Document,
    pub started_at: Option<Instant>,
}

impl QueryContext {
    pub fn new(operation: QueryOperation, filter: Document) -> Self {
        Self {
            operation,
            filter,
            started_at: None,
        }
    }
}

/// A callback run around every query
pub trait QueryHook: Send + Sync {
    /// Runs before the store is queried
    fn before_query(&self, _ctx: &mut QueryContext) {}

    /// Runs after the store answered
    fn after_query(&self, _ctx: &QueryContext, _returned: usize) {}
}

/// Ordered list of query hooks
#[derive(Clone, Default)]
pub struct QueryHooks {
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl QueryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl QueryHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn run_before(&self, ctx: &mut QueryContext) {
        for hook in &self.hooks {
            hook.before_query(ctx);
        }
    }

    pub fn run_after(&self, ctx: &QueryContext, returned: usize) {
        for hook in &self.hooks {
            hook.after_query(ctx, returned);
        }
    }
}

impl fmt::Debug for QueryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHooks")
            .field("len", &self.hooks.len())
            .finish()
    }
}

/// Builder for a pending query against a collection
#[derive(Debug, Clone)]
pub struct RecordSelection {
    collection: Collection,
    hooks: QueryHooks,
    operation: QueryOperation,
    options: FindOptions,
}

impl RecordSelection {
    /// Select every record of the collection
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            hooks: QueryHooks::new(),
            operation: QueryOperation::Find,
            options: FindOptions::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: QueryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Add filter conditions. A field already constrained is replaced.
    pub fn find(mut self, conditions: Document) -> Self {
        for (field, condition) in conditions {
            self.options.filter.insert(field, condition);
        }
        self
    }

    /// Add one equality condition
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        let mut conditions = Document::new();
        conditions.insert(field.to_string(), value.into());
        self.find(conditions)
    }

    /// Set the sort order, e.g. `price -ratingsAverage`
    pub fn sort(mut self, order: &str) -> Self {
        self.options.sort = Some(order.to_string());
        self
    }

    /// Restrict returned fields, e.g. `name price` or `-__v`
    pub fn select(mut self, fields: &str) -> Self {
        self.options.projection = Some(fields.to_string());
        self
    }

    pub fn skip(mut self, count: i64) -> Self {
        self.options.skip = count;
        self
    }

    pub fn limit(mut self, count: i64) -> Self {
        self.options.limit = Some(count);
        self
    }

    /// Turn into a single-record query
    pub fn one(mut self) -> Self {
        self.operation = QueryOperation::FindOne;
        self.options.limit = Some(1);
        self
    }

    pub fn conditions(&self) -> &Document {
        &self.options.filter
    }

    pub fn sort_order(&self) -> Option<&str> {
        self.options.sort.as_deref()
    }

    pub fn projection(&self) -> Option<&str> {
        self.options.projection.as_deref()
    }

    pub fn skip_count(&self) -> i64 {
        self.options.skip
    }

    pub fn limit_count(&self) -> Option<i64> {
        self.options.limit
    }

    pub fn operation(&self) -> QueryOperation {
        self.operation
    }

    /// Run the query
    pub async fn exec(self) -> StoreResult<Vec<Document>> {
        let RecordSelection {
            collection,
            hooks,
            operation,
            mut options,
        } = self;

        let mut ctx = QueryContext::new(operation, std::mem::take(&mut options.filter));
        hooks.run_before(&mut ctx);
        options.filter = ctx.filter.clone();

        let records = collection.find(&options).await?;
        hooks.run_after(&ctx, records.len());

        Ok(records)
    }

    /// Run the query and keep the first record
    pub async fn exec_one(self) -> StoreResult<Option<Document>> {
        Ok(self.one().exec().await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seeded() -> Collection {
        let db = Database::in_memory().await.unwrap();
        let tours = db.collection("tours").await.unwrap();
        for (name, price) in [("A", 397), ("B", 997), ("C", 1497)] {
            tours
                .insert_one(json!({"name": name, "price": price}).as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        tours
    }

    #[tokio::test]
    async fn test_builder_accumulates() {
        let selection = RecordSelection::new(seeded().await)
            .where_eq("name", "A")
            .sort("-price")
            .select("name")
            .skip(0)
            .limit(5);

        assert_eq!(selection.conditions().len(), 1);
        assert_eq!(selection.sort_order(), Some("-price"));
        assert_eq!(selection.projection(), Some("name"));
        assert_eq!(selection.limit_count(), Some(5));

        let found = selection.exec().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], "A");
    }

    struct HideExpensive {
        after_calls: Arc<AtomicUsize>,
    }

    impl QueryHook for HideExpensive {
        fn before_query(&self, ctx: &mut QueryContext) {
            ctx.filter
                .insert("price".to_string(), json!({"$lt": 1000}));
        }

        fn after_query(&self, _ctx: &QueryContext, returned: usize) {
            self.after_calls.fetch_add(returned, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_hooks_wrap_execution() {
        let after_calls = Arc::new(AtomicUsize::new(0));
        let hooks = QueryHooks::new().with(HideExpensive {
            after_calls: after_calls.clone(),
        });

        let found = RecordSelection::new(seeded().await)
            .with_hooks(hooks)
            .sort("price")
            .exec()
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(after_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exec_one() {
        let found = RecordSelection::new(seeded().await)
            .where_eq("price", "997")
            .exec_one()
            .await
            .unwrap();
        assert_eq!(found.unwrap()["name"], "B");
    }
}
