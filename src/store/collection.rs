//! # Collections
//!
//! A named, ordered set of JSON documents. Documents keep insertion order,
//! which makes sorts with equal keys deterministic. When the database has a
//! data directory every write rewrites the collection file atomically, and
//! the in-memory documents only change once that write has succeeded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::errors::{StoreError, StoreResult};
use super::filter::FilterSet;
use super::object_id::ObjectId;
use super::order::SortSpec;
use super::pipeline::Pipeline;
use super::projection::Projection;
use super::Document;

/// Field holding a document's id
pub const ID_FIELD: &str = "_id";

/// Options for [`Collection::find`]
///
/// Sorting is applied before skip/limit, projection last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Filter document
    pub filter: Document,

    /// Space-separated sort keys (`-field` for descending)
    pub sort: Option<String>,

    /// Space-separated projection (`-field` to exclude)
    pub projection: Option<String>,

    /// Number of matching documents to skip; negative values are rejected
    pub skip: i64,

    /// Maximum number of documents; a negative limit uses its absolute value
    pub limit: Option<i64>,
}

#[derive(Debug, Default)]
struct CollectionState {
    docs: Vec<Document>,
    unique: Vec<String>,
}

impl CollectionState {
    fn check_unique(&self, candidate: &Document) -> StoreResult<()> {
        let candidate_id = candidate.get(ID_FIELD);

        for field in &self.unique {
            let value = match candidate.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };

            let clash = self
                .docs
                .iter()
                .any(|d| d.get(ID_FIELD) != candidate_id && d.get(field) == Some(value));

            if clash {
                return Err(StoreError::DuplicateKey {
                    field: field.clone(),
                    value: display_value(value),
                });
            }
        }

        Ok(())
    }

    fn position(&self, filter: &FilterSet) -> Option<usize> {
        self.docs.iter().position(|d| filter.matches(d))
    }
}

async fn read_documents(path: &Path) -> StoreResult<Vec<Document>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Handle to one collection. Cloning is cheap and shares the documents.
#[derive(Debug, Clone)]
pub struct Collection {
    name: Arc<str>,
    path: Option<PathBuf>,
    state: Arc<RwLock<CollectionState>>,
    closed: Arc<AtomicBool>,
}

impl Collection {
    /// Open a collection, reading its file when one exists
    pub(crate) async fn load(
        name: &str,
        path: Option<PathBuf>,
        closed: Arc<AtomicBool>,
    ) -> StoreResult<Self> {
        let docs = match &path {
            Some(path) => read_documents(path).await?,
            None => Vec::new(),
        };

        tracing::debug!(collection = name, documents = docs.len(), "collection loaded");

        Ok(Self {
            name: Arc::from(name),
            path,
            state: Arc::new(RwLock::new(CollectionState {
                docs,
                unique: Vec::new(),
            })),
            closed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(AtomicOrdering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Reject future writes that repeat a value of `field`
    pub async fn create_unique_index(&self, field: &str) -> StoreResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        if state.unique.iter().any(|f| f == field) {
            return Ok(());
        }

        let mut seen: Vec<&Value> = Vec::new();
        for doc in &state.docs {
            if let Some(value) = doc.get(field).filter(|v| !v.is_null()) {
                if seen.contains(&value) {
                    return Err(StoreError::DuplicateKey {
                        field: field.to_string(),
                        value: display_value(value),
                    });
                }
                seen.push(value);
            }
        }

        state.unique.push(field.to_string());
        Ok(())
    }

    /// Insert a document, assigning an `_id` when it has none
    pub async fn insert_one(&self, mut doc: Document) -> StoreResult<Document> {
        self.ensure_open()?;

        match doc.get(ID_FIELD) {
            None | Some(Value::Null) => {
                doc.insert(ID_FIELD.to_string(), Value::String(ObjectId::new().to_string()));
            }
            Some(Value::String(id)) => {
                let id = ObjectId::parse(id)?;
                doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            }
            Some(other) => return Err(StoreError::InvalidId(other.to_string())),
        }

        let mut state = self.state.write().await;
        if state.docs.iter().any(|d| d.get(ID_FIELD) == doc.get(ID_FIELD)) {
            return Err(StoreError::DuplicateKey {
                field: ID_FIELD.to_string(),
                value: display_value(&doc[ID_FIELD]),
            });
        }
        state.check_unique(&doc)?;

        let mut next = state.docs.clone();
        next.push(doc.clone());
        self.persist(&next).await?;
        state.docs = next;

        Ok(doc)
    }

    /// Run a query
    pub async fn find(&self, options: &FindOptions) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;

        let filter = FilterSet::from_document(&options.filter)?;
        let sort = match &options.sort {
            Some(spec) => SortSpec::parse(spec)?,
            None => SortSpec::default(),
        };
        let projection = match &options.projection {
            Some(spec) => Projection::parse(spec)?,
            None => None,
        };
        let skip = usize::try_from(options.skip).map_err(|_| {
            StoreError::invalid_query(format!("skip must be non-negative, got {}", options.skip))
        })?;
        let limit = options
            .limit
            .filter(|l| *l != 0)
            .map(|l| usize::try_from(l.unsigned_abs()).unwrap_or(usize::MAX));

        let mut matched: Vec<Document> = {
            let state = self.state.read().await;
            state.docs.iter().filter(|d| filter.matches(d)).cloned().collect()
        };

        sort.apply(&mut matched);

        let page = matched
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX));

        Ok(match projection {
            Some(projection) => page.map(|d| projection.apply(d)).collect(),
            None => page.collect(),
        })
    }

    /// Number of documents matching a filter
    pub async fn count(&self, filter: &Document) -> StoreResult<usize> {
        self.ensure_open()?;
        let filter = FilterSet::from_document(filter)?;
        let state = self.state.read().await;
        Ok(state.docs.iter().filter(|d| filter.matches(d)).count())
    }

    /// Set fields on the first matching document and return it as updated
    pub async fn find_one_and_update(
        &self,
        filter: &Document,
        set: Document,
    ) -> StoreResult<Option<Document>> {
        self.ensure_open()?;
        let filter = FilterSet::from_document(filter)?;

        let mut state = self.state.write().await;
        let Some(idx) = state.position(&filter) else {
            return Ok(None);
        };

        let mut updated = state.docs[idx].clone();
        for (key, value) in set {
            if key != ID_FIELD {
                updated.insert(key, value);
            }
        }
        state.check_unique(&updated)?;

        let mut next = state.docs.clone();
        next[idx] = updated.clone();
        self.persist(&next).await?;
        state.docs = next;

        Ok(Some(updated))
    }

    /// Remove the first matching document and return it
    pub async fn find_one_and_delete(&self, filter: &Document) -> StoreResult<Option<Document>> {
        self.ensure_open()?;
        let filter = FilterSet::from_document(filter)?;

        let mut state = self.state.write().await;
        let Some(idx) = state.position(&filter) else {
            return Ok(None);
        };

        let mut next = state.docs.clone();
        let removed = next.remove(idx);
        self.persist(&next).await?;
        state.docs = next;

        Ok(Some(removed))
    }

    /// Remove every matching document
    pub async fn delete_many(&self, filter: &Document) -> StoreResult<u64> {
        self.ensure_open()?;
        let filter = FilterSet::from_document(filter)?;

        let mut state = self.state.write().await;
        let next: Vec<Document> = state
            .docs
            .iter()
            .filter(|d| !filter.matches(d))
            .cloned()
            .collect();
        let deleted = (state.docs.len() - next.len()) as u64;

        if deleted > 0 {
            self.persist(&next).await?;
            state.docs = next;
        }
        Ok(deleted)
    }

    /// Run an aggregation pipeline over every document
    pub async fn aggregate(&self, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let snapshot = self.state.read().await.docs.clone();
        pipeline.run(snapshot)
    }

    /// Write the collection file, if any
    pub(crate) async fn flush(&self) -> StoreResult<()> {
        let state = self.state.read().await;
        self.persist(&state.docs).await
    }

    async fn persist(&self, docs: &[Document]) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(docs).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::io(path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn collection() -> Collection {
        Collection::load("tours", None, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap()
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let coll = collection().await;
        let doc = coll.insert_one(doc(json!({"name": "A"}))).await.unwrap();
        let id = doc["_id"].as_str().unwrap();
        assert!(ObjectId::parse(id).is_ok());
        assert_eq!(coll.count(&Document::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_with_options() {
        let coll = collection().await;
        for i in 0..10 {
            coll.insert_one(doc(json!({"idx": i, "even": i % 2 == 0, "__v": 0})))
                .await
                .unwrap();
        }

        let options = FindOptions {
            filter: doc(json!({"even": "true"})),
            sort: Some("-idx".to_string()),
            projection: Some("-__v".to_string()),
            skip: 1,
            limit: Some(2),
        };
        let found = coll.find(&options).await.unwrap();

        let idx: Vec<_> = found.iter().map(|d| d["idx"].as_i64().unwrap()).collect();
        assert_eq!(idx, vec![6, 4]);
        assert!(found.iter().all(|d| !d.contains_key("__v")));
    }

    #[tokio::test]
    async fn test_negative_skip_rejected() {
        let coll = collection().await;
        let options = FindOptions {
            skip: -10,
            ..Default::default()
        };
        assert!(matches!(
            coll.find(&options).await,
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_unique_index() {
        let coll = collection().await;
        coll.create_unique_index("name").await.unwrap();

        let first = coll.insert_one(doc(json!({"name": "A"}))).await.unwrap();
        let second = coll.insert_one(doc(json!({"name": "B"}))).await.unwrap();
        assert!(matches!(
            coll.insert_one(doc(json!({"name": "A"}))).await,
            Err(StoreError::DuplicateKey { .. })
        ));

        // Rewriting a document with its own value is fine
        let filter = doc(json!({"_id": first["_id"].clone()}));
        assert!(coll
            .find_one_and_update(&filter, doc(json!({"name": "A"})))
            .await
            .unwrap()
            .is_some());

        let filter = doc(json!({"_id": second["_id"].clone()}));
        assert!(coll
            .find_one_and_update(&filter, doc(json!({"name": "A"})))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let coll = collection().await;
        let inserted = coll
            .insert_one(doc(json!({"name": "A", "price": 100})))
            .await
            .unwrap();
        let filter = doc(json!({"_id": inserted["_id"].clone()}));

        let updated = coll
            .find_one_and_update(&filter, doc(json!({"price": 200, "_id": "ignored"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["price"], json!(200));
        assert_eq!(updated["_id"], inserted["_id"]);

        let removed = coll.find_one_and_delete(&filter).await.unwrap();
        assert!(removed.is_some());
        assert!(coll.find_one_and_delete(&filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_collection() {
        let closed = Arc::new(AtomicBool::new(false));
        let coll = Collection::load("tours", None, closed.clone()).await.unwrap();
        closed.store(true, AtomicOrdering::Release);
        assert!(matches!(
            coll.find(&FindOptions::default()).await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_documents_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tours.json");
        let coll = Collection::load("tours", Some(path.clone()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        coll.create_unique_index("name").await.unwrap();
        let kept = coll.insert_one(doc(json!({"name": "Kept"}))).await.unwrap();

        // A directory in place of the temp file makes every write fail
        let blocker = path.with_extension("json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        assert!(matches!(
            coll.insert_one(doc(json!({"name": "Lost"}))).await,
            Err(StoreError::Io { .. })
        ));
        let filter = doc(json!({"_id": kept["_id"].clone()}));
        assert!(coll
            .find_one_and_update(&filter, doc(json!({"name": "Renamed"})))
            .await
            .is_err());
        assert!(coll.find_one_and_delete(&filter).await.is_err());
        assert!(coll.delete_many(&Document::new()).await.is_err());

        let docs = coll.find(&FindOptions::default()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], json!("Kept"));

        // Once writes work again the same insert is accepted
        std::fs::remove_dir(&blocker).unwrap();
        coll.insert_one(doc(json!({"name": "Lost"}))).await.unwrap();
        assert_eq!(coll.count(&Document::new()).await.unwrap(), 2);
    }
}
