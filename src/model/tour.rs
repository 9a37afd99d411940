//! # Tour Model
//!
//! The tour schema and the model that owns every read and write of the
//! `tours` collection. The model runs casting, the rule table and the
//! lifecycle hooks; handlers never touch the collection directly.

use chrono::Utc;
use serde_json::{json, Value};

use super::errors::ModelResult;
use super::hooks::{AggregateHook, LifecycleHooks, PipelineLogger, QueryTimer, SaveHook, SaveLogger};
use super::rules::{Rule, RuleKind};
use super::schema::{format_date, CastMode, FieldDef, FieldKind, Schema, VirtualField, VERSION_FIELD};
use crate::query::{QueryContext, QueryHook, QueryOperation, RecordSelection};
use crate::store::pipeline::number_value;
use crate::store::{Collection, Database, Document, FindOptions, ObjectId, Pipeline, Stage, ID_FIELD};

/// Name of the backing collection
pub const TOURS_COLLECTION: &str = "tours";

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

/// Build the tour schema
pub fn tour_schema() -> Schema {
    use FieldKind::*;

    Schema {
        model: "Tour",
        fields: vec![
            FieldDef::new("name", String).trimmed(),
            FieldDef::new("duration", Number),
            FieldDef::new("maxGroupSize", Number),
            FieldDef::new("difficulty", String),
            FieldDef::new("rating", Number).with_default(|| json!(4.5)),
            FieldDef::new("ratingsAverage", Number).with_default(|| json!(4.5)),
            FieldDef::new("ratingsQuantity", Number).with_default(|| json!(0)),
            FieldDef::new("price", Number),
            FieldDef::new("priceDiscount", Number),
            FieldDef::new("summary", String).trimmed(),
            FieldDef::new("description", String).trimmed(),
            FieldDef::new("imageCover", String).trimmed(),
            FieldDef::new("images", StringArray).with_default(|| json!([])),
            FieldDef::new("createdAt", Date).with_default(|| json!(format_date(&Utc::now()))),
            FieldDef::new("startDates", DateArray).with_default(|| json!([])),
            FieldDef::new("slug", String),
            FieldDef::new("secretTour", Boolean).with_default(|| json!(false)),
        ],
        rules: vec![
            Rule::new("name", RuleKind::Required, "A tour must have a name!"),
            Rule::new(
                "name",
                RuleKind::MaxLength(40),
                "A tour name must have less or equal than 40 characters!",
            ),
            Rule::new(
                "name",
                RuleKind::MinLength(10),
                "A tour name must have more or equal than 10 characters!",
            ),
            Rule::new(
                "name",
                RuleKind::Custom(is_alphabetic),
                "Tour name must only contain characters!",
            ),
            Rule::new("duration", RuleKind::Required, "A tour must have a duration!"),
            Rule::new("maxGroupSize", RuleKind::Required, "A tour must have a group size!"),
            Rule::new("difficulty", RuleKind::Required, "A tour must have a difficulty!"),
            Rule::new(
                "difficulty",
                RuleKind::OneOf(DIFFICULTIES),
                "Difficulty is either: easy, medium or difficult!",
            ),
            Rule::new("rating", RuleKind::Min(1.0), "Rating must be above 1.0!"),
            Rule::new("rating", RuleKind::Max(5.0), "Rating must be below 5.0!"),
            Rule::new("price", RuleKind::Required, "A tour must have a price!"),
            Rule::new(
                "priceDiscount",
                RuleKind::Custom(discount_below_price),
                "Discount price ({VALUE}) should be below regular price!",
            ),
            Rule::new("summary", RuleKind::Required, "A tour must have a summary!"),
            Rule::new("imageCover", RuleKind::Required, "A tour must have a cover image!"),
        ],
        unique: vec!["name"],
        virtuals: vec![
            VirtualField {
                name: "id",
                compute: |doc| doc.get(ID_FIELD).cloned(),
            },
            VirtualField {
                name: "durationWeeks",
                compute: |doc| {
                    doc.get("duration")
                        .and_then(Value::as_f64)
                        .map(|days| number_value(days / 7.0))
                },
            },
        ],
    }
}

/// Letters and spaces only
fn is_alphabetic(value: &Value, _doc: &Document) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.chars().all(|c| c.is_alphabetic() || c == ' '))
}

fn discount_below_price(value: &Value, doc: &Document) -> bool {
    match (value.as_f64(), doc.get("price").and_then(Value::as_f64)) {
        (Some(discount), Some(price)) => discount < price,
        _ => false,
    }
}

/// Lower-case, hyphen separated form of a name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

// ==================
// Tour hooks
// ==================

/// Derives `slug` from `name` on every save
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugFromName;

impl SaveHook for SlugFromName {
    fn before_save(&self, doc: &mut Document) {
        if let Some(name) = doc.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            doc.insert("slug".to_string(), Value::String(slug));
        }
    }
}

/// Keeps secret tours out of every query and aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct HideSecretTours;

impl HideSecretTours {
    fn condition() -> Document {
        let mut conditions = Document::new();
        conditions.insert("secretTour".to_string(), json!({"$ne": true}));
        conditions
    }
}

impl QueryHook for HideSecretTours {
    fn before_query(&self, ctx: &mut QueryContext) {
        ctx.filter.extend(Self::condition());
    }
}

impl AggregateHook for HideSecretTours {
    fn before_aggregate(&self, pipeline: &mut Pipeline) {
        pipeline.prepend(Stage::Match(Self::condition()));
    }
}

/// The hooks a tour model runs
pub fn tour_hooks() -> LifecycleHooks {
    LifecycleHooks::new()
        .on_save(SlugFromName)
        .on_save(SaveLogger)
        .on_query(HideSecretTours)
        .on_query(QueryTimer)
        .on_aggregate(HideSecretTours)
        .on_aggregate(PipelineLogger)
}

// ==================
// Model
// ==================

/// Reads and writes tours
#[derive(Debug, Clone)]
pub struct TourModel {
    collection: Collection,
    schema: Schema,
    hooks: LifecycleHooks,
}

impl TourModel {
    /// Bind the model to a database and create its unique indexes
    pub async fn init(db: &Database) -> ModelResult<Self> {
        Self::with_hooks(db, tour_hooks()).await
    }

    pub async fn with_hooks(db: &Database, hooks: LifecycleHooks) -> ModelResult<Self> {
        let collection = db.collection(TOURS_COLLECTION).await?;
        let schema = tour_schema();
        for field in &schema.unique {
            collection.create_unique_index(field).await?;
        }

        Ok(Self {
            collection,
            schema,
            hooks,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Selection over every (visible) tour
    pub fn find(&self) -> RecordSelection {
        RecordSelection::new(self.collection.clone()).with_hooks(self.hooks.query().clone())
    }

    /// Fetch one tour, without its version field
    pub async fn find_by_id(&self, id: &str) -> ModelResult<Option<Document>> {
        let id = ObjectId::parse(id)?;
        let tour = self
            .find()
            .where_eq(ID_FIELD, id.as_str())
            .select("-__v")
            .exec_one()
            .await?;
        Ok(tour)
    }

    /// Cast, validate, run save hooks and store a new tour
    pub async fn create(&self, input: &Value) -> ModelResult<Document> {
        let mut doc = self.schema.cast(input, CastMode::Create)?;
        self.schema.validate(&doc, None)?;

        self.hooks.run_before_save(&mut doc);
        doc.insert(VERSION_FIELD.to_string(), json!(0));

        let saved = self.collection.insert_one(doc).await?;
        self.hooks.run_after_save(&saved);

        Ok(saved)
    }

    /// Create tours one after the other, stopping at the first failure
    pub async fn create_many(&self, inputs: &[Value]) -> ModelResult<Vec<Document>> {
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.create(input).await?);
        }
        Ok(created)
    }

    /// Apply a partial update and return the updated tour.
    ///
    /// Only rules on the patched fields run; cross-field rules see the merged
    /// document. Save hooks do not run.
    pub async fn find_by_id_and_update(&self, id: &str, patch: &Value) -> ModelResult<Option<Document>> {
        let id = ObjectId::parse(id)?;
        let patch = self.schema.cast(patch, CastMode::Update)?;

        let mut ctx = self.query_context(QueryOperation::FindOneAndUpdate, &id);
        self.hooks.query().run_before(&mut ctx);

        let current = self
            .collection
            .find(&FindOptions {
                filter: ctx.filter.clone(),
                limit: Some(1),
                ..Default::default()
            })
            .await?
            .into_iter()
            .next();

        let Some(mut merged) = current else {
            self.hooks.query().run_after(&ctx, 0);
            return Ok(None);
        };

        merged.extend(patch.clone());
        let paths: Vec<String> = patch.keys().cloned().collect();
        self.schema.validate(&merged, Some(&paths))?;

        let updated = self.collection.find_one_and_update(&ctx.filter, patch).await?;
        self.hooks.query().run_after(&ctx, usize::from(updated.is_some()));

        Ok(updated.map(|mut doc| {
            doc.remove(VERSION_FIELD);
            doc
        }))
    }

    /// Delete one tour and return it
    pub async fn find_by_id_and_delete(&self, id: &str) -> ModelResult<Option<Document>> {
        let id = ObjectId::parse(id)?;

        let mut ctx = self.query_context(QueryOperation::FindOneAndDelete, &id);
        self.hooks.query().run_before(&mut ctx);

        let deleted = self.collection.find_one_and_delete(&ctx.filter).await?;
        self.hooks.query().run_after(&ctx, usize::from(deleted.is_some()));

        Ok(deleted)
    }

    /// Delete every tour, secret ones included
    pub async fn delete_many(&self) -> ModelResult<u64> {
        Ok(self.collection.delete_many(&Document::new()).await?)
    }

    /// Run a pipeline after the aggregate hooks had their turn
    pub async fn aggregate(&self, mut pipeline: Pipeline) -> ModelResult<Vec<Document>> {
        self.hooks.run_before_aggregate(&mut pipeline);
        Ok(self.collection.aggregate(&pipeline).await?)
    }

    /// Output form of a stored tour, with virtual fields
    pub fn to_json(&self, mut doc: Document) -> Value {
        self.schema.apply_virtuals(&mut doc);
        Value::Object(doc)
    }

    fn query_context(&self, operation: QueryOperation, id: &ObjectId) -> QueryContext {
        let mut filter = Document::new();
        filter.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        QueryContext::new(operation, filter)
    }
}
