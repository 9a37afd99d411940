//! # Tour Handlers
//!
//! Axum handlers for the `/api/tours` routes. Each one translates a model
//! result into the response envelope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::model::stats::PLAN_YEARS;
use crate::model::{monthly_plan, tour_stats, TourModel};
use crate::query::{QueryFeatures, QuerySpec};

use super::errors::{ApiError, ApiResult};
use super::response::Envelope;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub tours: TourModel,
}

impl AppState {
    pub fn new(tours: TourModel) -> Self {
        Self { tours }
    }
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

fn log_id(id: &str) {
    tracing::debug!(tour_id = %id, "tour id param");
}

/// GET /api/tours
pub async fn list_tours(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Envelope> {
    let spec = QuerySpec::from_pairs(pairs);

    let features = QueryFeatures::new(state.tours.find(), &spec)
        .filter()
        .sort()
        .limit_fields()
        .paginate();
    let tours = features.into_selection().exec().await?;

    let tours = tours.into_iter().map(|t| state.tours.to_json(t)).collect();
    Ok(Envelope::list("tours", tours))
}

/// POST /api/tours
pub async fn create_tour(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Envelope> {
    let body = json_body(body)?;
    let tour = state.tours.create(&body).await?;

    Ok(Envelope::single("tour", state.tours.to_json(tour)).with_status(StatusCode::CREATED))
}

/// GET /api/tours/:id
pub async fn get_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Envelope> {
    log_id(&id);
    let tour = state.tours.find_by_id(&id).await?.ok_or(ApiError::TourNotFound)?;

    Ok(Envelope::single("tour", state.tours.to_json(tour)))
}

/// PATCH /api/tours/:id
pub async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Envelope> {
    log_id(&id);
    let patch = json_body(body)?;
    let tour = state
        .tours
        .find_by_id_and_update(&id, &patch)
        .await?
        .ok_or(ApiError::TourNotFound)?;

    Ok(Envelope::single("updatedTour", state.tours.to_json(tour)))
}

/// DELETE /api/tours/:id
pub async fn delete_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Envelope> {
    log_id(&id);
    state
        .tours
        .find_by_id_and_delete(&id)
        .await?
        .ok_or(ApiError::TourNotFound)?;

    Ok(Envelope::empty())
}

/// GET /api/tours/tour-stats
pub async fn get_tour_stats(State(state): State<AppState>) -> ApiResult<Envelope> {
    let stats = state.tours.aggregate(tour_stats()).await?;
    Ok(Envelope::single("stats", Value::Array(stats.into_iter().map(Value::Object).collect())))
}

/// GET /api/tours/monthly-plan/:year
pub async fn get_monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> ApiResult<Envelope> {
    let year = parse_year(&year)?;
    let plan = state.tours.aggregate(monthly_plan(year)).await?;
    Ok(Envelope::single("plan", Value::Array(plan.into_iter().map(Value::Object).collect())))
}

fn parse_year(raw: &str) -> ApiResult<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|y| PLAN_YEARS.contains(y))
        .ok_or_else(|| ApiError::InvalidParam {
            name: "year",
            value: raw.to_string(),
        })
}

/// Fallback for anything no route or static file answers
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::RouteNotFound(uri.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2021").unwrap(), 2021);
        assert_eq!(parse_year(" 1999 ").unwrap(), 1999);
        assert!(parse_year("0").is_err());
        assert!(parse_year("10000").is_err());
        assert!(parse_year("next").is_err());
    }
}
