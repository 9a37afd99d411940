//! # REST API Module
//!
//! HTTP endpoints for the tours resource: routing, handlers, the response
//! envelope and error mapping.

pub mod errors;
pub mod handler;
pub mod response;
pub mod server;

pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use handler::AppState;
pub use response::Envelope;
pub use server::{build_router, tour_routes, TourServer};
