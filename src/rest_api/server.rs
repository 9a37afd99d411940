//! # REST API HTTP Server
//!
//! Axum router for the tours API plus the server loop that runs it.

use std::future::Future;
use std::net::SocketAddr;

use axum::handler::HandlerWithoutStateExt;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::model::TourModel;

use super::handler::{
    create_tour, delete_tour, get_monthly_plan, get_tour, get_tour_stats, list_tours,
    route_not_found, update_tour, AppState,
};

/// HTTP server for the tours API
pub struct TourServer {
    config: AppConfig,
    router: Router,
}

impl TourServer {
    pub fn new(config: AppConfig, tours: TourModel) -> Self {
        let router = build_router(&config, AppState::new(tours));
        Self { config, router }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        let addr: SocketAddr = self.socket_addr().parse().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Invalid socket address: {e}"))
        })?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            %addr,
            environment = self.config.environment.as_str(),
            "server is running"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Tour routes under `/api/tours`
pub fn tour_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_tours).post(create_tour).fallback(route_not_found),
        )
        .route("/tour-stats", get(get_tour_stats).fallback(route_not_found))
        .route(
            "/monthly-plan/:year",
            get(get_monthly_plan).fallback(route_not_found),
        )
        .route(
            "/:id",
            get(get_tour)
                .patch(update_tour)
                .delete(delete_tour)
                .fallback(route_not_found),
        )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = if config.cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full application router
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let mut router = Router::new().nest("/api/tours", tour_routes().with_state(state));

    router = match &config.public_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(route_not_found.into_service()),
        ),
        None => router.fallback(route_not_found),
    };

    if config.environment.is_development() {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.layer(cors_layer(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    #[tokio::test]
    async fn test_server_creation() {
        let db = Database::in_memory().await.unwrap();
        let tours = TourModel::init(&db).await.unwrap();

        let server = TourServer::new(AppConfig::default(), tours);
        assert_eq!(server.socket_addr(), "0.0.0.0:3000");
        let _router = server.router();
    }
}
