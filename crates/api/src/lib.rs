//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for consensus, annotations and statistics
//! - Authentication middleware
//! - Mapping of domain errors onto JSON error responses

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use labelvault_db::StatisticsRepository;
use labelvault_shared::JwtService;
use labelvault_shared::config::ConsensusConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token operations.
    pub jwt_service: Arc<JwtService>,
    /// Consensus engine settings handed to every repository.
    pub consensus: ConsensusConfig,
    /// Statistics repository, shared so its cache survives across requests.
    pub statistics: StatisticsRepository,
}

impl AppState {
    /// Builds the state around one connection pool.
    #[must_use]
    pub fn new(db: DatabaseConnection, jwt_service: JwtService, consensus: ConsensusConfig) -> Self {
        Self {
            statistics: StatisticsRepository::new(db.clone()),
            db: Arc::new(db),
            jwt_service: Arc::new(jwt_service),
            consensus,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
