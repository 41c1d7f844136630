//! Annotation store with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for projects, records, tasks, labels,
//!   annotations and their token tags
//! - Repositories wiring the consensus engine to the store
//! - Database migrations
//! - Per-project row-level security context

pub mod entities;
pub mod migration;
pub mod repositories;
pub mod rls;

pub use repositories::{
    AnnotationRepository, ConsensusRepository, LabelingTaskRepository, ProjectRepository,
    StatisticsRepository,
};

use std::time::Duration;

use labelvault_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the configured pool bounds.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(options).await
}
