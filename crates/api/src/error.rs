//! Mapping of domain errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use labelvault_core::consensus::ConsensusError;
use labelvault_core::stats::StatsError;
use labelvault_db::repositories::AnnotationError;
use labelvault_shared::AppError;

/// Converts a consensus error into an application error.
///
/// A selection that references a vanished annotation is a conflict: the
/// caller has to reload and choose again.
pub fn from_consensus(e: ConsensusError) -> AppError {
    match e {
        ConsensusError::EmptySelection => AppError::Validation(e.to_string()),
        ConsensusError::AnnotationNotFound(_) => AppError::Conflict(e.to_string()),
        ConsensusError::MixedKeys { .. }
        | ConsensusError::NotManual(_)
        | ConsensusError::MissingTaskMetadata(_)
        | ConsensusError::KeyNotContested(_) => AppError::BusinessRule(e.to_string()),
        ConsensusError::Database(msg) => AppError::Database(msg),
    }
}

/// Converts an annotation store error into an application error.
pub fn from_annotation(e: AnnotationError) -> AppError {
    match e {
        AnnotationError::RecordNotFound(_) | AnnotationError::LabelNotFound(_) => {
            AppError::NotFound(e.to_string())
        }
        AnnotationError::WrongTaskType { .. } => AppError::BusinessRule(e.to_string()),
        AnnotationError::DuplicateTokenIndex(_) | AnnotationError::NegativeTokenIndex(_) => {
            AppError::Validation(e.to_string())
        }
        AnnotationError::Conflict => AppError::Conflict(e.to_string()),
        AnnotationError::NotOwner(_) => AppError::Forbidden(e.to_string()),
        AnnotationError::Consensus(inner) => from_consensus(inner),
        AnnotationError::Database(msg) => AppError::Database(msg),
    }
}

/// Converts a statistics error into an application error.
pub fn from_stats(e: StatsError) -> AppError {
    match e {
        StatsError::TaskNotFound(_) => AppError::NotFound(e.to_string()),
        StatsError::UnsupportedTaskType(_) => AppError::BusinessRule(e.to_string()),
        StatsError::Database(msg) => AppError::Database(msg),
    }
}

/// Renders an application error as `{ "error": code, "message": text }`.
///
/// Store and internal failures are logged and their details withheld.
pub fn error_response(e: &AppError) -> Response {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if status.is_server_error() {
        error!(error = %e, "Request failed");
        "An error occurred".to_string()
    } else {
        e.to_string()
    };

    (
        status,
        Json(json!({
            "error": e.error_code(),
            "message": message,
            "retryable": e.is_retryable()
        })),
    )
        .into_response()
}
