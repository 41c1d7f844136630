//! Read surface over validated manual labels.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState,
    error::{error_response, from_annotation, from_stats},
    middleware::AuthUser,
};
use labelvault_core::stats::ConfusionCell;
use labelvault_db::AnnotationRepository;
use labelvault_shared::types::{ProjectId, RecordId, TaskId};

/// Creates the statistics routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/tasks/{task_id}/valid-labels",
            get(valid_labels),
        )
        .route(
            "/projects/{project_id}/tasks/{task_id}/label-distribution",
            get(label_distribution),
        )
        .route(
            "/projects/{project_id}/tasks/{task_id}/confusion-matrix",
            get(confusion_matrix),
        )
}

/// Query parameters for valid labels.
#[derive(Debug, Deserialize)]
pub struct ValidLabelsQuery {
    /// Restrict to one record.
    pub record_id: Option<RecordId>,
}

/// Response for a confusion matrix.
#[derive(Debug, Serialize)]
pub struct ConfusionMatrixResponse {
    /// Non-zero cells.
    pub cells: Vec<ConfusionCell>,
    /// Records carrying both a valid manual and a weak-supervision label.
    pub records_compared: u64,
    /// Share of compared records where both sides agree.
    pub accuracy: Option<f64>,
}

/// GET `/projects/{project_id}/tasks/{task_id}/valid-labels` - Valid manual annotations.
async fn valid_labels(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, task_id)): Path<(ProjectId, TaskId)>,
    Query(query): Query<ValidLabelsQuery>,
) -> Response {
    if let Err(e) = auth.require_project(project_id) {
        return error_response(&e);
    }

    let repo = AnnotationRepository::new((*state.db).clone(), state.consensus.clone());
    match repo
        .valid_manual_annotations(project_id, task_id, query.record_id)
        .await
    {
        Ok(annotations) => (
            StatusCode::OK,
            Json(json!({
                "task_id": task_id,
                "annotations": annotations
            })),
        )
            .into_response(),
        Err(e) => error_response(&from_annotation(e)),
    }
}

/// GET `/projects/{project_id}/tasks/{task_id}/label-distribution` - Manual vs weak supervision counts.
async fn label_distribution(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, task_id)): Path<(ProjectId, TaskId)>,
) -> Response {
    if let Err(e) = auth.require_project(project_id) {
        return error_response(&e);
    }

    match state.statistics.label_distribution(project_id, task_id).await {
        Ok(distribution) => (StatusCode::OK, Json(distribution)).into_response(),
        Err(e) => error_response(&from_stats(e)),
    }
}

/// GET `/projects/{project_id}/tasks/{task_id}/confusion-matrix` - Manual vs weak supervision agreement.
async fn confusion_matrix(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, task_id)): Path<(ProjectId, TaskId)>,
) -> Response {
    if let Err(e) = auth.require_project(project_id) {
        return error_response(&e);
    }

    match state.statistics.confusion_matrix(project_id, task_id).await {
        Ok(matrix) => {
            let response = ConfusionMatrixResponse {
                accuracy: matrix.accuracy(),
                cells: matrix.cells,
                records_compared: matrix.records_compared,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(&from_stats(e)),
    }
}
