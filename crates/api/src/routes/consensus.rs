//! Consensus routes: validity recompute, gold-star promotion and the duplicate sweep.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState,
    error::{error_response, from_consensus},
    middleware::AuthUser,
};
use labelvault_core::consensus::{ConsensusKey, Scope};
use labelvault_db::ConsensusRepository;
use labelvault_shared::types::{AnnotationId, ProjectId, RecordId, TaskId};

/// Creates the consensus routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/consensus/recompute", post(recompute))
        .route("/projects/{project_id}/consensus/gold-star", post(promote_gold_star))
        .route(
            "/projects/{project_id}/consensus/suppress-duplicates",
            post(suppress_duplicates),
        )
}

/// Request body narrowing a project-wide operation.
///
/// An empty body (`{}`) addresses the whole project.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeRequest {
    /// Restrict to one task.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Restrict to one record.
    #[serde(default)]
    pub record_id: Option<RecordId>,
}

impl ScopeRequest {
    /// Resolves the request into a scope inside `project_id`.
    #[must_use]
    pub const fn into_scope(self, project_id: ProjectId) -> Scope {
        Scope {
            project_id,
            task_id: self.task_id,
            record_id: self.record_id,
        }
    }
}

/// Request body for a gold-star promotion.
#[derive(Debug, Deserialize)]
pub struct GoldStarRequest {
    /// Record of the key being resolved.
    pub record_id: RecordId,
    /// Task of the key being resolved.
    pub task_id: TaskId,
    /// Annotations whose judgments become ground truth.
    pub annotation_ids: Vec<AnnotationId>,
}

fn repository(state: &AppState) -> ConsensusRepository {
    ConsensusRepository::new((*state.db).clone(), state.consensus.clone())
}

/// Drops statistics the scope may have changed.
fn invalidate_statistics(state: &AppState, scope: Scope) {
    match scope.task_id {
        Some(task_id) => state.statistics.invalidate_task(scope.project_id, task_id),
        None => state.statistics.invalidate_all(),
    }
}

/// POST `/projects/{project_id}/consensus/recompute` - Recompute validity flags.
async fn recompute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<ScopeRequest>,
) -> Response {
    if let Err(e) = auth
        .require_project(project_id)
        .and_then(|()| auth.require_reviewer())
    {
        return error_response(&e);
    }

    let scope = body.into_scope(project_id);
    match repository(&state).recompute_validity(scope).await {
        Ok(outcome) => {
            invalidate_statistics(&state, scope);
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => error_response(&from_consensus(e)),
    }
}

/// POST `/projects/{project_id}/consensus/gold-star` - Promote annotations to gold stars.
///
/// The reviewer is the token's subject.
async fn promote_gold_star(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<GoldStarRequest>,
) -> Response {
    if let Err(e) = auth
        .require_project(project_id)
        .and_then(|()| auth.require_reviewer())
    {
        return error_response(&e);
    }

    let key = ConsensusKey::new(body.record_id, body.task_id);
    match repository(&state)
        .promote_gold_star(project_id, key, &body.annotation_ids, auth.user_id())
        .await
    {
        Ok(outcome) => {
            info!(
                project_id = %project_id,
                reviewer_id = %auth.user_id(),
                gold_stars = outcome.gold_star_ids.len(),
                "Gold star promoted via API"
            );
            state.statistics.invalidate_task(project_id, key.task_id);
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        Err(e) => error_response(&from_consensus(e)),
    }
}

/// POST `/projects/{project_id}/consensus/suppress-duplicates` - Sweep double submissions.
async fn suppress_duplicates(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<ScopeRequest>,
) -> Response {
    if let Err(e) = auth
        .require_project(project_id)
        .and_then(|()| auth.require_reviewer())
    {
        return error_response(&e);
    }

    let scope = body.into_scope(project_id);
    match repository(&state).suppress_duplicates(scope).await {
        Ok(outcome) => {
            invalidate_statistics(&state, scope);
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => error_response(&from_consensus(e)),
    }
}
