//! Manual annotation routes.
//!
//! Every write recomputes validity for the affected record before responding,
//! so the returned annotation already carries its current flag.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState,
    error::{error_response, from_annotation},
    middleware::AuthUser,
};
use labelvault_core::consensus::TokenTag;
use labelvault_db::repositories::{
    AnnotationRepository, Submission, SubmitClassificationInput, SubmitExtractionInput,
};
use labelvault_shared::types::{AnnotationId, LabelId, ProjectId, RecordId};

/// Creates the annotation routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/annotations/classification",
            post(submit_classification),
        )
        .route(
            "/projects/{project_id}/annotations/extraction",
            post(submit_extraction),
        )
        .route(
            "/projects/{project_id}/annotations/{annotation_id}",
            delete(retract_annotation),
        )
}

/// Request body for a classification label.
#[derive(Debug, Deserialize)]
pub struct ClassificationRequest {
    /// Labeled record.
    pub record_id: RecordId,
    /// Chosen label.
    pub label_id: LabelId,
}

/// Request body for an extraction span.
#[derive(Debug, Deserialize)]
pub struct ExtractionRequest {
    /// Labeled record.
    pub record_id: RecordId,
    /// Entity label.
    pub label_id: LabelId,
    /// Tagged tokens.
    pub tokens: Vec<TokenTag>,
}

fn repository(state: &AppState) -> AnnotationRepository {
    AnnotationRepository::new((*state.db).clone(), state.consensus.clone())
}

fn submission_response(state: &AppState, submission: Submission) -> Response {
    let status = if submission.created {
        state.statistics.invalidate_all();
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(submission)).into_response()
}

/// POST `/projects/{project_id}/annotations/classification` - Submit a classification label.
///
/// Resubmitting the same label returns the stored row with 200.
async fn submit_classification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<ClassificationRequest>,
) -> Response {
    if let Err(e) = auth.require_project(project_id) {
        return error_response(&e);
    }

    let input = SubmitClassificationInput {
        project_id,
        record_id: body.record_id,
        label_id: body.label_id,
        annotator_id: auth.user_id(),
    };

    match repository(&state).submit_classification(input).await {
        Ok(submission) => submission_response(&state, submission),
        Err(e) => error_response(&from_annotation(e)),
    }
}

/// POST `/projects/{project_id}/annotations/extraction` - Submit an extraction span.
async fn submit_extraction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<ExtractionRequest>,
) -> Response {
    if let Err(e) = auth.require_project(project_id) {
        return error_response(&e);
    }

    let input = SubmitExtractionInput {
        project_id,
        record_id: body.record_id,
        label_id: body.label_id,
        annotator_id: auth.user_id(),
        tokens: body.tokens,
    };

    match repository(&state).submit_extraction(input).await {
        Ok(submission) => submission_response(&state, submission),
        Err(e) => error_response(&from_annotation(e)),
    }
}

/// DELETE `/projects/{project_id}/annotations/{annotation_id}` - Retract an annotation.
///
/// Annotators may only retract their own rows; reviewers may retract any.
async fn retract_annotation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, annotation_id)): Path<(ProjectId, AnnotationId)>,
) -> Response {
    if let Err(e) = auth.require_project(project_id) {
        return error_response(&e);
    }

    let owner = (!auth.role().can_review()).then(|| auth.user_id());

    match repository(&state)
        .retract(project_id, annotation_id, owner)
        .await
    {
        Ok(deletion) => {
            if deletion.rows_deleted > 0 {
                info!(
                    project_id = %project_id,
                    annotation_id = %annotation_id,
                    user_id = %auth.user_id(),
                    "Annotation retracted"
                );
                state.statistics.invalidate_all();
            }
            (StatusCode::OK, Json(deletion)).into_response()
        }
        Err(e) => error_response(&from_annotation(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_request_parses_tokens() {
        let body: ExtractionRequest = serde_json::from_value(serde_json::json!({
            "record_id": RecordId::new(),
            "label_id": LabelId::new(),
            "tokens": [
                { "token_index": 2, "is_beginning_token": true },
                { "token_index": 3, "is_beginning_token": false }
            ]
        }))
        .unwrap();

        assert_eq!(
            body.tokens,
            vec![TokenTag::new(2, true), TokenTag::new(3, false)]
        );
    }
}
