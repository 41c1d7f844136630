//! Authentication middleware for protected routes.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;
use labelvault_shared::types::{ProjectId, UserId};
use labelvault_shared::{AppError, Claims, JwtError, ProjectRole};

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Authentication middleware that validates JWT tokens.
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Validates the token using the JWT service
/// 3. Stores the claims in request extensions for handlers to access
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "missing_token",
                "message": "Authorization header with Bearer token is required"
            })),
        )
            .into_response();
    };

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            let (error, message) = match e {
                JwtError::Expired => ("token_expired", "Token has expired"),
                _ => ("invalid_token", "Invalid or malformed token"),
            };

            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": error, "message": message })),
            )
                .into_response()
        }
    }
}

/// Extractor for authenticated user claims.
///
/// Tokens are scoped to one project; handlers call [`AuthUser::require_project`]
/// with the project from the path before touching any data.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the user ID from the claims.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.0.user_id())
    }

    /// Returns the project the token is scoped to.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        ProjectId::from_uuid(self.0.project_id())
    }

    /// Returns the user's role.
    #[must_use]
    pub const fn role(&self) -> ProjectRole {
        self.0.role
    }

    /// Returns the inner claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.0
    }

    /// Rejects requests addressed to a project other than the token's.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` on mismatch.
    pub fn require_project(&self, project_id: ProjectId) -> Result<(), AppError> {
        if self.project_id() == project_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Token is not valid for this project".to_string(),
            ))
        }
    }

    /// Rejects users who may not resolve disagreements.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for annotators.
    pub fn require_reviewer(&self) -> Result<(), AppError> {
        if self.role().can_review() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You need reviewer or engineer role to perform this action".to_string(),
            ))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "unauthorized",
                        "message": "Authentication required"
                    })),
                )
            })
    }
}
