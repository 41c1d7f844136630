//! Authentication types for JWT bearer tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user within a labeling project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    /// Submits manual labels.
    Annotator,
    /// Resolves disagreements and promotes gold stars.
    Reviewer,
    /// Full project administration.
    Engineer,
}

impl ProjectRole {
    /// Whether this role may resolve disagreements on behalf of the project.
    #[must_use]
    pub const fn can_review(self) -> bool {
        matches!(self, Self::Reviewer | Self::Engineer)
    }
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Project the token is scoped to.
    pub project: Uuid,
    /// User's role in the project.
    pub role: ProjectRole,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        project_id: Uuid,
        role: ProjectRole,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            project: project_id,
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the project ID from claims.
    #[must_use]
    pub const fn project_id(&self) -> Uuid {
        self.project
    }
}
