//! Project repository: projects and the records annotated in them.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use labelvault_shared::types::{ProjectId, RecordId};

use crate::entities::{projects, records};
use crate::rls::RlsConnection;

/// Project repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct ProjectRepository {
    db: DatabaseConnection,
}

impl ProjectRepository {
    /// Creates a new project repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a project by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: ProjectId) -> Result<Option<projects::Model>, DbErr> {
        projects::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Creates a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, name: &str) -> Result<projects::Model, DbErr> {
        projects::ActiveModel {
            id: Set(ProjectId::new().into_inner()),
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(&self.db)
        .await
    }

    /// Creates a record in a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create_record(
        &self,
        project_id: ProjectId,
        data: serde_json::Value,
    ) -> Result<records::Model, DbErr> {
        let rls = RlsConnection::new(&self.db, project_id).await?;

        let record = records::ActiveModel {
            id: Set(RecordId::new().into_inner()),
            project_id: Set(project_id.into_inner()),
            data: Set(data),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(rls.transaction())
        .await?;

        rls.commit().await?;
        Ok(record)
    }

    /// Finds a record of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_record(
        &self,
        project_id: ProjectId,
        record_id: RecordId,
    ) -> Result<Option<records::Model>, DbErr> {
        let rls = RlsConnection::new(&self.db, project_id).await?;

        let record = records::Entity::find_by_id(record_id.into_inner())
            .filter(records::Column::ProjectId.eq(project_id.into_inner()))
            .one(rls.transaction())
            .await?;

        rls.commit().await?;
        Ok(record)
    }
}
