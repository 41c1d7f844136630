//! Labeling task repository: tasks, their labels and the metadata the
//! consensus engine resolves annotations through.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};

use labelvault_core::consensus::{TaskMetadata, TaskType};
use labelvault_shared::types::{LabelId, ProjectId, TaskId};

use crate::entities::{labeling_task_labels, labeling_tasks};
use crate::rls::RlsConnection;

use super::mapping::{load_metadata, task_type_to_db};

/// Error types for labeling task operations.
#[derive(Debug, thiserror::Error)]
pub enum LabelingTaskError {
    /// Task not found in the project.
    #[error("Labeling task not found: {0}")]
    TaskNotFound(TaskId),

    /// A task or label with this name already exists.
    #[error("Name already in use: {0}")]
    DuplicateName(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbErr> for LabelingTaskError {
    fn from(e: DbErr) -> Self {
        Self::Database(e.to_string())
    }
}

/// Input for creating a labeling task.
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    /// Owning project.
    pub project_id: ProjectId,
    /// Task name, unique within the project.
    pub name: String,
    /// Classification or extraction.
    pub task_type: TaskType,
    /// Record attribute the task targets.
    pub attribute_name: Option<String>,
}

/// Labeling task repository.
#[derive(Debug, Clone)]
pub struct LabelingTaskRepository {
    db: DatabaseConnection,
}

impl LabelingTaskRepository {
    /// Creates a new labeling task repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a labeling task.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A task with the same name exists in the project
    /// - Database operation fails
    pub async fn create_task(
        &self,
        input: CreateTaskInput,
    ) -> Result<labeling_tasks::Model, LabelingTaskError> {
        let rls = RlsConnection::new(&self.db, input.project_id).await?;

        let task = labeling_tasks::ActiveModel {
            id: Set(TaskId::new().into_inner()),
            project_id: Set(input.project_id.into_inner()),
            name: Set(input.name.clone()),
            task_type: Set(task_type_to_db(input.task_type)),
            attribute_name: Set(input.attribute_name),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(rls.transaction())
        .await
        .map_err(|e| duplicate_name_or_database(e, &input.name))?;

        rls.commit().await?;
        Ok(task)
    }

    /// Adds a label to a task.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Task is not found
    /// - A label with the same name exists on the task
    /// - Database operation fails
    pub async fn create_label(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        name: &str,
    ) -> Result<labeling_task_labels::Model, LabelingTaskError> {
        let rls = RlsConnection::new(&self.db, project_id).await?;

        labeling_tasks::Entity::find_by_id(task_id.into_inner())
            .filter(labeling_tasks::Column::ProjectId.eq(project_id.into_inner()))
            .one(rls.transaction())
            .await?
            .ok_or(LabelingTaskError::TaskNotFound(task_id))?;

        let label = labeling_task_labels::ActiveModel {
            id: Set(LabelId::new().into_inner()),
            project_id: Set(project_id.into_inner()),
            labeling_task_id: Set(task_id.into_inner()),
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(rls.transaction())
        .await
        .map_err(|e| duplicate_name_or_database(e, name))?;

        rls.commit().await?;
        Ok(label)
    }

    /// Gets a task of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is not found or the query fails.
    pub async fn get_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> Result<labeling_tasks::Model, LabelingTaskError> {
        let rls = RlsConnection::new(&self.db, project_id).await?;

        let task = labeling_tasks::Entity::find_by_id(task_id.into_inner())
            .filter(labeling_tasks::Column::ProjectId.eq(project_id.into_inner()))
            .one(rls.transaction())
            .await?
            .ok_or(LabelingTaskError::TaskNotFound(task_id))?;

        rls.commit().await?;
        Ok(task)
    }

    /// Lists the labels of a task ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_labels(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> Result<Vec<labeling_task_labels::Model>, LabelingTaskError> {
        let rls = RlsConnection::new(&self.db, project_id).await?;

        let labels = labeling_task_labels::Entity::find()
            .filter(labeling_task_labels::Column::ProjectId.eq(project_id.into_inner()))
            .filter(labeling_task_labels::Column::LabelingTaskId.eq(task_id.into_inner()))
            .order_by_asc(labeling_task_labels::Column::Name)
            .all(rls.transaction())
            .await?;

        rls.commit().await?;
        Ok(labels)
    }

    /// Task and label metadata of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn metadata(&self, project_id: ProjectId) -> Result<TaskMetadata, LabelingTaskError> {
        let rls = RlsConnection::new(&self.db, project_id).await?;
        let metadata = load_metadata(rls.transaction(), project_id).await?;
        rls.commit().await?;
        Ok(metadata)
    }
}

fn duplicate_name_or_database(e: DbErr, name: &str) -> LabelingTaskError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            LabelingTaskError::DuplicateName(name.to_string())
        }
        _ => LabelingTaskError::Database(e.to_string()),
    }
}
