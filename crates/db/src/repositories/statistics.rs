//! Statistics repository: label distribution and confusion matrix over valid
//! manual labels.
//!
//! Results are cached per `(project, task)` using Moka. Entries expire after a
//! short TTL; writers that know the affected task can invalidate directly.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::debug;

use labelvault_core::consensus::{Scope, TaskType};
use labelvault_core::stats::{ConfusionMatrix, LabelDistribution, StatsError};
use labelvault_shared::types::{LabelId, ProjectId, TaskId};

use crate::entities::labeling_task_labels;
use crate::rls::RlsConnection;

use super::mapping::{Sources, load_metadata, load_scope};

/// Default cache capacity (entries per statistic).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cache entries (30 seconds).
const DEFAULT_TTL_SECS: u64 = 30;

type CacheKey = (ProjectId, TaskId);

fn build_cache<V>(max_capacity: u64, ttl_secs: u64) -> Cache<CacheKey, V>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(max_capacity)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
}

/// Statistics repository.
#[derive(Clone)]
pub struct StatisticsRepository {
    db: DatabaseConnection,
    distributions: Cache<CacheKey, Arc<LabelDistribution>>,
    confusion: Cache<CacheKey, Arc<ConfusionMatrix>>,
}

impl std::fmt::Debug for StatisticsRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsRepository")
            .field("distributions", &self.distributions.entry_count())
            .field("confusion", &self.confusion.entry_count())
            .finish_non_exhaustive()
    }
}

impl StatisticsRepository {
    /// Creates a statistics repository with default cache settings.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_cache_config(db, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a statistics repository with custom cache settings.
    #[must_use]
    pub fn with_cache_config(db: DatabaseConnection, max_capacity: u64, ttl_secs: u64) -> Self {
        Self {
            db,
            distributions: build_cache(max_capacity, ttl_secs),
            confusion: build_cache(max_capacity, ttl_secs),
        }
    }

    /// Valid manual vs weak-supervision counts per label of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is not found or the query fails.
    pub async fn label_distribution(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> Result<LabelDistribution, StatsError> {
        let key = (project_id, task_id);
        if let Some(cached) = self.distributions.get(&key) {
            debug!(task_id = %task_id, "Label distribution served from cache");
            return Ok((*cached).clone());
        }

        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), project_id)
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?;
        metadata
            .task_type(task_id)
            .ok_or(StatsError::TaskNotFound(task_id))?;

        let labels: Vec<LabelId> = labeling_task_labels::Entity::find()
            .filter(labeling_task_labels::Column::LabelingTaskId.eq(task_id.into_inner()))
            .order_by_asc(labeling_task_labels::Column::Name)
            .all(rls.transaction())
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?
            .into_iter()
            .map(|label| LabelId::from_uuid(label.id))
            .collect();

        let annotations = load_scope(
            rls.transaction(),
            Scope::task(project_id, task_id),
            &metadata,
            Sources::ManualAndWeakSupervision,
        )
        .await
        .map_err(|e| StatsError::Database(e.to_string()))?;

        rls.commit()
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?;

        let distribution = LabelDistribution::compute(&labels, &annotations);
        self.distributions
            .insert(key, Arc::new(distribution.clone()));

        Ok(distribution)
    }

    /// Confusion between valid manual labels and weak supervision for a
    /// classification task.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Task is not found
    /// - Task is an extraction task
    /// - Database query fails
    pub async fn confusion_matrix(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> Result<ConfusionMatrix, StatsError> {
        let key = (project_id, task_id);
        if let Some(cached) = self.confusion.get(&key) {
            debug!(task_id = %task_id, "Confusion matrix served from cache");
            return Ok((*cached).clone());
        }

        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), project_id)
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?;
        let task_type = metadata
            .task_type(task_id)
            .ok_or(StatsError::TaskNotFound(task_id))?;
        if task_type != TaskType::Classification {
            return Err(StatsError::UnsupportedTaskType(task_type));
        }

        let annotations = load_scope(
            rls.transaction(),
            Scope::task(project_id, task_id),
            &metadata,
            Sources::ManualAndWeakSupervision,
        )
        .await
        .map_err(|e| StatsError::Database(e.to_string()))?;

        rls.commit()
            .await
            .map_err(|e| StatsError::Database(e.to_string()))?;

        let matrix = ConfusionMatrix::compute(&annotations);
        self.confusion.insert(key, Arc::new(matrix.clone()));

        Ok(matrix)
    }

    /// Drops cached statistics of one task.
    pub fn invalidate_task(&self, project_id: ProjectId, task_id: TaskId) {
        let key = (project_id, task_id);
        self.distributions.invalidate(&key);
        self.confusion.invalidate(&key);
    }

    /// Drops every cached statistic. Used after writes whose task is unknown.
    pub fn invalidate_all(&self) {
        self.distributions.invalidate_all();
        self.confusion.invalidate_all();
    }
}
