//! Statistics error types.

use thiserror::Error;

use labelvault_shared::types::TaskId;

use crate::consensus::TaskType;

/// Statistics-related errors.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Task not found.
    #[error("Labeling task not found: {0}")]
    TaskNotFound(TaskId),

    /// The statistic is not defined for this task type.
    #[error("Statistic not available for {0:?} tasks")]
    UnsupportedTaskType(TaskType),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}
