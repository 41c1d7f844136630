//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod annotation;
pub mod consensus;
pub mod labeling_task;
mod mapping;
pub mod project;
pub mod statistics;

pub use annotation::{
    AnnotationError, AnnotationRepository, Deletion, SubmitClassificationInput,
    SubmitExtractionInput, Submission, validate_tokens,
};
pub use consensus::{
    ConsensusRepository, MAX_RECOMPUTE_ATTEMPTS, PromotionOutcome, RecomputeOutcome,
    SuppressionOutcome,
};
pub use labeling_task::{CreateTaskInput, LabelingTaskError, LabelingTaskRepository};
pub use project::ProjectRepository;
pub use statistics::StatisticsRepository;
