//! Entity re-exports.

pub use super::annotation_tokens::Entity as AnnotationTokens;
pub use super::annotations::Entity as Annotations;
pub use super::labeling_task_labels::Entity as LabelingTaskLabels;
pub use super::labeling_tasks::Entity as LabelingTasks;
pub use super::projects::Entity as Projects;
pub use super::records::Entity as Records;
