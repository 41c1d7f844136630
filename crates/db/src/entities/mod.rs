//! `SeaORM` entities for the annotation store.

pub mod prelude;

pub mod annotation_tokens;
pub mod annotations;
pub mod labeling_task_labels;
pub mod labeling_tasks;
pub mod projects;
pub mod records;
pub mod sea_orm_active_enums;
