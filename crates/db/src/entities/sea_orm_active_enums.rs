//! `SeaORM` active enums mirroring the Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "task_type")]
pub enum TaskType {
    #[sea_orm(string_value = "MULTICLASS_CLASSIFICATION")]
    MulticlassClassification,
    #[sea_orm(string_value = "INFORMATION_EXTRACTION")]
    InformationExtraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "label_source")]
pub enum LabelSource {
    #[sea_orm(string_value = "MANUAL")]
    Manual,
    #[sea_orm(string_value = "WEAK_SUPERVISION")]
    WeakSupervision,
    #[sea_orm(string_value = "INFORMATION_SOURCE")]
    InformationSource,
    #[sea_orm(string_value = "MODEL_CALLBACK")]
    ModelCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "annotation_kind")]
pub enum AnnotationKind {
    #[sea_orm(string_value = "RETURN")]
    Return,
    #[sea_orm(string_value = "YIELD")]
    Yield,
}
