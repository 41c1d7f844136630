//! `SeaORM` Entity for annotations table.

use super::sea_orm_active_enums::{AnnotationKind, LabelSource};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "annotations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub record_id: Uuid,
    pub labeling_task_label_id: Uuid,
    pub annotator_id: Uuid,
    pub kind: AnnotationKind,
    pub source: LabelSource,
    pub is_gold_star: Option<bool>,
    pub is_valid_manual_label: Option<bool>,
    #[sea_orm(column_type = "Decimal(Some((6, 5)))", nullable)]
    pub confidence: Option<Decimal>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::records::Entity",
        from = "Column::RecordId",
        to = "super::records::Column::Id"
    )]
    Records,
    #[sea_orm(
        belongs_to = "super::labeling_task_labels::Entity",
        from = "Column::LabelingTaskLabelId",
        to = "super::labeling_task_labels::Column::Id"
    )]
    LabelingTaskLabels,
    #[sea_orm(has_many = "super::annotation_tokens::Entity")]
    AnnotationTokens,
}

impl Related<super::records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl Related<super::labeling_task_labels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LabelingTaskLabels.def()
    }
}

impl Related<super::annotation_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnnotationTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
