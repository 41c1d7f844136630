//! `SeaORM` Entity for labeling_task_labels table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "labeling_task_labels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub labeling_task_id: Uuid,
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::labeling_tasks::Entity",
        from = "Column::LabelingTaskId",
        to = "super::labeling_tasks::Column::Id"
    )]
    LabelingTasks,
    #[sea_orm(has_many = "super::annotations::Entity")]
    Annotations,
}

impl Related<super::labeling_tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LabelingTasks.def()
    }
}

impl Related<super::annotations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Annotations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
