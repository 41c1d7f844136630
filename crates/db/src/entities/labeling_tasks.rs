//! `SeaORM` Entity for labeling_tasks table.

use super::sea_orm_active_enums::TaskType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "labeling_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub task_type: TaskType,
    /// Record attribute the task targets; tokens of extraction tasks index into it.
    pub attribute_name: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Projects,
    #[sea_orm(has_many = "super::labeling_task_labels::Entity")]
    LabelingTaskLabels,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::labeling_task_labels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LabelingTaskLabels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
