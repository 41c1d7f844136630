//! Migration to enable FORCE ROW LEVEL SECURITY on all project tables.
//!
//! Policies then apply to the table owner as well, which is the role the
//! service connects with.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(FORCE_RLS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DISABLE_FORCE_RLS_SQL).await?;
        Ok(())
    }
}

const FORCE_RLS_SQL: &str = r"
ALTER TABLE records FORCE ROW LEVEL SECURITY;
ALTER TABLE labeling_tasks FORCE ROW LEVEL SECURITY;
ALTER TABLE labeling_task_labels FORCE ROW LEVEL SECURITY;
ALTER TABLE annotations FORCE ROW LEVEL SECURITY;
ALTER TABLE annotation_tokens FORCE ROW LEVEL SECURITY;
";

const DISABLE_FORCE_RLS_SQL: &str = r"
ALTER TABLE records NO FORCE ROW LEVEL SECURITY;
ALTER TABLE labeling_tasks NO FORCE ROW LEVEL SECURITY;
ALTER TABLE labeling_task_labels NO FORCE ROW LEVEL SECURITY;
ALTER TABLE annotations NO FORCE ROW LEVEL SECURITY;
ALTER TABLE annotation_tokens NO FORCE ROW LEVEL SECURITY;
";
