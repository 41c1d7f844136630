//! Uniqueness of ordinary manual classification labels.
//!
//! One row per `(record, label, annotator)` among manual, non-gold-star RETURN
//! annotations. The label determines the task, so this is the
//! `(record, task, annotator, label)` rule. Gold stars and YIELD rows are
//! outside the index. Rows already duplicated are swept before the index is
//! built, keeping the highest id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(SWEEP_DUPLICATES_SQL).await?;
        db.execute_unprepared(CREATE_INDEX_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_INDEX_SQL).await?;
        Ok(())
    }
}

const SWEEP_DUPLICATES_SQL: &str = r"
DELETE FROM annotations a
USING annotations b
WHERE a.record_id = b.record_id
  AND a.labeling_task_label_id = b.labeling_task_label_id
  AND a.annotator_id = b.annotator_id
  AND a.source = 'MANUAL' AND b.source = 'MANUAL'
  AND a.kind = 'RETURN' AND b.kind = 'RETURN'
  AND a.is_gold_star IS NOT TRUE AND b.is_gold_star IS NOT TRUE
  AND a.id < b.id;
";

const CREATE_INDEX_SQL: &str = r"
CREATE UNIQUE INDEX uq_manual_classification_label
    ON annotations(record_id, labeling_task_label_id, annotator_id)
    WHERE source = 'MANUAL' AND kind = 'RETURN' AND is_gold_star IS NOT TRUE;
";

const DROP_INDEX_SQL: &str = r"
DROP INDEX IF EXISTS uq_manual_classification_label;
";
