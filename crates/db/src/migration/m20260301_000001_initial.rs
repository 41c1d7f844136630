//! Initial database migration.
//!
//! Creates the annotation store: enums, tables, indexes, the token trigger and
//! project isolation policies.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: PROJECTS & RECORDS
        // ============================================================
        db.execute_unprepared(PROJECTS_SQL).await?;
        db.execute_unprepared(RECORDS_SQL).await?;

        // ============================================================
        // PART 3: LABELING TASKS
        // ============================================================
        db.execute_unprepared(LABELING_TASKS_SQL).await?;
        db.execute_unprepared(LABELING_TASK_LABELS_SQL).await?;

        // ============================================================
        // PART 4: ANNOTATIONS
        // ============================================================
        db.execute_unprepared(ANNOTATIONS_SQL).await?;
        db.execute_unprepared(ANNOTATION_TOKENS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // ============================================================
        // PART 6: ROW-LEVEL SECURITY
        // ============================================================
        db.execute_unprepared(RLS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Labeling task type
CREATE TYPE task_type AS ENUM (
    'MULTICLASS_CLASSIFICATION',
    'INFORMATION_EXTRACTION'
);

-- Producer of an annotation
CREATE TYPE label_source AS ENUM (
    'MANUAL',
    'WEAK_SUPERVISION',
    'INFORMATION_SOURCE',
    'MODEL_CALLBACK'
);

-- Whole-record judgment or token-level extraction
CREATE TYPE annotation_kind AS ENUM ('RETURN', 'YIELD');
";

const PROJECTS_SQL: &str = r"
CREATE TABLE projects (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const RECORDS_SQL: &str = r"
CREATE TABLE records (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_records_project ON records(project_id);
";

const LABELING_TASKS_SQL: &str = r"
CREATE TABLE labeling_tasks (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    task_type task_type NOT NULL,
    attribute_name VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_labeling_task_name UNIQUE (project_id, name)
);

CREATE INDEX idx_labeling_tasks_project ON labeling_tasks(project_id);
";

const LABELING_TASK_LABELS_SQL: &str = r"
CREATE TABLE labeling_task_labels (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    labeling_task_id UUID NOT NULL REFERENCES labeling_tasks(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_labeling_task_label_name UNIQUE (labeling_task_id, name)
);

CREATE INDEX idx_labeling_task_labels_task ON labeling_task_labels(labeling_task_id);
";

const ANNOTATIONS_SQL: &str = r"
CREATE TABLE annotations (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    record_id UUID NOT NULL REFERENCES records(id) ON DELETE CASCADE,
    labeling_task_label_id UUID NOT NULL REFERENCES labeling_task_labels(id) ON DELETE CASCADE,
    annotator_id UUID NOT NULL,
    kind annotation_kind NOT NULL,
    source label_source NOT NULL,
    is_gold_star BOOLEAN,
    is_valid_manual_label BOOLEAN,
    confidence NUMERIC(6, 5),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_confidence_range CHECK (confidence IS NULL OR (confidence >= 0 AND confidence <= 1))
);

CREATE INDEX idx_annotations_project_record ON annotations(project_id, record_id);
CREATE INDEX idx_annotations_label ON annotations(labeling_task_label_id);
CREATE INDEX idx_annotations_manual ON annotations(project_id, record_id)
    WHERE source = 'MANUAL';
";

const ANNOTATION_TOKENS_SQL: &str = r"
CREATE TABLE annotation_tokens (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    annotation_id UUID NOT NULL REFERENCES annotations(id) ON DELETE CASCADE,
    token_index INTEGER NOT NULL,
    is_beginning_token BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_annotation_token_index UNIQUE (annotation_id, token_index),
    CONSTRAINT chk_token_index_non_negative CHECK (token_index >= 0)
);

CREATE INDEX idx_annotation_tokens_annotation ON annotation_tokens(annotation_id);
";

const TRIGGERS_SQL: &str = r"
-- Token tags belong to YIELD annotations only
CREATE OR REPLACE FUNCTION check_token_owner_is_yield()
RETURNS TRIGGER AS $$
DECLARE
    v_kind annotation_kind;
BEGIN
    SELECT kind INTO v_kind FROM annotations WHERE id = NEW.annotation_id;

    IF v_kind IS DISTINCT FROM 'YIELD' THEN
        RAISE EXCEPTION 'Token tags can only be attached to YIELD annotations (annotation %)',
            NEW.annotation_id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_check_token_owner_is_yield
    BEFORE INSERT OR UPDATE OF annotation_id ON annotation_tokens
    FOR EACH ROW
    EXECUTE FUNCTION check_token_owner_is_yield();
";

const RLS_SQL: &str = r"
-- ============================================================
-- ROW-LEVEL SECURITY POLICIES
-- Enable RLS on all project-owned tables
-- ============================================================

ALTER TABLE records ENABLE ROW LEVEL SECURITY;
ALTER TABLE labeling_tasks ENABLE ROW LEVEL SECURITY;
ALTER TABLE labeling_task_labels ENABLE ROW LEVEL SECURITY;
ALTER TABLE annotations ENABLE ROW LEVEL SECURITY;
ALTER TABLE annotation_tokens ENABLE ROW LEVEL SECURITY;

-- Application sets context inside each transaction:
-- SET LOCAL app.current_project_id = 'project-uuid';

CREATE POLICY project_isolation ON records
    USING (project_id = NULLIF(current_setting('app.current_project_id', true), '')::UUID);

CREATE POLICY project_isolation ON labeling_tasks
    USING (project_id = NULLIF(current_setting('app.current_project_id', true), '')::UUID);

CREATE POLICY project_isolation ON labeling_task_labels
    USING (project_id = NULLIF(current_setting('app.current_project_id', true), '')::UUID);

CREATE POLICY project_isolation ON annotations
    USING (project_id = NULLIF(current_setting('app.current_project_id', true), '')::UUID);

CREATE POLICY project_isolation ON annotation_tokens
    USING (project_id = NULLIF(current_setting('app.current_project_id', true), '')::UUID);
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

DROP TRIGGER IF EXISTS trg_check_token_owner_is_yield ON annotation_tokens;
DROP FUNCTION IF EXISTS check_token_owner_is_yield();

DROP TABLE IF EXISTS annotation_tokens CASCADE;
DROP TABLE IF EXISTS annotations CASCADE;
DROP TABLE IF EXISTS labeling_task_labels CASCADE;
DROP TABLE IF EXISTS labeling_tasks CASCADE;
DROP TABLE IF EXISTS records CASCADE;
DROP TABLE IF EXISTS projects CASCADE;

DROP TYPE IF EXISTS annotation_kind;
DROP TYPE IF EXISTS label_source;
DROP TYPE IF EXISTS task_type;
";
