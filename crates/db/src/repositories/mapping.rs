//! Conversions between store rows and consensus types, and the scope loaders
//! every consensus operation reads through.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use labelvault_core::consensus::{
    Annotation, AnnotationKind as CoreKind, LabelSource as CoreSource, Scope, TaskMetadata,
    TaskType as CoreTaskType, TokenTag,
};
use labelvault_shared::types::{
    AnnotationId, LabelId, ProjectId, RecordId, TaskId, TokenTagId, UserId,
};

use crate::entities::{
    annotation_tokens, annotations, labeling_task_labels, labeling_tasks,
    sea_orm_active_enums::{AnnotationKind, LabelSource, TaskType},
};

/// Upper bound on ids bound into one `IN (...)` list.
pub(crate) const ID_CHUNK: usize = 5_000;

pub(crate) fn task_type_to_core(task_type: &TaskType) -> CoreTaskType {
    match task_type {
        TaskType::MulticlassClassification => CoreTaskType::Classification,
        TaskType::InformationExtraction => CoreTaskType::Extraction,
    }
}

pub(crate) fn task_type_to_db(task_type: CoreTaskType) -> TaskType {
    match task_type {
        CoreTaskType::Classification => TaskType::MulticlassClassification,
        CoreTaskType::Extraction => TaskType::InformationExtraction,
    }
}

pub(crate) fn kind_to_core(kind: &AnnotationKind) -> CoreKind {
    match kind {
        AnnotationKind::Return => CoreKind::Return,
        AnnotationKind::Yield => CoreKind::Yield,
    }
}

pub(crate) fn kind_to_db(kind: CoreKind) -> AnnotationKind {
    match kind {
        CoreKind::Return => AnnotationKind::Return,
        CoreKind::Yield => AnnotationKind::Yield,
    }
}

pub(crate) fn source_to_core(source: &LabelSource) -> CoreSource {
    match source {
        LabelSource::Manual => CoreSource::Manual,
        LabelSource::WeakSupervision => CoreSource::WeakSupervision,
        LabelSource::InformationSource => CoreSource::InformationSource,
        LabelSource::ModelCallback => CoreSource::ModelCallback,
    }
}

pub(crate) fn source_to_db(source: CoreSource) -> LabelSource {
    match source {
        CoreSource::Manual => LabelSource::Manual,
        CoreSource::WeakSupervision => LabelSource::WeakSupervision,
        CoreSource::InformationSource => LabelSource::InformationSource,
        CoreSource::ModelCallback => LabelSource::ModelCallback,
    }
}

/// Builds an engine annotation from its row and tags.
pub(crate) fn annotation_to_core(model: annotations::Model, mut tokens: Vec<TokenTag>) -> Annotation {
    tokens.sort_unstable();
    Annotation {
        id: AnnotationId::from_uuid(model.id),
        project_id: ProjectId::from_uuid(model.project_id),
        record_id: RecordId::from_uuid(model.record_id),
        label_id: LabelId::from_uuid(model.labeling_task_label_id),
        annotator_id: UserId::from_uuid(model.annotator_id),
        kind: kind_to_core(&model.kind),
        source: source_to_core(&model.source),
        is_gold_star: model.is_gold_star,
        is_valid_manual_label: model.is_valid_manual_label,
        confidence: model.confidence,
        created_at: model.created_at.with_timezone(&Utc),
        tokens,
    }
}

/// Row for inserting an engine annotation. Tags are inserted separately.
pub(crate) fn annotation_to_active(annotation: &Annotation) -> annotations::ActiveModel {
    annotations::ActiveModel {
        id: Set(annotation.id.into_inner()),
        project_id: Set(annotation.project_id.into_inner()),
        record_id: Set(annotation.record_id.into_inner()),
        labeling_task_label_id: Set(annotation.label_id.into_inner()),
        annotator_id: Set(annotation.annotator_id.into_inner()),
        kind: Set(kind_to_db(annotation.kind)),
        source: Set(source_to_db(annotation.source)),
        is_gold_star: Set(annotation.is_gold_star),
        is_valid_manual_label: Set(annotation.is_valid_manual_label),
        confidence: Set(annotation.confidence),
        created_at: Set(annotation.created_at.into()),
    }
}

/// Tag rows owned by an annotation.
pub(crate) fn tokens_to_active(annotation: &Annotation) -> Vec<annotation_tokens::ActiveModel> {
    annotation
        .tokens
        .iter()
        .map(|tag| annotation_tokens::ActiveModel {
            id: Set(TokenTagId::new().into_inner()),
            project_id: Set(annotation.project_id.into_inner()),
            annotation_id: Set(annotation.id.into_inner()),
            token_index: Set(tag.token_index),
            is_beginning_token: Set(tag.is_beginning_token),
            created_at: Set(annotation.created_at.into()),
        })
        .collect()
}

/// Loads task and label metadata of a project.
pub(crate) async fn load_metadata<C: ConnectionTrait>(
    conn: &C,
    project_id: ProjectId,
) -> Result<TaskMetadata, DbErr> {
    let tasks = labeling_tasks::Entity::find()
        .filter(labeling_tasks::Column::ProjectId.eq(project_id.into_inner()))
        .all(conn)
        .await?;
    let labels = labeling_task_labels::Entity::find()
        .filter(labeling_task_labels::Column::ProjectId.eq(project_id.into_inner()))
        .all(conn)
        .await?;

    let mut metadata = TaskMetadata::new();
    for task in &tasks {
        metadata.add_task(TaskId::from_uuid(task.id), task_type_to_core(&task.task_type));
    }
    for label in &labels {
        metadata.add_label(
            LabelId::from_uuid(label.id),
            TaskId::from_uuid(label.labeling_task_id),
        );
    }
    Ok(metadata)
}

/// Which producers to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sources {
    /// Manual annotations only.
    Manual,
    /// Manual and weak-supervision annotations.
    ManualAndWeakSupervision,
}

/// Loads annotations in a scope, tags included.
///
/// A task scope resolves to the task's labels through `metadata`; a task
/// without labels yields nothing.
pub(crate) async fn load_scope<C: ConnectionTrait>(
    conn: &C,
    scope: Scope,
    metadata: &TaskMetadata,
    sources: Sources,
) -> Result<Vec<Annotation>, DbErr> {
    let mut query = annotations::Entity::find()
        .filter(annotations::Column::ProjectId.eq(scope.project_id.into_inner()));

    query = match sources {
        Sources::Manual => query.filter(annotations::Column::Source.eq(LabelSource::Manual)),
        Sources::ManualAndWeakSupervision => query.filter(
            annotations::Column::Source
                .is_in([LabelSource::Manual, LabelSource::WeakSupervision]),
        ),
    };

    if let Some(record_id) = scope.record_id {
        query = query.filter(annotations::Column::RecordId.eq(record_id.into_inner()));
    }
    if let Some(task_id) = scope.task_id {
        let labels = metadata.labels_of(task_id);
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        query = query.filter(
            annotations::Column::LabelingTaskLabelId
                .is_in(labels.into_iter().map(LabelId::into_inner)),
        );
    }

    let models = query
        .order_by_asc(annotations::Column::Id)
        .all(conn)
        .await?;

    attach_tokens(conn, models).await
}

/// Loads the given annotations with a shared row lock, tags included.
///
/// Rows the caller cannot see (other project, deleted) are simply absent.
pub(crate) async fn load_locked<C: ConnectionTrait>(
    conn: &C,
    project_id: ProjectId,
    ids: &[AnnotationId],
) -> Result<Vec<Annotation>, DbErr> {
    let models = annotations::Entity::find()
        .filter(annotations::Column::ProjectId.eq(project_id.into_inner()))
        .filter(annotations::Column::Id.is_in(ids.iter().map(|id| id.into_inner())))
        .lock_shared()
        .all(conn)
        .await?;

    attach_tokens(conn, models).await
}

async fn attach_tokens<C: ConnectionTrait>(
    conn: &C,
    models: Vec<annotations::Model>,
) -> Result<Vec<Annotation>, DbErr> {
    let yield_ids: Vec<Uuid> = models
        .iter()
        .filter(|m| m.kind == AnnotationKind::Yield)
        .map(|m| m.id)
        .collect();

    let mut tokens: HashMap<Uuid, Vec<TokenTag>> = HashMap::new();
    for chunk in yield_ids.chunks(ID_CHUNK) {
        let rows = annotation_tokens::Entity::find()
            .filter(annotation_tokens::Column::AnnotationId.is_in(chunk.iter().copied()))
            .all(conn)
            .await?;
        for row in rows {
            tokens
                .entry(row.annotation_id)
                .or_default()
                .push(TokenTag::new(row.token_index, row.is_beginning_token));
        }
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let tags = tokens.remove(&model.id).unwrap_or_default();
            annotation_to_core(model, tags)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn model(kind: AnnotationKind, source: LabelSource) -> annotations::Model {
        annotations::Model {
            id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            record_id: Uuid::now_v7(),
            labeling_task_label_id: Uuid::now_v7(),
            annotator_id: Uuid::now_v7(),
            kind,
            source,
            is_gold_star: None,
            is_valid_manual_label: Some(false),
            confidence: Some(dec!(0.75)),
            created_at: FixedOffset::east_opt(7 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 3, 1, 15, 0, 0)
                .unwrap(),
        }
    }

    #[rstest]
    #[case(TaskType::MulticlassClassification, CoreTaskType::Classification)]
    #[case(TaskType::InformationExtraction, CoreTaskType::Extraction)]
    fn test_task_type_mapping(#[case] db: TaskType, #[case] core: CoreTaskType) {
        assert_eq!(task_type_to_core(&db), core);
        assert_eq!(task_type_to_db(core), db);
    }

    #[rstest]
    #[case(LabelSource::Manual, CoreSource::Manual)]
    #[case(LabelSource::WeakSupervision, CoreSource::WeakSupervision)]
    #[case(LabelSource::InformationSource, CoreSource::InformationSource)]
    #[case(LabelSource::ModelCallback, CoreSource::ModelCallback)]
    fn test_source_mapping(#[case] db: LabelSource, #[case] core: CoreSource) {
        assert_eq!(source_to_core(&db), core);
        assert_eq!(source_to_db(core), db);
    }

    #[test]
    fn test_row_to_annotation_normalizes_time_and_sorts_tags() {
        let row = model(AnnotationKind::Yield, LabelSource::Manual);
        let row_id = row.id;

        let annotation = annotation_to_core(
            row,
            vec![TokenTag::new(5, false), TokenTag::new(4, true)],
        );

        assert_eq!(annotation.id.into_inner(), row_id);
        assert_eq!(annotation.kind, CoreKind::Yield);
        assert_eq!(annotation.is_valid_manual_label, Some(false));
        assert_eq!(
            annotation.created_at,
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(
            annotation.tokens,
            vec![TokenTag::new(4, true), TokenTag::new(5, false)]
        );
    }

    #[test]
    fn test_annotation_to_rows_keeps_fields() {
        let mut annotation =
            annotation_to_core(model(AnnotationKind::Yield, LabelSource::Manual), Vec::new());
        annotation.is_gold_star = Some(true);
        annotation.tokens = vec![TokenTag::new(2, true), TokenTag::new(3, false)];

        let row = annotation_to_active(&annotation);
        let tags = tokens_to_active(&annotation);

        assert_eq!(row.id, Set(annotation.id.into_inner()));
        assert_eq!(row.kind, Set(AnnotationKind::Yield));
        assert_eq!(row.is_gold_star, Set(Some(true)));
        assert_eq!(tags.len(), 2);
        assert!(tags
            .iter()
            .all(|t| t.annotation_id == Set(annotation.id.into_inner())));
        assert_eq!(tags[0].token_index, Set(2));
        assert_eq!(tags[0].is_beginning_token, Set(true));
    }
}
