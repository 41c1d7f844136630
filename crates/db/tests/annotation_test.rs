//! Integration tests for annotation write paths, the manual label uniqueness
//! constraint and label statistics.
//!
//! Requires a running `PostgreSQL` database with migrations applied
//! (`DATABASE_URL`). Tests skip themselves when none is available.

mod common;

use chrono::Utc;
use sea_orm::{ActiveValue::Set, EntityTrait, SqlErr};

use labelvault_core::consensus::{Scope, TaskType, TokenTag};
use labelvault_core::stats::StatsError;
use labelvault_db::entities::{
    annotations,
    sea_orm_active_enums::{AnnotationKind, LabelSource},
};
use labelvault_db::repositories::{
    AnnotationError, SubmitClassificationInput, SubmitExtractionInput,
};
use labelvault_db::rls::RlsConnection;
use labelvault_shared::types::{AnnotationId, UserId};

use common::Ctx;

fn manual_return_row(ctx: &Ctx, annotator_id: UserId) -> annotations::ActiveModel {
    annotations::ActiveModel {
        id: Set(AnnotationId::new().into_inner()),
        project_id: Set(ctx.project_id.into_inner()),
        record_id: Set(ctx.record_id.into_inner()),
        labeling_task_label_id: Set(ctx.pos.into_inner()),
        annotator_id: Set(annotator_id.into_inner()),
        kind: Set(AnnotationKind::Return),
        source: Set(LabelSource::Manual),
        is_gold_star: Set(None),
        is_valid_manual_label: Set(None),
        confidence: Set(None),
        created_at: Set(Utc::now().into()),
    }
}

// ============================================================================
// Uniqueness of ordinary manual classification labels
// ============================================================================

#[tokio::test]
async fn test_double_submit_returns_existing_row() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    let input = SubmitClassificationInput {
        project_id: ctx.project_id,
        record_id: ctx.record_id,
        label_id: ctx.pos,
        annotator_id: UserId::new(),
    };

    let first = ctx.annotations.submit_classification(input).await.unwrap();
    let second = ctx.annotations.submit_classification(input).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert!(second.recompute.is_none());
    assert_eq!(first.annotation.id, second.annotation.id);
}

#[tokio::test]
async fn test_changed_classification_replaces_previous_label() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    let annotator = UserId::new();

    let first = ctx.classify(annotator, ctx.pos).await;
    let changed = ctx
        .annotations
        .submit_classification(SubmitClassificationInput {
            project_id: ctx.project_id,
            record_id: ctx.record_id,
            label_id: ctx.neg,
            annotator_id: annotator,
        })
        .await
        .unwrap();

    assert!(changed.created);
    assert_eq!(changed.replaced, 1);
    assert!(ctx.annotations.find(ctx.project_id, first).await.unwrap().is_none());
    assert_eq!(ctx.is_valid(changed.annotation.id).await, Some(true));

    let valid = ctx
        .annotations
        .valid_manual_annotations(ctx.project_id, ctx.task_id, Some(ctx.record_id))
        .await
        .unwrap();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].label_id, ctx.neg);
    assert_eq!(valid[0].annotator_id, annotator);
}

#[tokio::test]
async fn test_relabel_leaves_other_annotators_alone() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    let (a1, a2) = (UserId::new(), UserId::new());

    let kept = ctx.classify(a2, ctx.pos).await;
    ctx.classify(a1, ctx.pos).await;
    ctx.classify(a1, ctx.neg).await;

    // A2 still holds Pos, so the key stays contested
    assert_eq!(ctx.get(kept).await.label_id, ctx.pos);
    assert_eq!(ctx.is_valid(kept).await, Some(false));
}

#[tokio::test]
async fn test_unique_index_rejects_raw_duplicate() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    let annotator = UserId::new();

    let rls = RlsConnection::new(&ctx.db, ctx.project_id).await.unwrap();
    annotations::Entity::insert(manual_return_row(&ctx, annotator))
        .exec(rls.transaction())
        .await
        .unwrap();
    let err = annotations::Entity::insert(manual_return_row(&ctx, annotator))
        .exec(rls.transaction())
        .await
        .unwrap_err();
    rls.rollback().await.unwrap();

    assert!(matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));
}

#[tokio::test]
async fn test_gold_stars_are_outside_unique_index() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    let reviewer = UserId::new();

    let rls = RlsConnection::new(&ctx.db, ctx.project_id).await.unwrap();
    for _ in 0..2 {
        let mut row = manual_return_row(&ctx, reviewer);
        row.is_gold_star = Set(Some(true));
        annotations::Entity::insert(row)
            .exec(rls.transaction())
            .await
            .unwrap();
    }
    rls.commit().await.unwrap();

    let outcome = ctx
        .consensus
        .recompute_validity(Scope::record(ctx.project_id, ctx.record_id))
        .await
        .unwrap();
    assert_eq!(outcome.summary.single_opinion_keys, 1);
    assert_eq!(outcome.duplicates_removed, 0);
}

// ============================================================================
// Submission validation
// ============================================================================

#[tokio::test]
async fn test_classification_label_on_extraction_task_rejected() {
    let Some(ctx) = Ctx::setup(TaskType::Extraction).await else {
        return;
    };

    let result = ctx
        .annotations
        .submit_classification(SubmitClassificationInput {
            project_id: ctx.project_id,
            record_id: ctx.record_id,
            label_id: ctx.pos,
            annotator_id: UserId::new(),
        })
        .await;

    assert!(matches!(
        result,
        Err(AnnotationError::WrongTaskType {
            task_type: TaskType::Extraction,
            ..
        })
    ));
}

#[tokio::test]
async fn test_extraction_with_repeated_index_rejected() {
    let Some(ctx) = Ctx::setup(TaskType::Extraction).await else {
        return;
    };

    let result = ctx
        .annotations
        .submit_extraction(SubmitExtractionInput {
            project_id: ctx.project_id,
            record_id: ctx.record_id,
            label_id: ctx.pos,
            annotator_id: UserId::new(),
            tokens: vec![TokenTag::new(4, true), TokenTag::new(4, false)],
        })
        .await;

    assert!(matches!(result, Err(AnnotationError::DuplicateTokenIndex(4))));
}

#[tokio::test]
async fn test_retracting_extraction_cascades_tags() {
    let Some(ctx) = Ctx::setup(TaskType::Extraction).await else {
        return;
    };
    let id = ctx.extract(UserId::new(), ctx.pos, &[0, 1, 2]).await;

    ctx.annotations.retract(ctx.project_id, id, None).await.unwrap();

    assert!(ctx.annotations.find(ctx.project_id, id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_retract_by_other_annotator_rejected() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    let (owner, intruder) = (UserId::new(), UserId::new());
    let id = ctx.classify(owner, ctx.pos).await;

    let result = ctx.annotations.retract(ctx.project_id, id, Some(intruder)).await;

    assert!(matches!(result, Err(AnnotationError::NotOwner(rejected)) if rejected == id));
    assert_eq!(ctx.is_valid(id).await, Some(true));

    let deletion = ctx
        .annotations
        .retract(ctx.project_id, id, Some(owner))
        .await
        .unwrap();
    assert_eq!(deletion.rows_deleted, 1);
}

#[tokio::test]
async fn test_delete_for_task_clears_valid_labels() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    ctx.classify(UserId::new(), ctx.pos).await;
    ctx.classify(UserId::new(), ctx.pos).await;

    let deletion = ctx
        .annotations
        .delete_for_task(ctx.project_id, ctx.task_id)
        .await
        .unwrap();

    assert_eq!(deletion.rows_deleted, 2);
    let valid = ctx
        .annotations
        .valid_manual_annotations(ctx.project_id, ctx.task_id, None)
        .await
        .unwrap();
    assert!(valid.is_empty());
}

// ============================================================================
// Statistics
// ============================================================================

#[tokio::test]
async fn test_label_distribution_counts_valid_manual_only() {
    let Some(ctx) = Ctx::setup(TaskType::Classification).await else {
        return;
    };
    ctx.classify(UserId::new(), ctx.pos).await;
    ctx.classify(UserId::new(), ctx.pos).await;

    let distribution = ctx
        .statistics
        .label_distribution(ctx.project_id, ctx.task_id)
        .await
        .unwrap();

    let pos = distribution
        .labels
        .iter()
        .find(|l| l.label_id == ctx.pos)
        .unwrap();
    assert_eq!(pos.manual, 1);
    assert_eq!(distribution.manual_total(), 1);
}

#[tokio::test]
async fn test_confusion_matrix_rejects_extraction_task() {
    let Some(ctx) = Ctx::setup(TaskType::Extraction).await else {
        return;
    };

    let result = ctx
        .statistics
        .confusion_matrix(ctx.project_id, ctx.task_id)
        .await;

    assert!(matches!(
        result,
        Err(StatsError::UnsupportedTaskType(TaskType::Extraction))
    ));
}
