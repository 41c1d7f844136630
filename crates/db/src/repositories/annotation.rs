//! Annotation repository: manual label write paths and the validity read
//! surface.
//!
//! Every write states the scope it invalidates and recomputes it through
//! [`ConsensusRepository::recompute_validity`].

use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
    SqlErr,
};
use serde::Serialize;
use tracing::{debug, info};

use labelvault_core::consensus::{
    Annotation, AnnotationKind, ConsensusError, LabelSource, Scope, TaskMetadata, TaskType,
    TokenTag,
};
use labelvault_shared::config::ConsensusConfig;
use labelvault_shared::types::{AnnotationId, LabelId, ProjectId, RecordId, TaskId, UserId};

use crate::entities::{
    annotation_tokens, annotations, records,
    sea_orm_active_enums::{AnnotationKind as DbKind, LabelSource as DbSource},
};
use crate::rls::RlsConnection;

use super::consensus::{ConsensusRepository, RecomputeOutcome, delete_ids};
use super::mapping::{
    Sources, annotation_to_active, annotation_to_core, load_locked, load_metadata, load_scope,
    tokens_to_active,
};

/// Error types for annotation operations.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// Record not found in the project.
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// Label not found in the project.
    #[error("Label not found: {0}")]
    LabelNotFound(LabelId),

    /// The label's task does not take this kind of annotation.
    #[error("Label {label_id} belongs to a {task_type:?} task")]
    WrongTaskType {
        /// Submitted label.
        label_id: LabelId,
        /// Type of the label's task.
        task_type: TaskType,
    },

    /// A token index appears twice in one extraction.
    #[error("Token index {0} tagged more than once")]
    DuplicateTokenIndex(i32),

    /// Token indices start at zero.
    #[error("Invalid token index: {0}")]
    NegativeTokenIndex(i32),

    /// The conflicting row of an idempotent submit disappeared before it could be read.
    #[error("Annotation changed concurrently, retry the submission")]
    Conflict,

    /// Only the annotator who wrote an annotation may retract it.
    #[error("Annotation {0} belongs to another annotator")]
    NotOwner(AnnotationId),

    /// Validity recompute failed after the write.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Input for a classification submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitClassificationInput {
    /// Project.
    pub project_id: ProjectId,
    /// Annotated record.
    pub record_id: RecordId,
    /// Chosen label.
    pub label_id: LabelId,
    /// Submitting annotator.
    pub annotator_id: UserId,
}

/// Input for an extraction submission.
#[derive(Debug, Clone)]
pub struct SubmitExtractionInput {
    /// Project.
    pub project_id: ProjectId,
    /// Annotated record.
    pub record_id: RecordId,
    /// Label of the tagged span(s).
    pub label_id: LabelId,
    /// Submitting annotator.
    pub annotator_id: UserId,
    /// Tagged tokens.
    pub tokens: Vec<TokenTag>,
}

/// Result of a submission.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    /// The stored annotation with its current validity.
    pub annotation: Annotation,
    /// False when an identical classification already existed.
    pub created: bool,
    /// Earlier labels of the same annotator on the same task that this submission replaced.
    pub replaced: u64,
    /// Recompute of the record, absent when nothing was written.
    pub recompute: Option<RecomputeOutcome>,
}

/// Result of a deletion.
#[derive(Debug, Clone, Serialize)]
pub struct Deletion {
    /// Rows deleted.
    pub rows_deleted: u64,
    /// Recompute of the affected scope, absent when nothing was deleted.
    pub recompute: Option<RecomputeOutcome>,
}

/// Annotation repository.
#[derive(Debug, Clone)]
pub struct AnnotationRepository {
    db: DatabaseConnection,
    consensus: ConsensusRepository,
}

impl AnnotationRepository {
    /// Creates a new annotation repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: ConsensusConfig) -> Self {
        Self {
            consensus: ConsensusRepository::new(db.clone(), config),
            db,
        }
    }

    /// Finds an annotation with its tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(
        &self,
        project_id: ProjectId,
        annotation_id: AnnotationId,
    ) -> Result<Option<Annotation>, AnnotationError> {
        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let mut found = load_locked(rls.transaction(), project_id, &[annotation_id])
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        rls.commit()
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        Ok(found.pop())
    }

    /// Submits a manual classification label.
    ///
    /// Submitting the same label twice is idempotent: the unique index on
    /// ordinary manual RETURN rows rejects the second insert and the existing
    /// row is returned with `created = false`.
    ///
    /// Changing the label replaces the annotator's earlier choice: their other
    /// ordinary manual RETURN rows for the task on this record are deleted in
    /// the same transaction as the insert.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Record or label is not found
    /// - The label belongs to an extraction task
    /// - Database operation or the following recompute fails
    pub async fn submit_classification(
        &self,
        input: SubmitClassificationInput,
    ) -> Result<Submission, AnnotationError> {
        let annotation = Annotation {
            id: AnnotationId::new(),
            project_id: input.project_id,
            record_id: input.record_id,
            label_id: input.label_id,
            annotator_id: input.annotator_id,
            kind: AnnotationKind::Return,
            source: LabelSource::Manual,
            is_gold_star: None,
            is_valid_manual_label: None,
            confidence: None,
            created_at: Utc::now(),
            tokens: Vec::new(),
        };

        let rls = RlsConnection::new(&self.db, input.project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), input.project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;
        let task_id = check_label(&metadata, input.label_id, TaskType::Classification)?;
        check_record(&rls, input.project_id, input.record_id).await?;

        let superseded = superseded_labels(&metadata, task_id, input.label_id);
        let replaced = if superseded.is_empty() {
            0
        } else {
            annotations::Entity::delete_many()
                .filter(annotations::Column::ProjectId.eq(input.project_id.into_inner()))
                .filter(annotations::Column::RecordId.eq(input.record_id.into_inner()))
                .filter(annotations::Column::AnnotatorId.eq(input.annotator_id.into_inner()))
                .filter(annotations::Column::Source.eq(DbSource::Manual))
                .filter(annotations::Column::Kind.eq(DbKind::Return))
                .filter(ordinary_rows())
                .filter(
                    annotations::Column::LabelingTaskLabelId
                        .is_in(superseded.into_iter().map(LabelId::into_inner)),
                )
                .exec(rls.transaction())
                .await
                .map_err(|e| AnnotationError::Database(e.to_string()))?
                .rows_affected
        };

        let inserted = annotations::Entity::insert(annotation_to_active(&annotation))
            .exec(rls.transaction())
            .await;

        match inserted {
            Ok(_) => {
                rls.commit()
                    .await
                    .map_err(|e| AnnotationError::Database(e.to_string()))?;
            }
            // Also rolls back the replacement
            Err(e) if is_unique_violation(&e) => {
                rls.rollback()
                    .await
                    .map_err(|e| AnnotationError::Database(e.to_string()))?;

                debug!(
                    record_id = %input.record_id,
                    label_id = %input.label_id,
                    annotator_id = %input.annotator_id,
                    "Classification already submitted"
                );
                let existing = self.existing_classification(input).await?;
                return Ok(Submission {
                    annotation: existing,
                    created: false,
                    replaced: 0,
                    recompute: None,
                });
            }
            Err(e) => return Err(AnnotationError::Database(e.to_string())),
        }

        if replaced > 0 {
            info!(
                record_id = %input.record_id,
                annotator_id = %input.annotator_id,
                replaced,
                "Replaced earlier classification"
            );
        }

        self.after_submit(annotation, replaced).await
    }

    /// Submits a manual extraction: one YIELD annotation owning `tokens`.
    ///
    /// The annotation and its tags are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A token index is negative or repeated
    /// - Record or label is not found
    /// - The label belongs to a classification task
    /// - Database operation or the following recompute fails
    pub async fn submit_extraction(
        &self,
        input: SubmitExtractionInput,
    ) -> Result<Submission, AnnotationError> {
        validate_tokens(&input.tokens)?;

        let annotation = Annotation {
            id: AnnotationId::new(),
            project_id: input.project_id,
            record_id: input.record_id,
            label_id: input.label_id,
            annotator_id: input.annotator_id,
            kind: AnnotationKind::Yield,
            source: LabelSource::Manual,
            is_gold_star: None,
            is_valid_manual_label: None,
            confidence: None,
            created_at: Utc::now(),
            tokens: input.tokens,
        };

        let rls = RlsConnection::new(&self.db, input.project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), input.project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;
        check_label(&metadata, input.label_id, TaskType::Extraction)?;
        check_record(&rls, input.project_id, input.record_id).await?;

        annotations::Entity::insert(annotation_to_active(&annotation))
            .exec(rls.transaction())
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let tags = tokens_to_active(&annotation);
        if !tags.is_empty() {
            annotation_tokens::Entity::insert_many(tags)
                .exec(rls.transaction())
                .await
                .map_err(|e| AnnotationError::Database(e.to_string()))?;
        }

        rls.commit()
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        self.after_submit(annotation, 0).await
    }

    /// Deletes an annotation (tags cascade) and recomputes its record.
    ///
    /// With `owner` set, the row must have been written by that annotator.
    /// The row is locked for the check, so ownership and deletion see the
    /// same row. Retracting a missing annotation is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `owner` is set and did not write the annotation
    /// - Database operation or the following recompute fails
    pub async fn retract(
        &self,
        project_id: ProjectId,
        annotation_id: AnnotationId,
        owner: Option<UserId>,
    ) -> Result<Deletion, AnnotationError> {
        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let row = annotations::Entity::find_by_id(annotation_id.into_inner())
            .filter(annotations::Column::ProjectId.eq(project_id.into_inner()))
            .lock_exclusive()
            .one(rls.transaction())
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let Some(row) = row else {
            rls.rollback()
                .await
                .map_err(|e| AnnotationError::Database(e.to_string()))?;
            debug!(annotation_id = %annotation_id, "Annotation already gone");
            return Ok(Deletion {
                rows_deleted: 0,
                recompute: None,
            });
        };

        if owner.is_some_and(|user| user.into_inner() != row.annotator_id) {
            rls.rollback()
                .await
                .map_err(|e| AnnotationError::Database(e.to_string()))?;
            return Err(AnnotationError::NotOwner(annotation_id));
        }

        let rows_deleted = delete_ids(rls.transaction(), &[annotation_id], 1)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        rls.commit()
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        info!(annotation_id = %annotation_id, "Retracted annotation");

        let scope = Scope::record(project_id, RecordId::from_uuid(row.record_id));
        let recompute = self.consensus.recompute_validity(scope).await?;

        Ok(Deletion {
            rows_deleted,
            recompute: Some(recompute),
        })
    }

    /// Deletes every annotation of a task, then recomputes the task scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or the recompute fails.
    pub async fn delete_for_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> Result<Deletion, AnnotationError> {
        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;
        let labels = metadata.labels_of(task_id);

        let rows_deleted = if labels.is_empty() {
            0
        } else {
            annotations::Entity::delete_many()
                .filter(annotations::Column::ProjectId.eq(project_id.into_inner()))
                .filter(
                    annotations::Column::LabelingTaskLabelId
                        .is_in(labels.into_iter().map(LabelId::into_inner)),
                )
                .exec(rls.transaction())
                .await
                .map_err(|e| AnnotationError::Database(e.to_string()))?
                .rows_affected
        };

        rls.commit()
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        info!(task_id = %task_id, rows_deleted, "Deleted task annotations");

        let recompute = self
            .consensus
            .recompute_validity(Scope::task(project_id, task_id))
            .await?;

        Ok(Deletion {
            rows_deleted,
            recompute: Some(recompute),
        })
    }

    /// Manual annotations flagged valid for a task, optionally one record.
    ///
    /// This is what export, statistics and training-set builders consume.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn valid_manual_annotations(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        record_id: Option<RecordId>,
    ) -> Result<Vec<Annotation>, AnnotationError> {
        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;
        let scope = Scope {
            project_id,
            task_id: Some(task_id),
            record_id,
        };
        let annotations = load_scope(rls.transaction(), scope, &metadata, Sources::Manual)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        rls.commit()
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        Ok(annotations
            .into_iter()
            .filter(|a| a.is_valid_manual_label == Some(true))
            .collect())
    }

    async fn after_submit(
        &self,
        annotation: Annotation,
        replaced: u64,
    ) -> Result<Submission, AnnotationError> {
        info!(
            annotation_id = %annotation.id,
            record_id = %annotation.record_id,
            annotator_id = %annotation.annotator_id,
            tags = annotation.tokens.len(),
            "Stored manual annotation"
        );

        let scope = Scope::record(annotation.project_id, annotation.record_id);
        let recompute = self.consensus.recompute_validity(scope).await?;

        // Reload for the flag just written; a concurrent retract leaves the insert as is
        let stored = self
            .find(annotation.project_id, annotation.id)
            .await?
            .unwrap_or(annotation);

        Ok(Submission {
            annotation: stored,
            created: true,
            replaced,
            recompute: Some(recompute),
        })
    }

    async fn existing_classification(
        &self,
        input: SubmitClassificationInput,
    ) -> Result<Annotation, AnnotationError> {
        let rls = RlsConnection::new(&self.db, input.project_id)
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        let row = annotations::Entity::find()
            .filter(annotations::Column::ProjectId.eq(input.project_id.into_inner()))
            .filter(annotations::Column::RecordId.eq(input.record_id.into_inner()))
            .filter(annotations::Column::LabelingTaskLabelId.eq(input.label_id.into_inner()))
            .filter(annotations::Column::AnnotatorId.eq(input.annotator_id.into_inner()))
            .filter(annotations::Column::Source.eq(DbSource::Manual))
            .filter(annotations::Column::Kind.eq(DbKind::Return))
            .filter(ordinary_rows())
            .one(rls.transaction())
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        rls.commit()
            .await
            .map_err(|e| AnnotationError::Database(e.to_string()))?;

        row.map(|model| annotation_to_core(model, Vec::new()))
            .ok_or(AnnotationError::Conflict)
    }
}

/// Checks the tags of one extraction: non-negative, each index once.
///
/// # Errors
///
/// Returns the first offending index.
pub fn validate_tokens(tokens: &[TokenTag]) -> Result<(), AnnotationError> {
    let mut seen = BTreeSet::new();
    for tag in tokens {
        if tag.token_index < 0 {
            return Err(AnnotationError::NegativeTokenIndex(tag.token_index));
        }
        if !seen.insert(tag.token_index) {
            return Err(AnnotationError::DuplicateTokenIndex(tag.token_index));
        }
    }
    Ok(())
}

/// Labels of `task_id` other than `chosen`.
///
/// An annotator holds one classification per task and record, so choosing
/// `chosen` supersedes their rows under any of these.
#[must_use]
pub fn superseded_labels(
    metadata: &TaskMetadata,
    task_id: TaskId,
    chosen: LabelId,
) -> Vec<LabelId> {
    metadata
        .labels_of(task_id)
        .into_iter()
        .filter(|label| *label != chosen)
        .collect()
}

/// Rows that are not gold stars.
fn ordinary_rows() -> Condition {
    Condition::any()
        .add(annotations::Column::IsGoldStar.is_null())
        .add(annotations::Column::IsGoldStar.eq(false))
}

/// Resolves the label's task, checking its type.
fn check_label(
    metadata: &TaskMetadata,
    label_id: LabelId,
    expected: TaskType,
) -> Result<TaskId, AnnotationError> {
    let (task_id, task_type) = metadata
        .resolve(label_id)
        .ok_or(AnnotationError::LabelNotFound(label_id))?;
    if task_type == expected {
        Ok(task_id)
    } else {
        Err(AnnotationError::WrongTaskType {
            label_id,
            task_type,
        })
    }
}

async fn check_record(
    rls: &RlsConnection,
    project_id: ProjectId,
    record_id: RecordId,
) -> Result<(), AnnotationError> {
    records::Entity::find_by_id(record_id.into_inner())
        .filter(records::Column::ProjectId.eq(project_id.into_inner()))
        .one(rls.transaction())
        .await
        .map_err(|e| AnnotationError::Database(e.to_string()))?
        .map(|_| ())
        .ok_or(AnnotationError::RecordNotFound(record_id))
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tokens_accepts_span() {
        let tokens = [TokenTag::new(3, true), TokenTag::new(4, false), TokenTag::new(5, false)];
        assert!(validate_tokens(&tokens).is_ok());
    }

    #[test]
    fn test_validate_tokens_accepts_empty() {
        assert!(validate_tokens(&[]).is_ok());
    }

    #[test]
    fn test_validate_tokens_rejects_repeated_index() {
        let tokens = [TokenTag::new(3, true), TokenTag::new(3, false)];
        assert!(matches!(
            validate_tokens(&tokens),
            Err(AnnotationError::DuplicateTokenIndex(3))
        ));
    }

    #[test]
    fn test_validate_tokens_rejects_negative_index() {
        let tokens = [TokenTag::new(-1, true)];
        assert!(matches!(
            validate_tokens(&tokens),
            Err(AnnotationError::NegativeTokenIndex(-1))
        ));
    }

    #[test]
    fn test_check_label_task_type() {
        let task_id = TaskId::new();
        let label_id = LabelId::new();
        let metadata = TaskMetadata::new()
            .with_task(task_id, TaskType::Extraction)
            .with_label(label_id, task_id);

        assert_eq!(
            check_label(&metadata, label_id, TaskType::Extraction).ok(),
            Some(task_id)
        );
        assert!(matches!(
            check_label(&metadata, label_id, TaskType::Classification),
            Err(AnnotationError::WrongTaskType { task_type: TaskType::Extraction, .. })
        ));
        assert!(matches!(
            check_label(&metadata, LabelId::new(), TaskType::Classification),
            Err(AnnotationError::LabelNotFound(_))
        ));
    }

    #[test]
    fn test_superseded_labels_are_the_task_siblings() {
        let task_id = TaskId::new();
        let other_task = TaskId::new();
        let (pos, neg, neutral, person) =
            (LabelId::new(), LabelId::new(), LabelId::new(), LabelId::new());
        let metadata = TaskMetadata::new()
            .with_task(task_id, TaskType::Classification)
            .with_task(other_task, TaskType::Extraction)
            .with_label(pos, task_id)
            .with_label(neg, task_id)
            .with_label(neutral, task_id)
            .with_label(person, other_task);

        let mut superseded = superseded_labels(&metadata, task_id, pos);
        superseded.sort();
        let mut expected = vec![neg, neutral];
        expected.sort();

        assert_eq!(superseded, expected);
    }
}
