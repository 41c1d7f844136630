//! Consensus repository: validity recompute, gold-star promotion and the
//! duplicate sweep against the annotation store.
//!
//! Each operation loads the annotations of its scope, runs the in-memory
//! engine from `labelvault_core::consensus` and writes the outcome back.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use labelvault_core::consensus::{
    Annotation, ConsensusError, ConsensusKey, DuplicateSuppressor, GoldStarPromoter,
    PromotionInput, Scope, TaskMetadata, ValidityChanges, ValidityReport, ValiditySummary,
    ValidityWriter,
};
use labelvault_shared::config::ConsensusConfig;
use labelvault_shared::types::{AnnotationId, ProjectId, UserId};

use crate::entities::{annotation_tokens, annotations};
use crate::rls::{RlsConnection, is_serialization_failure};

use super::mapping::{
    Sources, annotation_to_active, load_locked, load_metadata, load_scope, tokens_to_active,
};

/// Snapshot attempts before a recompute gives up on concurrent writers.
pub const MAX_RECOMPUTE_ATTEMPTS: u32 = 3;

/// Result of a validity recompute.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeOutcome {
    /// Scope that was recomputed.
    pub scope: Scope,
    /// Per-key counters.
    pub summary: ValiditySummary,
    /// Annotations whose flag changed.
    pub rows_updated: u64,
    /// Duplicates deleted by the pre-recompute sweep.
    pub duplicates_removed: u64,
    /// Snapshots taken, 1 unless a concurrent writer forced a retry.
    pub attempts: u32,
}

/// Result of a gold-star promotion.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionOutcome {
    /// Key the reviewer resolved.
    pub key: ConsensusKey,
    /// Ids of the new gold-star annotations, ordered by source id.
    pub gold_star_ids: Vec<AnnotationId>,
    /// Token tags cloned along with YIELD annotations.
    pub tags_cloned: usize,
    /// The record recompute that followed.
    pub recompute: RecomputeOutcome,
}

/// Result of a duplicate sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SuppressionOutcome {
    /// Scope that was swept.
    pub scope: Scope,
    /// Duplicate groups found.
    pub duplicate_sets: usize,
    /// Rows actually deleted; rows removed concurrently are not counted.
    pub rows_deleted: u64,
    /// The recompute that followed.
    pub recompute: RecomputeOutcome,
}

/// Consensus repository.
#[derive(Debug, Clone)]
pub struct ConsensusRepository {
    db: DatabaseConnection,
    config: ConsensusConfig,
}

impl ConsensusRepository {
    /// Creates a new consensus repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: ConsensusConfig) -> Self {
        Self { db, config }
    }

    /// Recomputes `is_valid_manual_label` for every manual annotation in scope.
    ///
    /// Runs on one `REPEATABLE READ` snapshot. A run that collides with a
    /// concurrent write is retried on a fresh snapshot, up to
    /// [`MAX_RECOMPUTE_ATTEMPTS`] times. Only flags that differ are written.
    ///
    /// # Errors
    ///
    /// Returns `ConsensusError::Database` if the store fails or the retries
    /// are exhausted.
    pub async fn recompute_validity(&self, scope: Scope) -> Result<RecomputeOutcome, ConsensusError> {
        let mut attempt = 1;
        loop {
            match self.recompute_once(scope, attempt).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < MAX_RECOMPUTE_ATTEMPTS && is_serialization_failure(&e) => {
                    warn!(
                        scope = %scope,
                        attempt,
                        "Recompute collided with a concurrent write, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(ConsensusError::Database(e.to_string())),
            }
        }
    }

    async fn recompute_once(&self, scope: Scope, attempt: u32) -> Result<RecomputeOutcome, DbErr> {
        let rls = RlsConnection::snapshot(&self.db, scope.project_id).await?;

        let metadata = load_metadata(rls.transaction(), scope.project_id).await?;
        let mut annotations =
            load_scope(rls.transaction(), scope, &metadata, Sources::Manual).await?;

        let duplicates_removed = if self.config.suppress_duplicates_before_recompute {
            let removed = DuplicateSuppressor::ids_to_remove(&annotations, &metadata);
            if removed.is_empty() {
                0
            } else {
                let deleted = delete_ids(rls.transaction(), &removed, self.config.batch_size).await?;
                let removed: HashSet<_> = removed.into_iter().collect();
                annotations.retain(|a| !removed.contains(&a.id));
                deleted
            }
        } else {
            0
        };

        let report = ValidityWriter::evaluate(&annotations, &metadata);
        log_anomalies(&scope, &annotations, &metadata, &report);

        let changes = ValidityWriter::changes(&annotations, &report);
        let rows_updated = write_flags(rls.transaction(), &changes, self.config.batch_size).await?;

        rls.commit().await?;

        let summary = report.summary;
        info!(
            scope = %scope,
            keys = summary.keys_evaluated,
            uncertain_keys = summary.keys_evaluated - summary.single_opinion_keys,
            gold_star_keys = summary.gold_star_keys,
            agreement_keys = summary.agreement_keys,
            unresolved_keys = summary.unresolved_keys,
            rows_updated,
            duplicates_removed,
            "Recomputed manual label validity"
        );

        Ok(RecomputeOutcome {
            scope,
            summary,
            rows_updated,
            duplicates_removed,
            attempts: attempt,
        })
    }

    /// Clones the selected annotations into gold stars owned by `reviewer_id`,
    /// then recomputes the key's record.
    ///
    /// Annotations and their tags are cloned in one transaction. The selected
    /// rows are share-locked so a concurrent retraction cannot slip between
    /// validation and insert.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The selection is empty
    /// - A selected annotation no longer exists (nothing is written)
    /// - A selected annotation is not manual or belongs to another key
    /// - Fewer than two annotators labeled the key
    /// - Database operation fails
    pub async fn promote_gold_star(
        &self,
        project_id: ProjectId,
        key: ConsensusKey,
        annotation_ids: &[AnnotationId],
        reviewer_id: UserId,
    ) -> Result<PromotionOutcome, ConsensusError> {
        let mut requested = annotation_ids.to_vec();
        requested.sort_unstable();
        requested.dedup();
        if requested.is_empty() {
            return Err(ConsensusError::EmptySelection);
        }

        let rls = RlsConnection::new(&self.db, project_id)
            .await
            .map_err(|e| ConsensusError::Database(e.to_string()))?;

        let metadata = load_metadata(rls.transaction(), project_id)
            .await
            .map_err(|e| ConsensusError::Database(e.to_string()))?;
        let selection = load_locked(rls.transaction(), project_id, &requested)
            .await
            .map_err(|e| ConsensusError::Database(e.to_string()))?;
        let key_annotations = load_scope(
            rls.transaction(),
            Scope::key(project_id, key),
            &metadata,
            Sources::Manual,
        )
        .await
        .map_err(|e| ConsensusError::Database(e.to_string()))?;

        let input = PromotionInput {
            key,
            requested: &requested,
            selection: &selection,
            key_annotations: &key_annotations,
            reviewer_id,
            promoted_at: Utc::now(),
        };
        // Dropping the transaction on error rolls it back
        let clones = GoldStarPromoter::plan(&input, &metadata)?;

        let mut tags_cloned = 0;
        for clone in &clones {
            annotations::Entity::insert(annotation_to_active(&clone.annotation))
                .exec(rls.transaction())
                .await
                .map_err(|e| ConsensusError::Database(e.to_string()))?;

            let tags = tokens_to_active(&clone.annotation);
            if !tags.is_empty() {
                tags_cloned += tags.len();
                annotation_tokens::Entity::insert_many(tags)
                    .exec(rls.transaction())
                    .await
                    .map_err(|e| ConsensusError::Database(e.to_string()))?;
            }
        }

        rls.commit()
            .await
            .map_err(|e| ConsensusError::Database(e.to_string()))?;

        info!(
            project_id = %project_id,
            key = %key,
            reviewer_id = %reviewer_id,
            annotations = clones.len(),
            tags = tags_cloned,
            "Promoted gold-star annotations"
        );

        let recompute = self
            .recompute_validity(Scope::record(project_id, key.record_id))
            .await?;

        Ok(PromotionOutcome {
            key,
            gold_star_ids: clones.iter().map(|c| c.annotation.id).collect(),
            tags_cloned,
            recompute,
        })
    }

    /// Deletes duplicate manual classification rows in scope, keeping the
    /// highest id of each group, then recomputes the scope.
    ///
    /// Rows deleted concurrently by someone else are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns `ConsensusError::Database` if the store fails.
    pub async fn suppress_duplicates(&self, scope: Scope) -> Result<SuppressionOutcome, ConsensusError> {
        let (duplicate_sets, rows_deleted) = self
            .sweep(scope)
            .await
            .map_err(|e| ConsensusError::Database(e.to_string()))?;

        info!(
            scope = %scope,
            duplicate_sets,
            rows_deleted,
            "Suppressed duplicate manual labels"
        );

        let recompute = self.recompute_validity(scope).await?;

        Ok(SuppressionOutcome {
            scope,
            duplicate_sets,
            rows_deleted,
            recompute,
        })
    }

    async fn sweep(&self, scope: Scope) -> Result<(usize, u64), DbErr> {
        let rls = RlsConnection::new(&self.db, scope.project_id).await?;

        let metadata = load_metadata(rls.transaction(), scope.project_id).await?;
        let annotations = load_scope(rls.transaction(), scope, &metadata, Sources::Manual).await?;

        let sets = DuplicateSuppressor::find(&annotations, &metadata);
        let removed: Vec<AnnotationId> = sets.iter().flat_map(|s| s.remove.iter().copied()).collect();
        let rows_deleted = delete_ids(rls.transaction(), &removed, self.config.batch_size).await?;

        rls.commit().await?;
        Ok((sets.len(), rows_deleted))
    }
}

fn log_anomalies(
    scope: &Scope,
    annotations: &[Annotation],
    metadata: &TaskMetadata,
    report: &ValidityReport,
) {
    for annotation in annotations
        .iter()
        .filter(|a| metadata.resolve(a.label_id).is_none())
    {
        warn!(
            scope = %scope,
            annotation_id = %annotation.id,
            label_id = %annotation.label_id,
            "Annotation left unevaluated: no task metadata for its label"
        );
    }

    for key in report.multi_gold_star_keys() {
        warn!(
            scope = %scope,
            key = %key.key,
            gold_stars = key.gold_star_count(),
            "Key carries several gold-star annotations, all treated as valid"
        );
    }
}

/// Writes flag changes in batches of at most `batch_size` ids.
async fn write_flags<C: ConnectionTrait>(
    conn: &C,
    changes: &ValidityChanges,
    batch_size: usize,
) -> Result<u64, DbErr> {
    if changes.is_empty() {
        debug!("Validity flags already up to date");
        return Ok(0);
    }

    let mut rows = 0;
    for (flag, ids) in [(true, &changes.set_valid), (false, &changes.set_invalid)] {
        for chunk in ids.chunks(batch_size.max(1)) {
            let result = annotations::Entity::update_many()
                .col_expr(annotations::Column::IsValidManualLabel, Expr::value(flag))
                .filter(annotations::Column::Id.is_in(chunk.iter().map(|id| id.into_inner())))
                .exec(conn)
                .await?;
            rows += result.rows_affected;
        }
    }
    Ok(rows)
}

/// Deletes annotations by id. Missing rows are a no-op.
pub(crate) async fn delete_ids<C: ConnectionTrait>(
    conn: &C,
    ids: &[AnnotationId],
    batch_size: usize,
) -> Result<u64, DbErr> {
    let mut rows = 0;
    for chunk in ids.chunks(batch_size.max(1)) {
        let result = annotations::Entity::delete_many()
            .filter(annotations::Column::Id.is_in(chunk.iter().map(|id| id.into_inner())))
            .exec(conn)
            .await?;
        rows += result.rows_affected;
    }
    Ok(rows)
}
