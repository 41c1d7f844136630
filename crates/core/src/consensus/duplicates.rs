//! Duplicate classification labels from double submission.
//!
//! The store enforces uniqueness of `(record, task, annotator, label)` for
//! ordinary manual RETURN rows. This sweep cleans rows that predate the
//! constraint or arrived through paths that bypass it.

use std::collections::BTreeMap;

use labelvault_shared::types::{AnnotationId, LabelId, RecordId, TaskId, UserId};

use super::types::{Annotation, AnnotationKind, TaskMetadata};

type DuplicateKey = (RecordId, TaskId, UserId, LabelId);

/// One set of identical submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    /// Row kept (highest id).
    pub keep: AnnotationId,
    /// Rows to delete.
    pub remove: Vec<AnnotationId>,
}

/// Finds redundant same-annotator, same-label classification rows.
pub struct DuplicateSuppressor;

impl DuplicateSuppressor {
    /// Returns every duplicate set in the snapshot.
    ///
    /// Only manual, non-gold-star RETURN rows with resolvable task metadata
    /// are considered.
    #[must_use]
    pub fn find(annotations: &[Annotation], metadata: &TaskMetadata) -> Vec<DuplicateSet> {
        let mut buckets: BTreeMap<DuplicateKey, Vec<AnnotationId>> = BTreeMap::new();

        for annotation in annotations {
            if !annotation.is_manual()
                || annotation.is_gold_star()
                || annotation.kind != AnnotationKind::Return
            {
                continue;
            }
            let Some(task_id) = metadata.task_of(annotation.label_id) else {
                continue;
            };
            buckets
                .entry((
                    annotation.record_id,
                    task_id,
                    annotation.annotator_id,
                    annotation.label_id,
                ))
                .or_default()
                .push(annotation.id);
        }

        buckets
            .into_values()
            .filter(|ids| ids.len() > 1)
            .filter_map(|mut ids| {
                ids.sort_unstable();
                let keep = ids.pop()?;
                Some(DuplicateSet { keep, remove: ids })
            })
            .collect()
    }

    /// Flattened ids to delete.
    #[must_use]
    pub fn ids_to_remove(annotations: &[Annotation], metadata: &TaskMetadata) -> Vec<AnnotationId> {
        Self::find(annotations, metadata)
            .into_iter()
            .flat_map(|set| set.remove)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::fixtures::Fixture;

    #[test]
    fn test_double_submission_keeps_highest_id() {
        let mut fx = Fixture::classification();
        let a = fx.user();
        let first = fx.classify(a, fx.label_a);
        let second = fx.classify(a, fx.label_a);

        let sets = DuplicateSuppressor::find(&fx.annotations, &fx.metadata);

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].keep, first.max(second));
        assert_eq!(sets[0].remove, vec![first.min(second)]);
    }

    #[test]
    fn test_different_labels_are_not_duplicates() {
        let mut fx = Fixture::classification();
        let a = fx.user();
        fx.classify(a, fx.label_a);
        fx.classify(a, fx.label_b);

        assert!(DuplicateSuppressor::find(&fx.annotations, &fx.metadata).is_empty());
    }

    #[test]
    fn test_different_annotators_are_not_duplicates() {
        let mut fx = Fixture::classification();
        let (a, b) = (fx.user(), fx.user());
        fx.classify(a, fx.label_a);
        fx.classify(b, fx.label_a);

        assert!(DuplicateSuppressor::find(&fx.annotations, &fx.metadata).is_empty());
    }

    #[test]
    fn test_gold_stars_are_never_suppressed() {
        let mut fx = Fixture::classification();
        let reviewer = fx.user();
        fx.gold_star(reviewer, fx.label_a);
        fx.gold_star(reviewer, fx.label_a);

        assert!(DuplicateSuppressor::find(&fx.annotations, &fx.metadata).is_empty());
    }

    #[test]
    fn test_extraction_rows_are_not_suppressed() {
        let mut fx = Fixture::extraction();
        let a = fx.user();
        fx.extract(a, fx.label_a, &[1]);
        fx.extract(a, fx.label_a, &[5]);

        assert!(DuplicateSuppressor::find(&fx.annotations, &fx.metadata).is_empty());
    }

    #[test]
    fn test_triple_submission_removes_two() {
        let mut fx = Fixture::classification();
        let a = fx.user();
        let ids = [
            fx.classify(a, fx.label_a),
            fx.classify(a, fx.label_a),
            fx.classify(a, fx.label_a),
        ];

        let removed = DuplicateSuppressor::ids_to_remove(&fx.annotations, &fx.metadata);

        let keep = *ids.iter().max().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!removed.contains(&keep));
    }
}
