//! Gold-star promotion planning.
//!
//! Promotion never modifies the selected annotations. It produces new rows owned
//! by the reviewer, carrying the same label (and token tags for YIELD rows). The
//! store inserts the planned rows in a single transaction and then recomputes
//! validity for the record.
//!
//! Only uncertain keys can be promoted: a single-opinion key is already valid.

use chrono::{DateTime, Utc};

use labelvault_shared::types::{AnnotationId, UserId};

use super::error::ConsensusError;
use super::types::{Annotation, ConsensusKey, LabelSource, TaskMetadata};
use super::uncertainty::{Grouping, UncertaintyClassifier};

/// A planned gold-star clone.
#[derive(Debug, Clone)]
pub struct GoldStarClone {
    /// Annotation the clone was made from.
    pub source_id: AnnotationId,
    /// The new annotation, tokens included.
    pub annotation: Annotation,
}

/// Input for a promotion.
#[derive(Debug, Clone)]
pub struct PromotionInput<'a> {
    /// The key the reviewer resolves.
    pub key: ConsensusKey,
    /// Ids the reviewer selected.
    pub requested: &'a [AnnotationId],
    /// Annotations found in the store for `requested`.
    pub selection: &'a [Annotation],
    /// Manual annotations currently stored under `key`.
    pub key_annotations: &'a [Annotation],
    /// The promoting reviewer.
    pub reviewer_id: UserId,
    /// Promotion time; becomes `created_at` of every clone.
    pub promoted_at: DateTime<Utc>,
}

/// Stateless service cloning selected annotations into gold stars.
pub struct GoldStarPromoter;

impl GoldStarPromoter {
    /// Validates a selection and plans the clones.
    ///
    /// # Errors
    ///
    /// - `EmptySelection` if nothing was requested
    /// - `AnnotationNotFound` if a requested id is missing from `selection`
    /// - `NotManual` if a selected annotation is not a manual label
    /// - `MissingTaskMetadata` if a label cannot be resolved to a task
    /// - `MixedKeys` if a selected annotation belongs to another key
    /// - `KeyNotContested` if fewer than two annotators labeled the key
    pub fn plan(
        input: &PromotionInput<'_>,
        metadata: &TaskMetadata,
    ) -> Result<Vec<GoldStarClone>, ConsensusError> {
        if input.requested.is_empty() {
            return Err(ConsensusError::EmptySelection);
        }

        let mut clones = Vec::with_capacity(input.requested.len());

        for id in input.requested {
            let source = input
                .selection
                .iter()
                .find(|a| a.id == *id)
                .ok_or(ConsensusError::AnnotationNotFound(*id))?;

            if source.source != LabelSource::Manual {
                return Err(ConsensusError::NotManual(source.id));
            }

            let task_id = metadata
                .task_of(source.label_id)
                .ok_or(ConsensusError::MissingTaskMetadata(source.label_id))?;
            let found = ConsensusKey::new(source.record_id, task_id);
            if found != input.key {
                return Err(ConsensusError::MixedKeys {
                    annotation_id: source.id,
                    expected: input.key,
                    found,
                });
            }

            clones.push(GoldStarClone {
                source_id: source.id,
                annotation: Annotation {
                    id: AnnotationId::new(),
                    annotator_id: input.reviewer_id,
                    is_gold_star: Some(true),
                    is_valid_manual_label: None,
                    created_at: input.promoted_at,
                    ..source.clone()
                },
            });
        }

        let contested = Grouping::manual(input.key_annotations, metadata)
            .groups
            .get(&input.key)
            .is_some_and(|group| UncertaintyClassifier::classify(group).is_uncertain());
        if !contested {
            return Err(ConsensusError::KeyNotContested(input.key));
        }

        Ok(clones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::fixtures::Fixture;
    use crate::consensus::types::AnnotationKind;
    use crate::consensus::validity::ValidityWriter;

    fn promote(
        fx: &Fixture,
        requested: &[AnnotationId],
        reviewer_id: UserId,
    ) -> Result<Vec<GoldStarClone>, ConsensusError> {
        let input = PromotionInput {
            key: fx.key(),
            requested,
            selection: &fx.annotations,
            key_annotations: &fx.annotations,
            reviewer_id,
            promoted_at: Utc::now(),
        };
        GoldStarPromoter::plan(&input, &fx.metadata)
    }

    #[test]
    fn test_classification_clone_fidelity() {
        let mut fx = Fixture::classification();
        let (a, b, reviewer) = (fx.user(), fx.user(), fx.user());
        let chosen = fx.classify(a, fx.label_a);
        fx.classify(b, fx.label_b);

        let clones = promote(&fx, &[chosen], reviewer).unwrap();

        assert_eq!(clones.len(), 1);
        let clone = &clones[0].annotation;
        assert_eq!(clones[0].source_id, chosen);
        assert_ne!(clone.id, chosen);
        assert_eq!(clone.label_id, fx.label_a);
        assert_eq!(clone.record_id, fx.record_id);
        assert_eq!(clone.project_id, fx.project_id);
        assert_eq!(clone.annotator_id, reviewer);
        assert_eq!(clone.is_gold_star, Some(true));
        assert_eq!(clone.is_valid_manual_label, None);
    }

    #[test]
    fn test_extraction_clone_keeps_tokens() {
        let mut fx = Fixture::extraction();
        let (a, b, reviewer) = (fx.user(), fx.user(), fx.user());
        let chosen = fx.extract(a, fx.label_a, &[3, 4, 5]);
        fx.extract(b, fx.label_a, &[3, 4]);

        let clones = promote(&fx, &[chosen], reviewer).unwrap();
        let clone = &clones[0].annotation;

        assert_eq!(clone.kind, AnnotationKind::Yield);
        assert_eq!(clone.tokens, fx.get(chosen).tokens);
    }

    #[test]
    fn test_originals_become_invalid_after_promotion() {
        let mut fx = Fixture::classification();
        let (a, b, reviewer) = (fx.user(), fx.user(), fx.user());
        let chosen = fx.classify(a, fx.label_a);
        let other = fx.classify(b, fx.label_b);

        let clones = promote(&fx, &[chosen], reviewer).unwrap();
        let gold_id = clones[0].annotation.id;
        fx.annotations
            .extend(clones.into_iter().map(|c| c.annotation));

        let report = ValidityWriter::evaluate(&fx.annotations, &fx.metadata);
        assert_eq!(report.is_valid(gold_id), Some(true));
        assert_eq!(report.is_valid(chosen), Some(false));
        assert_eq!(report.is_valid(other), Some(false));
    }

    #[test]
    fn test_empty_selection_rejected() {
        let fx = Fixture::classification();
        let result = promote(&fx, &[], fx.user());
        assert!(matches!(result, Err(ConsensusError::EmptySelection)));
    }

    #[test]
    fn test_missing_annotation_fails_whole_batch() {
        let mut fx = Fixture::classification();
        let a = fx.user();
        let present = fx.classify(a, fx.label_a);
        let gone = AnnotationId::new();

        let result = promote(&fx, &[present, gone], fx.user());

        assert!(matches!(result, Err(ConsensusError::AnnotationNotFound(id)) if id == gone));
    }

    #[test]
    fn test_selection_from_other_record_rejected() {
        let mut fx = Fixture::classification();
        let a = fx.user();
        let here = fx.classify(a, fx.label_a);
        let target = fx.key();
        fx.next_record();
        let elsewhere = fx.classify(a, fx.label_a);

        let input = PromotionInput {
            key: target,
            requested: &[here, elsewhere],
            selection: &fx.annotations,
            key_annotations: &fx.annotations,
            reviewer_id: fx.user(),
            promoted_at: Utc::now(),
        };
        let result = GoldStarPromoter::plan(&input, &fx.metadata);

        assert!(matches!(
            result,
            Err(ConsensusError::MixedKeys { annotation_id, .. }) if annotation_id == elsewhere
        ));
    }

    #[test]
    fn test_weak_supervision_cannot_be_promoted() {
        let mut fx = Fixture::classification();
        let ws = fx.weak_supervision(fx.label_a);

        let result = promote(&fx, &[ws], fx.user());

        assert!(matches!(result, Err(ConsensusError::NotManual(id)) if id == ws));
    }

    #[test]
    fn test_single_opinion_key_cannot_be_promoted() {
        let mut fx = Fixture::classification();
        let a = fx.user();
        let only = fx.classify(a, fx.label_a);

        let result = promote(&fx, &[only], fx.user());

        assert!(matches!(result, Err(ConsensusError::KeyNotContested(key)) if key == fx.key()));
    }

    #[test]
    fn test_contest_on_another_record_does_not_count() {
        let mut fx = Fixture::classification();
        let (a, b) = (fx.user(), fx.user());
        let only = fx.classify(a, fx.label_a);
        let target = fx.key();
        fx.next_record();
        fx.classify(a, fx.label_a);
        fx.classify(b, fx.label_b);

        let input = PromotionInput {
            key: target,
            requested: &[only],
            selection: &fx.annotations,
            key_annotations: &fx.annotations,
            reviewer_id: fx.user(),
            promoted_at: Utc::now(),
        };

        assert!(matches!(
            GoldStarPromoter::plan(&input, &fx.metadata),
            Err(ConsensusError::KeyNotContested(key)) if key == target
        ));
    }
}
