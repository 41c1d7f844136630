//! Property-based tests for validity computation and the duplicate sweep.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use labelvault_shared::types::{AnnotationId, UserId};

use crate::consensus::duplicates::DuplicateSuppressor;
use crate::consensus::fixtures::Fixture;
use crate::consensus::types::ConsensusKey;
use crate::consensus::uncertainty::Grouping;
use crate::consensus::validity::ValidityWriter;

/// One submitted judgment: (record slot, annotator slot, label slot, gold star).
type Submission = (usize, usize, usize, bool);

fn arb_submissions() -> impl Strategy<Value = Vec<Submission>> {
    prop::collection::vec((0usize..3, 0usize..4, 0usize..2, prop::bool::weighted(0.15)), 0..24)
}

/// Builds a classification fixture from slots.
fn build(submissions: &[Submission]) -> Fixture {
    let mut fx = Fixture::classification();
    let records: Vec<_> = (0..3).map(|_| fx.next_record()).collect();
    let annotators: Vec<UserId> = (0..4).map(|_| fx.user()).collect();
    let labels = [fx.label_a, fx.label_b];

    for &(record, annotator, label, gold) in submissions {
        fx.record_id = records[record];
        if gold {
            fx.gold_star(annotators[annotator], labels[label]);
        } else {
            fx.classify(annotators[annotator], labels[label]);
        }
    }
    fx
}

fn members_by_key(fx: &Fixture) -> BTreeMap<ConsensusKey, Vec<AnnotationId>> {
    let grouping = Grouping::manual(&fx.annotations, &fx.metadata);
    grouping
        .groups
        .into_iter()
        .map(|(key, group)| (key, group.annotations.iter().map(|a| a.id).collect()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // =========================================================================
    // Idempotence: recomputing with no intervening writes changes nothing
    // =========================================================================

    #[test]
    fn prop_recompute_is_idempotent(submissions in arb_submissions()) {
        let mut fx = build(&submissions);

        let first = ValidityWriter::evaluate(&fx.annotations, &fx.metadata);
        ValidityWriter::apply(&mut fx.annotations, &first);
        let second = ValidityWriter::evaluate(&fx.annotations, &fx.metadata);

        prop_assert_eq!(&first.flags, &second.flags);
        prop_assert!(ValidityWriter::changes(&fx.annotations, &second).is_empty());
    }

    // =========================================================================
    // Every manual annotation with metadata receives a flag
    // =========================================================================

    #[test]
    fn prop_every_manual_annotation_is_flagged(submissions in arb_submissions()) {
        let fx = build(&submissions);
        let report = ValidityWriter::evaluate(&fx.annotations, &fx.metadata);

        prop_assert_eq!(report.flags.len(), fx.annotations.len());
    }

    // =========================================================================
    // Single opinion, gold-star precedence, agreement and disagreement
    // =========================================================================

    #[test]
    fn prop_key_level_invariants(submissions in arb_submissions()) {
        let fx = build(&submissions);
        let report = ValidityWriter::evaluate(&fx.annotations, &fx.metadata);

        for (_, members) in members_by_key(&fx) {
            let rows: Vec<_> = members.iter().map(|id| fx.get(*id)).collect();
            let annotators: BTreeSet<_> = rows.iter().map(|a| a.annotator_id).collect();
            let labels: BTreeSet<_> = rows.iter().map(|a| a.label_id).collect();
            let has_gold = rows.iter().any(|a| a.is_gold_star());
            let valid: Vec<_> = rows
                .iter()
                .filter(|a| report.is_valid(a.id) == Some(true))
                .collect();

            if annotators.len() == 1 {
                prop_assert_eq!(valid.len(), rows.len());
            } else if has_gold {
                prop_assert!(valid.iter().all(|a| a.is_gold_star()));
                prop_assert_eq!(valid.len(), rows.iter().filter(|a| a.is_gold_star()).count());
            } else if labels.len() == 1 {
                prop_assert_eq!(valid.len(), 1);
                prop_assert!(labels.contains(&valid[0].label_id));
            } else {
                prop_assert!(valid.is_empty());
            }
        }
    }

    // =========================================================================
    // Duplicate sweep leaves one row per (record, task, annotator, label)
    // =========================================================================

    #[test]
    fn prop_duplicate_sweep_keeps_max_id(submissions in arb_submissions()) {
        let mut fx = build(&submissions);
        let removed: BTreeSet<_> =
            DuplicateSuppressor::ids_to_remove(&fx.annotations, &fx.metadata)
                .into_iter()
                .collect();

        let mut expected_keep: BTreeMap<_, AnnotationId> = BTreeMap::new();
        for a in fx.annotations.iter().filter(|a| !a.is_gold_star()) {
            let entry = expected_keep
                .entry((a.record_id, a.annotator_id, a.label_id))
                .or_insert(a.id);
            *entry = (*entry).max(a.id);
        }

        for keep in expected_keep.values() {
            prop_assert!(!removed.contains(keep));
        }

        fx.annotations.retain(|a| !removed.contains(&a.id));
        prop_assert!(DuplicateSuppressor::find(&fx.annotations, &fx.metadata).is_empty());
    }
}
