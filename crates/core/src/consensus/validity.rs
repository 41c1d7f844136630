//! Validity computation: combines uncertainty, gold stars and agreement into
//! one boolean per manual annotation.
//!
//! The result is a pure function of the annotation snapshot handed in. Running
//! it twice on the same snapshot yields the same flags.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;

use labelvault_shared::types::AnnotationId;

use super::agreement::AgreementResolver;
use super::gold_star::GoldStarDetector;
use super::types::{Annotation, ConsensusKey, TaskMetadata};
use super::uncertainty::{Grouping, KeyGroup, UncertaintyClassifier};

/// How a key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// One annotator only; everything under the key is valid.
    SingleOpinion,
    /// Reviewer override; exactly the gold-star rows are valid.
    GoldStar,
    /// Annotators agreed; one canonical source is valid.
    Agreement,
    /// Annotators disagree; nothing is valid until a reviewer steps in.
    Unresolved,
}

/// Outcome for one consensus key.
#[derive(Debug, Clone)]
pub struct KeyResolution {
    /// The key.
    pub key: ConsensusKey,
    /// How it was resolved.
    pub resolution: Resolution,
    /// Annotations under the key, in input order.
    pub members: Vec<AnnotationId>,
    /// Members that are valid.
    pub valid: BTreeSet<AnnotationId>,
}

impl KeyResolution {
    /// Resolves one key.
    #[must_use]
    pub fn evaluate(group: &KeyGroup<'_>) -> Self {
        let certainty = UncertaintyClassifier::classify(group);
        let members: Vec<AnnotationId> = group.annotations.iter().map(|a| a.id).collect();

        let (resolution, valid) = if !certainty.is_uncertain() {
            (Resolution::SingleOpinion, members.iter().copied().collect())
        } else if let Some(gold) = GoldStarDetector::valid_set(group) {
            (Resolution::GoldStar, gold)
        } else if let Some(agreed) = AgreementResolver::resolve(group) {
            (Resolution::Agreement, agreed)
        } else {
            (Resolution::Unresolved, BTreeSet::new())
        };

        Self {
            key: group.key,
            resolution,
            members,
            valid,
        }
    }

    /// Number of valid gold-star rows; more than one means several reviewer overrides.
    #[must_use]
    pub fn gold_star_count(&self) -> usize {
        match self.resolution {
            Resolution::GoldStar => self.valid.len(),
            _ => 0,
        }
    }
}

/// Counters describing one validity computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValiditySummary {
    /// Keys evaluated.
    pub keys_evaluated: usize,
    /// Keys with a single annotator.
    pub single_opinion_keys: usize,
    /// Keys resolved by a gold star.
    pub gold_star_keys: usize,
    /// Gold-star keys carrying more than one gold-star row.
    pub multi_gold_star_keys: usize,
    /// Keys resolved by unanimous agreement.
    pub agreement_keys: usize,
    /// Contested keys left unresolved.
    pub unresolved_keys: usize,
    /// Manual annotations skipped for missing task metadata.
    pub excluded_annotations: usize,
}

/// Full outcome of a validity computation.
#[derive(Debug, Clone, Default)]
pub struct ValidityReport {
    /// Per-key outcomes, ordered by key.
    pub keys: Vec<KeyResolution>,
    /// Target flag for every evaluated manual annotation.
    pub flags: BTreeMap<AnnotationId, bool>,
    /// Manual annotations left untouched for missing task metadata.
    pub excluded: Vec<AnnotationId>,
    /// Counters.
    pub summary: ValiditySummary,
}

impl ValidityReport {
    /// Target flag of an annotation, `None` if it was not evaluated.
    #[must_use]
    pub fn is_valid(&self, id: AnnotationId) -> Option<bool> {
        self.flags.get(&id).copied()
    }

    /// Keys resolved by more than one gold-star row.
    pub fn multi_gold_star_keys(&self) -> impl Iterator<Item = &KeyResolution> {
        self.keys.iter().filter(|k| k.gold_star_count() > 1)
    }
}

/// Flag updates needed to bring persisted state in line with a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidityChanges {
    /// Annotations to flag valid.
    pub set_valid: Vec<AnnotationId>,
    /// Annotations to flag invalid.
    pub set_invalid: Vec<AnnotationId>,
}

impl ValidityChanges {
    /// Whether nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set_valid.is_empty() && self.set_invalid.is_empty()
    }

    /// Number of rows to update.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set_valid.len() + self.set_invalid.len()
    }
}

/// Computes `is_valid_manual_label` for a snapshot of annotations.
pub struct ValidityWriter;

impl ValidityWriter {
    /// Evaluates every manual annotation of the snapshot.
    ///
    /// Non-manual annotations are ignored. Manual annotations without task
    /// metadata are listed in `excluded` and receive no flag.
    #[must_use]
    pub fn evaluate(annotations: &[Annotation], metadata: &TaskMetadata) -> ValidityReport {
        let grouping = Grouping::manual(annotations, metadata);

        let groups: Vec<&KeyGroup<'_>> = grouping.groups.values().collect();
        let keys: Vec<KeyResolution> = groups
            .par_iter()
            .map(|group| KeyResolution::evaluate(group))
            .collect();

        let mut summary = ValiditySummary {
            keys_evaluated: keys.len(),
            excluded_annotations: grouping.excluded.len(),
            ..ValiditySummary::default()
        };
        let mut flags = BTreeMap::new();

        for key in &keys {
            match key.resolution {
                Resolution::SingleOpinion => summary.single_opinion_keys += 1,
                Resolution::GoldStar => {
                    summary.gold_star_keys += 1;
                    if key.gold_star_count() > 1 {
                        summary.multi_gold_star_keys += 1;
                    }
                }
                Resolution::Agreement => summary.agreement_keys += 1,
                Resolution::Unresolved => summary.unresolved_keys += 1,
            }
            for id in &key.members {
                flags.insert(*id, key.valid.contains(id));
            }
        }

        ValidityReport {
            keys,
            flags,
            excluded: grouping.excluded.iter().map(|a| a.id).collect(),
            summary,
        }
    }

    /// Diffs a report against the flags currently persisted on the snapshot.
    ///
    /// Unevaluated (`None`) flags always count as a change.
    #[must_use]
    pub fn changes(annotations: &[Annotation], report: &ValidityReport) -> ValidityChanges {
        let mut changes = ValidityChanges::default();

        for annotation in annotations {
            let Some(target) = report.is_valid(annotation.id) else {
                continue;
            };
            if annotation.is_valid_manual_label == Some(target) {
                continue;
            }
            if target {
                changes.set_valid.push(annotation.id);
            } else {
                changes.set_invalid.push(annotation.id);
            }
        }

        changes
    }

    /// Applies a report to the snapshot in memory.
    pub fn apply(annotations: &mut [Annotation], report: &ValidityReport) {
        for annotation in annotations.iter_mut() {
            if let Some(target) = report.is_valid(annotation.id) {
                annotation.is_valid_manual_label = Some(target);
            }
        }
    }
}
