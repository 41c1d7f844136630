//! Unanimous-agreement resolution for contested keys without a gold star.
//!
//! Two variants exist, selected by the task type:
//!
//! - classification: every annotator chose the same single label;
//! - extraction: every annotator produced the same ordered sequence of
//!   `(token_index, label_id)` pairs.
//!
//! An agreed key is represented by one canonical source. For classification that
//! is the most senior row (earliest `created_at`, then smallest id). For
//! extraction it is every row of the annotator owning the most senior row.

use std::collections::{BTreeMap, BTreeSet};

use labelvault_shared::types::{AnnotationId, LabelId, UserId};

use super::types::{Annotation, AnnotationKind, TaskType};
use super::uncertainty::KeyGroup;

/// One annotator's extraction opinion for a key.
pub type ExtractionOpinion = Vec<(i32, LabelId)>;

/// Builds the ordered extraction opinion from an annotator's rows.
///
/// Only YIELD rows contribute. Pairs are sorted by token index, then label.
#[must_use]
pub fn extraction_opinion(rows: &[&Annotation]) -> ExtractionOpinion {
    let mut opinion: ExtractionOpinion = rows
        .iter()
        .filter(|a| a.kind == AnnotationKind::Yield)
        .flat_map(|a| a.tokens.iter().map(move |t| (t.token_index, a.label_id)))
        .collect();
    opinion.sort_unstable();
    opinion
}

/// Decides whether independent annotators agreed.
pub struct AgreementResolver;

impl AgreementResolver {
    /// Resolves a contested key, returning the valid annotations on agreement.
    ///
    /// Returns `None` if annotators disagree.
    #[must_use]
    pub fn resolve(group: &KeyGroup<'_>) -> Option<BTreeSet<AnnotationId>> {
        match group.task_type {
            TaskType::Classification => {
                Self::classification(group).map(|id| BTreeSet::from([id]))
            }
            TaskType::Extraction => Self::extraction(group),
        }
    }

    /// Classification variant: returns the representative row if exactly one
    /// distinct label was chosen across all annotators.
    #[must_use]
    pub fn classification(group: &KeyGroup<'_>) -> Option<AnnotationId> {
        let labels: BTreeSet<LabelId> = group.annotations.iter().map(|a| a.label_id).collect();
        if labels.len() != 1 {
            return None;
        }

        group
            .annotations
            .iter()
            .min_by_key(|a| a.seniority())
            .map(|a| a.id)
    }

    /// Extraction variant: returns every row of the representative annotator if
    /// all annotators produced the identical opinion.
    #[must_use]
    pub fn extraction(group: &KeyGroup<'_>) -> Option<BTreeSet<AnnotationId>> {
        let partitions = group.by_annotator();

        let opinions: BTreeMap<UserId, ExtractionOpinion> = partitions
            .iter()
            .map(|(annotator, rows)| (*annotator, extraction_opinion(rows)))
            .collect();

        let mut distinct = opinions.values();
        let first = distinct.next()?;
        if distinct.any(|opinion| opinion != first) {
            return None;
        }

        let representative = group
            .annotations
            .iter()
            .min_by_key(|a| a.seniority())?
            .annotator_id;

        partitions
            .get(&representative)
            .map(|rows| rows.iter().map(|a| a.id).collect())
    }
}
