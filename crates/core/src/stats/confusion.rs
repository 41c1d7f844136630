//! Confusion matrix between valid manual labels and weak supervision.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use labelvault_shared::types::{LabelId, RecordId};

use crate::consensus::{Annotation, AnnotationKind, LabelSource};

/// One cell of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionCell {
    /// Label from the valid manual annotation (ground truth).
    pub manual_label_id: LabelId,
    /// Label predicted by weak supervision.
    pub weak_supervision_label_id: LabelId,
    /// Number of records with this pair.
    pub count: u64,
}

/// Manual vs weak-supervision confusion over a classification task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    /// Non-empty cells, ordered by `(manual, weak supervision)` label.
    pub cells: Vec<ConfusionCell>,
    /// Records having both a valid manual label and a weak-supervision label.
    pub records_compared: u64,
}

impl ConfusionMatrix {
    /// Builds the matrix from RETURN annotations of one classification task.
    ///
    /// Records lacking either side are skipped. A record carrying several valid
    /// manual labels (multiple gold stars) contributes one pair per combination.
    #[must_use]
    pub fn compute(annotations: &[Annotation]) -> Self {
        let mut manual: HashMap<RecordId, Vec<LabelId>> = HashMap::new();
        let mut weak: HashMap<RecordId, Vec<LabelId>> = HashMap::new();

        for annotation in annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::Return)
        {
            match annotation.source {
                LabelSource::Manual if annotation.is_valid_manual_label == Some(true) => {
                    manual
                        .entry(annotation.record_id)
                        .or_default()
                        .push(annotation.label_id);
                }
                LabelSource::WeakSupervision => {
                    weak.entry(annotation.record_id)
                        .or_default()
                        .push(annotation.label_id);
                }
                _ => {}
            }
        }

        let mut cells: BTreeMap<(LabelId, LabelId), u64> = BTreeMap::new();
        let mut records_compared = 0;

        for (record_id, manual_labels) in &manual {
            let Some(weak_labels) = weak.get(record_id) else {
                continue;
            };
            records_compared += 1;
            for &m in manual_labels {
                for &w in weak_labels {
                    *cells.entry((m, w)).or_default() += 1;
                }
            }
        }

        Self {
            cells: cells
                .into_iter()
                .map(|((manual_label_id, weak_supervision_label_id), count)| ConfusionCell {
                    manual_label_id,
                    weak_supervision_label_id,
                    count,
                })
                .collect(),
            records_compared,
        }
    }

    /// Share of compared pairs where both sides agree, `None` if nothing was compared.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> Option<f64> {
        let total: u64 = self.cells.iter().map(|c| c.count).sum();
        if total == 0 {
            return None;
        }
        let hits: u64 = self
            .cells
            .iter()
            .filter(|c| c.manual_label_id == c.weak_supervision_label_id)
            .map(|c| c.count)
            .sum();
        Some(hits as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use labelvault_shared::types::{AnnotationId, ProjectId, UserId};

    fn annotation(
        record_id: RecordId,
        label_id: LabelId,
        source: LabelSource,
        valid: Option<bool>,
    ) -> Annotation {
        Annotation {
            id: AnnotationId::new(),
            project_id: ProjectId::new(),
            record_id,
            label_id,
            annotator_id: UserId::new(),
            kind: AnnotationKind::Return,
            source,
            is_gold_star: None,
            is_valid_manual_label: valid,
            confidence: None,
            created_at: Utc::now(),
            tokens: vec![],
        }
    }

    #[test]
    fn test_matrix_counts_pairs_per_record() {
        let (pos, neg) = (LabelId::new(), LabelId::new());
        let (r1, r2, r3) = (RecordId::new(), RecordId::new(), RecordId::new());
        let annotations = vec![
            annotation(r1, pos, LabelSource::Manual, Some(true)),
            annotation(r1, pos, LabelSource::WeakSupervision, None),
            annotation(r2, pos, LabelSource::Manual, Some(true)),
            annotation(r2, neg, LabelSource::WeakSupervision, None),
            // no weak supervision on r3
            annotation(r3, neg, LabelSource::Manual, Some(true)),
        ];

        let matrix = ConfusionMatrix::compute(&annotations);

        assert_eq!(matrix.records_compared, 2);
        assert_eq!(matrix.cells.len(), 2);
        assert_eq!(matrix.accuracy(), Some(0.5));
    }

    #[test]
    fn test_invalid_manual_labels_are_skipped() {
        let pos = LabelId::new();
        let record = RecordId::new();
        let annotations = vec![
            annotation(record, pos, LabelSource::Manual, Some(false)),
            annotation(record, pos, LabelSource::WeakSupervision, None),
        ];

        let matrix = ConfusionMatrix::compute(&annotations);

        assert_eq!(matrix.records_compared, 0);
        assert_eq!(matrix.accuracy(), None);
    }
}
