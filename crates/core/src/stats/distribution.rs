//! Label distribution: valid manual vs weak-supervision counts per label.

use std::collections::HashMap;

use serde::Serialize;

use labelvault_shared::types::LabelId;

use crate::consensus::{Annotation, LabelSource};

/// Counts for one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    /// The label.
    pub label_id: LabelId,
    /// Valid manual annotations carrying the label.
    pub manual: u64,
    /// Weak-supervision annotations carrying the label.
    pub weak_supervision: u64,
}

/// Distribution of labels over one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelDistribution {
    /// One entry per task label, in the order the labels were given.
    pub labels: Vec<LabelCount>,
}

impl LabelDistribution {
    /// Counts annotations of a task.
    ///
    /// `labels` lists the task's labels; annotations with other labels are
    /// ignored. Manual annotations only count when flagged valid.
    #[must_use]
    pub fn compute(labels: &[LabelId], annotations: &[Annotation]) -> Self {
        let mut counts: HashMap<LabelId, LabelCount> = labels
            .iter()
            .map(|&label_id| {
                (
                    label_id,
                    LabelCount {
                        label_id,
                        manual: 0,
                        weak_supervision: 0,
                    },
                )
            })
            .collect();

        for annotation in annotations {
            let Some(count) = counts.get_mut(&annotation.label_id) else {
                continue;
            };
            match annotation.source {
                LabelSource::Manual if annotation.is_valid_manual_label == Some(true) => {
                    count.manual += 1;
                }
                LabelSource::WeakSupervision => count.weak_supervision += 1,
                _ => {}
            }
        }

        Self {
            labels: labels.iter().filter_map(|id| counts.remove(id)).collect(),
        }
    }

    /// Total valid manual annotations.
    #[must_use]
    pub fn manual_total(&self) -> u64 {
        self.labels.iter().map(|c| c.manual).sum()
    }
}
