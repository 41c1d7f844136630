//! Grouping of manual annotations into consensus keys and detection of
//! contested ("uncertain") keys.

use std::collections::{BTreeMap, BTreeSet};

use labelvault_shared::types::UserId;

use super::types::{Annotation, ConsensusKey, TaskMetadata, TaskType};

/// Manual annotations sharing one consensus key.
#[derive(Debug, Clone)]
pub struct KeyGroup<'a> {
    /// The `(record, task)` pair.
    pub key: ConsensusKey,
    /// Type of the task, selecting the agreement resolver.
    pub task_type: TaskType,
    /// Annotations under the key, from every annotator.
    pub annotations: Vec<&'a Annotation>,
}

impl<'a> KeyGroup<'a> {
    /// Distinct annotators contributing to the key.
    #[must_use]
    pub fn annotators(&self) -> BTreeSet<UserId> {
        self.annotations.iter().map(|a| a.annotator_id).collect()
    }

    /// Annotations partitioned by annotator.
    #[must_use]
    pub fn by_annotator(&self) -> BTreeMap<UserId, Vec<&'a Annotation>> {
        let mut partitions: BTreeMap<UserId, Vec<&'a Annotation>> = BTreeMap::new();
        for annotation in &self.annotations {
            partitions
                .entry(annotation.annotator_id)
                .or_default()
                .push(annotation);
        }
        partitions
    }

    /// Whether any annotation under the key is a gold star.
    #[must_use]
    pub fn has_gold_star(&self) -> bool {
        self.annotations.iter().any(|a| a.is_gold_star())
    }
}

/// Manual annotations of a scope, grouped by consensus key.
#[derive(Debug, Clone, Default)]
pub struct Grouping<'a> {
    /// Groups keyed by `(record, task)`.
    pub groups: BTreeMap<ConsensusKey, KeyGroup<'a>>,
    /// Manual annotations whose label has no task or task type.
    pub excluded: Vec<&'a Annotation>,
}

impl<'a> Grouping<'a> {
    /// Groups the manual annotations of `annotations`.
    ///
    /// Non-manual annotations are ignored. Manual annotations whose label
    /// cannot be resolved to a typed task land in `excluded`.
    #[must_use]
    pub fn manual(annotations: &'a [Annotation], metadata: &TaskMetadata) -> Self {
        let mut grouping = Grouping::default();

        for annotation in annotations.iter().filter(|a| a.is_manual()) {
            let Some((task_id, task_type)) = metadata.resolve(annotation.label_id) else {
                grouping.excluded.push(annotation);
                continue;
            };

            let key = ConsensusKey::new(annotation.record_id, task_id);
            grouping
                .groups
                .entry(key)
                .or_insert_with(|| KeyGroup {
                    key,
                    task_type,
                    annotations: Vec::new(),
                })
                .annotations
                .push(annotation);
        }

        grouping
    }
}

/// Certainty classification of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCertainty {
    /// The classified key.
    pub key: ConsensusKey,
    /// Number of distinct annotators.
    pub annotator_count: usize,
    /// Whether any annotation under the key is a gold star.
    pub has_gold_star: bool,
}

impl KeyCertainty {
    /// A key is uncertain iff more than one annotator contributed.
    #[must_use]
    pub const fn is_uncertain(&self) -> bool {
        self.annotator_count > 1
    }
}

/// Partitions keys into single-opinion and contested ones.
pub struct UncertaintyClassifier;

impl UncertaintyClassifier {
    /// Classifies one key.
    #[must_use]
    pub fn classify(group: &KeyGroup<'_>) -> KeyCertainty {
        KeyCertainty {
            key: group.key,
            annotator_count: group.annotators().len(),
            has_gold_star: group.has_gold_star(),
        }
    }

    /// Returns every uncertain key with its `has_gold_star` flag.
    ///
    /// Keys absent from the result are single-opinion.
    #[must_use]
    pub fn uncertain_keys(grouping: &Grouping<'_>) -> BTreeMap<ConsensusKey, bool> {
        grouping
            .groups
            .values()
            .map(Self::classify)
            .filter(KeyCertainty::is_uncertain)
            .map(|c| (c.key, c.has_gold_star))
            .collect()
    }
}
