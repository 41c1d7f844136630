//! Test fixtures for building annotation sets.

use chrono::{DateTime, Duration, TimeZone, Utc};

use labelvault_shared::types::{AnnotationId, LabelId, ProjectId, RecordId, TaskId, UserId};

use super::types::{
    Annotation, AnnotationKind, ConsensusKey, LabelSource, TaskMetadata, TaskType, TokenTag,
};

/// One project with one task of two labels, and a clock that ticks per annotation.
pub(crate) struct Fixture {
    pub project_id: ProjectId,
    pub record_id: RecordId,
    pub task_id: TaskId,
    pub label_a: LabelId,
    pub label_b: LabelId,
    pub metadata: TaskMetadata,
    pub annotations: Vec<Annotation>,
    clock: DateTime<Utc>,
}

impl Fixture {
    fn with_type(task_type: TaskType) -> Self {
        let task_id = TaskId::new();
        let label_a = LabelId::new();
        let label_b = LabelId::new();
        let metadata = TaskMetadata::new()
            .with_task(task_id, task_type)
            .with_label(label_a, task_id)
            .with_label(label_b, task_id);

        Self {
            project_id: ProjectId::new(),
            record_id: RecordId::new(),
            task_id,
            label_a,
            label_b,
            metadata,
            annotations: Vec::new(),
            clock: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    pub fn classification() -> Self {
        Self::with_type(TaskType::Classification)
    }

    pub fn extraction() -> Self {
        Self::with_type(TaskType::Extraction)
    }

    pub fn user(&self) -> UserId {
        UserId::new()
    }

    pub fn key(&self) -> ConsensusKey {
        ConsensusKey::new(self.record_id, self.task_id)
    }

    /// Switches subsequent annotations to a fresh record.
    pub fn next_record(&mut self) -> RecordId {
        self.record_id = RecordId::new();
        self.record_id
    }

    pub fn get(&self, id: AnnotationId) -> &Annotation {
        self.annotations
            .iter()
            .find(|a| a.id == id)
            .expect("annotation in fixture")
    }

    fn push(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id;
        self.annotations.push(annotation);
        id
    }

    fn base(
        &mut self,
        annotator_id: UserId,
        label_id: LabelId,
        kind: AnnotationKind,
        source: LabelSource,
    ) -> Annotation {
        self.clock += Duration::seconds(1);
        Annotation {
            id: AnnotationId::new(),
            project_id: self.project_id,
            record_id: self.record_id,
            label_id,
            annotator_id,
            kind,
            source,
            is_gold_star: None,
            is_valid_manual_label: None,
            confidence: None,
            created_at: self.clock,
            tokens: Vec::new(),
        }
    }

    pub fn classify(&mut self, annotator_id: UserId, label_id: LabelId) -> AnnotationId {
        let annotation = self.base(
            annotator_id,
            label_id,
            AnnotationKind::Return,
            LabelSource::Manual,
        );
        self.push(annotation)
    }

    pub fn gold_star(&mut self, reviewer_id: UserId, label_id: LabelId) -> AnnotationId {
        let mut annotation = self.base(
            reviewer_id,
            label_id,
            AnnotationKind::Return,
            LabelSource::Manual,
        );
        annotation.is_gold_star = Some(true);
        self.push(annotation)
    }

    pub fn weak_supervision(&mut self, label_id: LabelId) -> AnnotationId {
        let annotation = self.base(
            UserId::new(),
            label_id,
            AnnotationKind::Return,
            LabelSource::WeakSupervision,
        );
        self.push(annotation)
    }

    /// Adds a YIELD annotation tagging one contiguous span.
    pub fn extract(
        &mut self,
        annotator_id: UserId,
        label_id: LabelId,
        token_indices: &[i32],
    ) -> AnnotationId {
        let mut annotation = self.base(
            annotator_id,
            label_id,
            AnnotationKind::Yield,
            LabelSource::Manual,
        );
        annotation.tokens = token_indices
            .iter()
            .enumerate()
            .map(|(i, &index)| TokenTag::new(index, i == 0))
            .collect();
        self.push(annotation)
    }
}
