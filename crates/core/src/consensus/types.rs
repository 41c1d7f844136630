//! Consensus domain types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use labelvault_shared::types::{AnnotationId, LabelId, ProjectId, RecordId, TaskId, UserId};

/// Shape of a labeling task, selecting the agreement resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Whole-record classification (RETURN annotations).
    Classification,
    /// Token-span extraction (YIELD annotations owning token tags).
    Extraction,
}

/// Kind of judgment an annotation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Whole-record classification judgment.
    Return,
    /// Extraction judgment owning zero or more token tags.
    Yield,
}

/// Producer of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Human annotator. The only source taking part in consensus.
    Manual,
    /// Weak-supervision model output.
    WeakSupervision,
    /// Heuristic (information source) output.
    InformationSource,
    /// Model callback output.
    ModelCallback,
}

/// One tagged token position of a YIELD annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenTag {
    /// Position within the record's tokenization of the task's target attribute.
    pub token_index: i32,
    /// First token of a contiguous span (BIO "B").
    pub is_beginning_token: bool,
}

impl TokenTag {
    /// Creates a tag.
    #[must_use]
    pub const fn new(token_index: i32, is_beginning_token: bool) -> Self {
        Self {
            token_index,
            is_beginning_token,
        }
    }
}

/// An annotation as seen by the consensus engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation ID.
    pub id: AnnotationId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Annotated record.
    pub record_id: RecordId,
    /// Chosen label. The task is derived through it.
    pub label_id: LabelId,
    /// User who produced the annotation.
    pub annotator_id: UserId,
    /// RETURN or YIELD.
    pub kind: AnnotationKind,
    /// Producer of the annotation.
    pub source: LabelSource,
    /// Reviewer override marker; `None` when never set.
    pub is_gold_star: Option<bool>,
    /// Persisted engine output; `None` when not yet evaluated.
    pub is_valid_manual_label: Option<bool>,
    /// Confidence, unused for manual annotations.
    pub confidence: Option<Decimal>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Owned token tags (YIELD only), in any order.
    pub tokens: Vec<TokenTag>,
}

impl Annotation {
    /// Whether this is a human annotation taking part in consensus.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.source == LabelSource::Manual
    }

    /// Whether this is a reviewer-authored override.
    #[must_use]
    pub fn is_gold_star(&self) -> bool {
        self.is_gold_star == Some(true)
    }

    /// Ordering key used to pick representative rows: earliest first, then smallest id.
    #[must_use]
    pub fn seniority(&self) -> (DateTime<Utc>, AnnotationId) {
        (self.created_at, self.id)
    }
}

/// The `(record, task)` pair over which agreement is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsensusKey {
    /// Record.
    pub record_id: RecordId,
    /// Labeling task.
    pub task_id: TaskId,
}

impl ConsensusKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(record_id: RecordId, task_id: TaskId) -> Self {
        Self { record_id, task_id }
    }
}

impl std::fmt::Display for ConsensusKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record {} / task {}", self.record_id, self.task_id)
    }
}

/// Task and label metadata for a project.
///
/// Annotations only reference a label; task and task type are looked up here.
#[derive(Debug, Clone, Default)]
pub struct TaskMetadata {
    label_tasks: HashMap<LabelId, TaskId>,
    task_types: HashMap<TaskId, TaskType>,
}

impl TaskMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task and its type.
    pub fn add_task(&mut self, task_id: TaskId, task_type: TaskType) {
        self.task_types.insert(task_id, task_type);
    }

    /// Registers a label under a task.
    pub fn add_label(&mut self, label_id: LabelId, task_id: TaskId) {
        self.label_tasks.insert(label_id, task_id);
    }

    /// Builder-style variant of [`Self::add_task`].
    #[must_use]
    pub fn with_task(mut self, task_id: TaskId, task_type: TaskType) -> Self {
        self.add_task(task_id, task_type);
        self
    }

    /// Builder-style variant of [`Self::add_label`].
    #[must_use]
    pub fn with_label(mut self, label_id: LabelId, task_id: TaskId) -> Self {
        self.add_label(label_id, task_id);
        self
    }

    /// Task a label belongs to.
    #[must_use]
    pub fn task_of(&self, label_id: LabelId) -> Option<TaskId> {
        self.label_tasks.get(&label_id).copied()
    }

    /// Type of a task.
    #[must_use]
    pub fn task_type(&self, task_id: TaskId) -> Option<TaskType> {
        self.task_types.get(&task_id).copied()
    }

    /// Labels registered under a task, in no particular order.
    #[must_use]
    pub fn labels_of(&self, task_id: TaskId) -> Vec<LabelId> {
        self.label_tasks
            .iter()
            .filter(|(_, t)| **t == task_id)
            .map(|(label, _)| *label)
            .collect()
    }

    /// Resolves a label to its task and the task's type.
    ///
    /// Returns `None` if either piece of metadata is missing.
    #[must_use]
    pub fn resolve(&self, label_id: LabelId) -> Option<(TaskId, TaskType)> {
        let task_id = self.task_of(label_id)?;
        Some((task_id, self.task_type(task_id)?))
    }
}

/// Scope of a recompute or sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Project the scope lives in.
    pub project_id: ProjectId,
    /// Restrict to one task.
    pub task_id: Option<TaskId>,
    /// Restrict to one record.
    pub record_id: Option<RecordId>,
}

impl Scope {
    /// Whole project (full recompute).
    #[must_use]
    pub const fn project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            task_id: None,
            record_id: None,
        }
    }

    /// One task across all records.
    #[must_use]
    pub const fn task(project_id: ProjectId, task_id: TaskId) -> Self {
        Self {
            project_id,
            task_id: Some(task_id),
            record_id: None,
        }
    }

    /// One record across all tasks.
    #[must_use]
    pub const fn record(project_id: ProjectId, record_id: RecordId) -> Self {
        Self {
            project_id,
            task_id: None,
            record_id: Some(record_id),
        }
    }

    /// One consensus key.
    #[must_use]
    pub const fn key(project_id: ProjectId, key: ConsensusKey) -> Self {
        Self {
            project_id,
            task_id: Some(key.task_id),
            record_id: Some(key.record_id),
        }
    }

    /// Whether the given key falls inside this scope.
    #[must_use]
    pub fn contains(&self, key: &ConsensusKey) -> bool {
        self.task_id.is_none_or(|t| t == key.task_id)
            && self.record_id.is_none_or(|r| r == key.record_id)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "project {}", self.project_id)?;
        if let Some(task_id) = self.task_id {
            write!(f, " task {task_id}")?;
        }
        if let Some(record_id) = self.record_id {
            write!(f, " record {record_id}")?;
        }
        Ok(())
    }
}
