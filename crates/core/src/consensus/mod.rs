//! Manual-label consensus resolution.
//!
//! Decides, for every `(record, task)` pair labeled by several annotators,
//! which manual annotations count as ground truth (`is_valid_manual_label`).
//!
//! # Modules
//!
//! - `types` - Annotations, token tags, keys, scopes and task metadata
//! - `error` - Consensus-specific error types
//! - `uncertainty` - Grouping into keys and single-opinion vs contested
//! - `gold_star` - Reviewer override detection
//! - `agreement` - Unanimous-agreement resolvers (classification, extraction)
//! - `validity` - Per-annotation validity flags and change sets
//! - `promotion` - Gold-star clone planning
//! - `duplicates` - Double-submission sweep

pub mod agreement;
pub mod duplicates;
pub mod error;
pub mod gold_star;
pub mod promotion;
pub mod types;
pub mod uncertainty;
pub mod validity;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod validity_props;

pub use agreement::{AgreementResolver, ExtractionOpinion, extraction_opinion};
pub use duplicates::{DuplicateSet, DuplicateSuppressor};
pub use error::ConsensusError;
pub use gold_star::GoldStarDetector;
pub use promotion::{GoldStarClone, GoldStarPromoter, PromotionInput};
pub use types::{
    Annotation, AnnotationKind, ConsensusKey, LabelSource, Scope, TaskMetadata, TaskType, TokenTag,
};
pub use uncertainty::{Grouping, KeyCertainty, KeyGroup, UncertaintyClassifier};
pub use validity::{
    KeyResolution, Resolution, ValidityChanges, ValidityReport, ValiditySummary, ValidityWriter,
};
