//! Consensus error types.
//!
//! Resolution itself never fails: missing metadata is reported, not raised.
//! Errors come from gold-star promotion and from the store.

use thiserror::Error;

use labelvault_shared::types::{AnnotationId, LabelId};

use super::types::ConsensusKey;

/// Errors that can occur during consensus operations.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Gold-star promotion was requested with no annotations.
    #[error("No annotations selected for gold-star promotion")]
    EmptySelection,

    /// A selected annotation does not exist (anymore).
    #[error("Annotation {0} not found")]
    AnnotationNotFound(AnnotationId),

    /// A selected annotation belongs to a different consensus key.
    #[error("Annotation {annotation_id} belongs to {found}, expected {expected}")]
    MixedKeys {
        /// Offending annotation.
        annotation_id: AnnotationId,
        /// Key the promotion targets.
        expected: ConsensusKey,
        /// Key the annotation belongs to.
        found: ConsensusKey,
    },

    /// A selected annotation was not produced by a human annotator.
    #[error("Annotation {0} is not a manual label")]
    NotManual(AnnotationId),

    /// The label of a selected annotation has no task metadata.
    #[error("No task metadata for label {0}")]
    MissingTaskMetadata(LabelId),

    /// Only one annotator labeled the key, so there is nothing to resolve.
    #[error("Key {0} has a single opinion; nothing to resolve")]
    KeyNotContested(ConsensusKey),

    /// Annotation store failure.
    #[error("Database error: {0}")]
    Database(String),
}
