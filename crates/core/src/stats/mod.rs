//! Label statistics over validated manual labels.
//!
//! Downstream reporting only trusts manual annotations flagged
//! `is_valid_manual_label`; weak-supervision output is compared against them.

pub mod confusion;
pub mod distribution;
pub mod error;

pub use confusion::{ConfusionCell, ConfusionMatrix};
pub use distribution::{LabelCount, LabelDistribution};
pub use error::StatsError;
