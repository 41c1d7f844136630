//! Core business logic for Labelvault.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Annotations are fetched by the store layer and handed over as plain values;
//! everything here is in-memory grouping and set comparison.
//!
//! # Modules
//!
//! - `consensus` - Manual-label consensus resolution (validity, gold stars, duplicates)
//! - `stats` - Label distribution and confusion matrices over validated labels

pub mod consensus;
pub mod stats;
