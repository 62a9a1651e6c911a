//! Synthetic track generator and benchmark utilities for msalign.
//!
//! This crate provides deterministic generation of multi-source matching
//! tracks, complete with reference alignments, for benchmarking and
//! property-based testing of `msalign-core`.

pub mod generator;
pub mod oracle;

pub use generator::{GeneratorConfig, SizeTier, generate_track};
pub use oracle::OracleMatcher;
