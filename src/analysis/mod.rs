//! Aggregation of per-crate scan results.

pub mod aggregator;

pub use aggregator::*;
