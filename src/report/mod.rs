//! Report rendering and persistence.

pub mod generator;

pub use generator::*;
