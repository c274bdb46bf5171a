//! Core data structures and mathematical operations.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - `Splat` / `SplatCloud`: the read-only element records
//! - `IndexedDistance`: one entry of a sorted permutation
//! - Math utilities: model-view composition, view-space depth
//!
//! All types here are "pure data" - no threads, no GPU.

mod indexed;
mod splat;
pub mod math;

// Re-export public types
pub use indexed::{permutation, IndexedDistance};
pub use math::{model_view, view_depth};
pub use splat::{Splat, SplatCloud, SplatPosition};
