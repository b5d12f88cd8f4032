//! Transformation module.
//!
//! - Reshape: tagged table rows to one record per municipality
//! - Derive: filtering, percentages and ordering
//! - Pipeline: fetch, reshape, derive and report for a state

pub mod derive;
pub mod pipeline;
pub mod reshape;

pub use derive::{derive_and_filter, derive_row, percentage, round2};
pub use pipeline::*;
pub use reshape::{reshape, reshape_tables, ReshapeSkip, Reshaped};
