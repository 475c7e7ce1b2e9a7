//! Statistical computations and parallel reduction operations
//!
//! This module provides reductions (mean, standard deviation, min, max) over a
//! named dimension of a dataset field, plus descriptive summaries of sampled series.
//!
//! # Organization
//!
//! - [`operations`]: Core statistical operations and traits
//! - [`parallel`]: Parallel computation implementations
//! - [`fields`]: Reductions over named dataset fields
//! - [`describe`]: Descriptive statistics for flat series

pub mod describe;
pub mod fields;
pub mod operations;
pub mod parallel;

// Re-export the main types and functions for convenience
pub use describe::{describe, Summary};
pub use fields::{mean_over_dimension, reduce_field, std_over_dimension};
pub use operations::{StatOperation, StatResult, StatisticalReduction};
pub use parallel::{parallel_max_axis, parallel_mean_axis, parallel_min_axis, parallel_std_axis};
