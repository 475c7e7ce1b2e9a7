//! Core statistical operations and traits
//!
//! This module defines the fundamental types and traits for statistical operations.

use crate::errors::{Result, ReLensError};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Supported statistical operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatOperation {
    /// Arithmetic mean
    Mean,
    /// Population standard deviation (ddof = 0)
    Std,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl StatOperation {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Min => "minimum",
            Self::Max => "maximum",
        }
    }
}

/// Result of a statistical computation
#[derive(Debug, Clone)]
pub struct StatResult<T> {
    /// The computed data array
    pub data: ArrayD<T>,
    /// Names of remaining dimensions after reduction
    pub remaining_dimensions: Vec<String>,
    /// The operation that was performed
    pub operation: StatOperation,
    /// Original field name
    pub variable_name: String,
    /// Dimension that was reduced over
    pub dimension_name: String,
    /// Units carried over from the source field
    pub units: Option<String>,
}

impl<T> StatResult<T> {
    /// Name given to the result, e.g. `t2m_mean_over_time0`
    #[must_use]
    pub fn result_name(&self) -> String {
        format!(
            "{}_{}_over_{}",
            self.variable_name,
            self.operation.as_str(),
            self.dimension_name
        )
    }

    /// Get the shape of the result data
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Get the number of dimensions in the result
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }
}

impl StatResult<f32> {
    /// `(min, max)` over finite values, `None` if there are none
    #[must_use]
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Trait for types that can perform statistical reductions along an axis
pub trait StatisticalReduction<T> {
    /// Perform a statistical reduction along the specified axis
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is out of bounds for the array.
    fn reduce_along_axis(&self, axis: usize, operation: StatOperation) -> Result<ArrayD<T>>;
}

impl StatisticalReduction<f32> for ArrayD<f32> {
    fn reduce_along_axis(&self, axis: usize, operation: StatOperation) -> Result<ArrayD<f32>> {
        if axis >= self.ndim() {
            return Err(ReLensError::Statistics(format!(
                "Axis {axis} is out of bounds for array with {} dimensions",
                self.ndim()
            )));
        }

        Ok(match operation {
            StatOperation::Mean => super::parallel::parallel_mean_axis(self, axis),
            StatOperation::Std => super::parallel::parallel_std_axis(self, axis),
            StatOperation::Min => super::parallel::parallel_min_axis(self, axis),
            StatOperation::Max => super::parallel::parallel_max_axis(self, axis),
        })
    }
}
