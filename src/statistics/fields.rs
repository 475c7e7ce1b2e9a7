//! Reductions over named fields of a [`Dataset`]

use super::operations::{StatOperation, StatResult, StatisticalReduction};
use crate::dataset::Dataset;
use crate::errors::Result;
use tracing::debug;

/// Computes the mean of `field` over `dim`
///
/// # Errors
///
/// Returns an error if the field or dimension is not found.
pub fn mean_over_dimension(ds: &Dataset, field: &str, dim: &str) -> Result<StatResult<f32>> {
    reduce_field(ds, field, dim, StatOperation::Mean)
}

/// Computes the population standard deviation of `field` over `dim`
///
/// # Errors
///
/// Returns an error if the field or dimension is not found.
pub fn std_over_dimension(ds: &Dataset, field: &str, dim: &str) -> Result<StatResult<f32>> {
    reduce_field(ds, field, dim, StatOperation::Std)
}

/// Generic function to compute statistics over a dimension
///
/// The result keeps the field's remaining dimensions in their original order.
pub fn reduce_field(
    ds: &Dataset,
    field_name: &str,
    dim_name: &str,
    operation: StatOperation,
) -> Result<StatResult<f32>> {
    let field = ds.field(field_name)?;
    let axis_index = field.axis_of(dim_name)?;

    debug!(
        field = field_name,
        dim = dim_name,
        op = operation.as_str(),
        shape = ?field.data.shape(),
        threads = rayon::current_num_threads(),
        "reducing"
    );

    let data = field.data.reduce_along_axis(axis_index, operation)?;

    let remaining_dimensions: Vec<String> = field
        .dims
        .iter()
        .enumerate()
        .filter_map(|(i, name)| if i == axis_index { None } else { Some(name.clone()) })
        .collect();

    Ok(StatResult {
        data,
        remaining_dimensions,
        operation,
        variable_name: field_name.to_string(),
        dimension_name: dim_name.to_string(),
        units: field.units().map(str::to_string),
    })
}
