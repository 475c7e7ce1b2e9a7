//! In-memory labeled dataset: coordinates plus named data fields
//!
//! A [`Dataset`] is what a [`crate::plan::Plan`] evaluates to. All mutating
//! operations work on the dataset in place; deferred pipelines go through
//! [`crate::plan`] instead.

use crate::errors::{Result, ReLensError};
use crate::grid::Coordinate;
use crate::units::LinearTransform;
use ndarray::{ArrayD, Axis, Slice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use tracing::debug;

/// String attributes attached to fields and coordinates
pub type Attributes = BTreeMap<String, String>;

/// Name of the synthetic dimension created by [`Dataset::stack_fields`]
pub const VARIABLE_DIM: &str = "variable";

/// Tolerance used when comparing coordinate labels from different files
const LABEL_TOLERANCE: f64 = 1e-6;

/// What to do when a rename or drop names a field that does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Fail with [`ReLensError::VariableNotFound`]
    #[default]
    Strict,
    /// Log and carry on
    Skip,
}

/// A named data variable over some of the dataset's coordinates
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f32>,
    pub attrs: Attributes,
    /// File that supplied this field, if it was read from disk
    pub source: Option<PathBuf>,
}

impl Field {
    pub fn new(name: impl Into<String>, dims: Vec<String>, data: ArrayD<f32>) -> Self {
        Self {
            name: name.into(),
            dims,
            data,
            attrs: Attributes::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn units(&self) -> Option<&str> {
        self.attrs.get("units").map(String::as_str)
    }

    /// Position of `dim` among this field's dimensions
    pub fn axis_of(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| ReLensError::DimensionNotFound {
                var: self.name.clone(),
                dim: dim.to_string(),
            })
    }
}

/// Coordinates plus the fields defined over them
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    coords: Vec<Coordinate>,
    fields: BTreeMap<String, Field>,
    pub attrs: Attributes,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a coordinate. Existing fields are not re-validated.
    pub fn set_coord(&mut self, coord: Coordinate) {
        match self.coords.iter_mut().find(|c| c.name == coord.name) {
            Some(existing) => *existing = coord,
            None => self.coords.push(coord),
        }
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Result<&Coordinate> {
        self.coords
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ReLensError::CoordinateNotFound {
                name: name.to_string(),
            })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| ReLensError::VariableNotFound {
                var: name.to_string(),
            })
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut Field> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| ReLensError::VariableNotFound {
                var: name.to_string(),
            })
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Insert a new field after checking its shape against the coordinates
    pub fn insert_field(&mut self, field: Field) -> Result<()> {
        if self.fields.contains_key(&field.name) {
            return Err(ReLensError::DuplicateField { name: field.name });
        }
        if field.dims.len() != field.data.ndim() {
            return Err(ReLensError::IncompatibleCoordinates {
                name: field.name.clone(),
                message: format!(
                    "{} dimension names for a {}-dimensional array",
                    field.dims.len(),
                    field.data.ndim()
                ),
            });
        }
        for (dim, &len) in field.dims.iter().zip(field.data.shape()) {
            let coord = self.coord(dim)?;
            if coord.len() != len {
                return Err(ReLensError::IncompatibleCoordinates {
                    name: dim.clone(),
                    message: format!(
                        "field '{}' has length {len} but the coordinate has {}",
                        field.name,
                        coord.len()
                    ),
                });
            }
        }
        self.fields.insert(field.name.clone(), field);
        Ok(())
    }

    /// Merge another dataset into this one.
    ///
    /// Shared coordinates must carry the same labels; field names must not collide.
    pub fn merge(&mut self, other: Dataset) -> Result<()> {
        for coord in &other.coords {
            if let Some(mine) = self.coords.iter().find(|c| c.name == coord.name) {
                if !mine.same_labels(coord, LABEL_TOLERANCE) {
                    return Err(ReLensError::IncompatibleCoordinates {
                        name: coord.name.clone(),
                        message: format!(
                            "lengths {} and {} or labels differ between inputs",
                            mine.len(),
                            coord.len()
                        ),
                    });
                }
            }
        }
        for coord in other.coords {
            if self.coord(&coord.name).is_err() {
                self.coords.push(coord);
            }
        }
        for field in other.fields.into_values() {
            self.insert_field(field)?;
        }
        for (k, v) in other.attrs {
            self.attrs.entry(k).or_insert(v);
        }
        Ok(())
    }

    /// Restrict `dim` to the given index range across the coordinate and every field
    pub fn isel_range(&mut self, dim: &str, range: Range<usize>) -> Result<()> {
        let coord = self.coord(dim)?.select(range.clone());
        self.set_coord(coord);
        for field in self.fields.values_mut() {
            if let Some(axis) = field.dims.iter().position(|d| d == dim) {
                field.data = field
                    .data
                    .slice_axis(Axis(axis), Slice::from(range.clone()))
                    .to_owned();
            }
        }
        Ok(())
    }

    /// Inclusive label slice along `dim`, honouring the coordinate's direction
    pub fn select_range(&mut self, dim: &str, start: f64, stop: f64) -> Result<()> {
        let range = self.coord(dim)?.slice_indices(start, stop);
        debug!(dim, start, stop, ?range, "label selection");
        self.isel_range(dim, range)
    }

    /// Rename a field, subject to `policy` when it is absent
    pub fn rename_field(&mut self, from: &str, to: &str, policy: MissingPolicy) -> Result<()> {
        let Some(mut field) = self.fields.remove(from) else {
            return self.missing(from, policy);
        };
        if self.fields.contains_key(to) {
            self.fields.insert(from.to_string(), field);
            return Err(ReLensError::DuplicateField {
                name: to.to_string(),
            });
        }
        field.name = to.to_string();
        self.fields.insert(to.to_string(), field);
        Ok(())
    }

    /// Remove a field, subject to `policy` when it is absent
    pub fn drop_field(&mut self, name: &str, policy: MissingPolicy) -> Result<Option<Field>> {
        match self.fields.remove(name) {
            Some(field) => Ok(Some(field)),
            None => self.missing(name, policy).map(|()| None),
        }
    }

    /// Rename a coordinate and every field dimension that refers to it
    pub fn rename_dimension(&mut self, from: &str, to: &str) -> Result<()> {
        if self.coord(to).is_ok() {
            return Err(ReLensError::IncompatibleCoordinates {
                name: to.to_string(),
                message: "target dimension name already exists".to_string(),
            });
        }
        let coord = self
            .coords
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or_else(|| ReLensError::CoordinateNotFound {
                name: from.to_string(),
            })?;
        coord.name = to.to_string();
        for field in self.fields.values_mut() {
            for dim in field.dims.iter_mut().filter(|d| *d == from) {
                *dim = to.to_string();
            }
        }
        Ok(())
    }

    /// Rewrite a field's values with `transform` and set its `units` attribute
    pub fn apply_transform(
        &mut self,
        name: &str,
        transform: &LinearTransform,
        units: &str,
    ) -> Result<()> {
        let field = self.field_mut(name)?;
        field.data.par_mapv_inplace(|v| transform.apply_f32(v));
        field.attrs.insert("units".to_string(), units.to_string());
        Ok(())
    }

    /// Concatenate fields along a new leading [`VARIABLE_DIM`] axis.
    ///
    /// All named fields must share the same dimensions.
    pub fn stack_fields(&self, names: &[&str]) -> Result<(ArrayD<f32>, Vec<String>)> {
        let first = self.field(names.first().copied().ok_or_else(|| {
            ReLensError::EmptySelection {
                dim: VARIABLE_DIM.to_string(),
            }
        })?)?;
        let mut views = Vec::with_capacity(names.len());
        for name in names {
            let field = self.field(name)?;
            if field.dims != first.dims {
                return Err(ReLensError::IncompatibleCoordinates {
                    name: field.name.clone(),
                    message: format!("dims {:?} differ from {:?}", field.dims, first.dims),
                });
            }
            views.push(field.data.view());
        }
        let stacked = ndarray::stack(Axis(0), &views)?;
        let mut dims = vec![VARIABLE_DIM.to_string()];
        dims.extend(first.dims.iter().cloned());
        Ok((stacked, dims))
    }

    fn missing(&self, name: &str, policy: MissingPolicy) -> Result<()> {
        match policy {
            MissingPolicy::Strict => Err(ReLensError::VariableNotFound {
                var: name.to_string(),
            }),
            MissingPolicy::Skip => {
                tracing::warn!(field = name, "field not present, skipping");
                Ok(())
            }
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dimensions:")?;
        for coord in &self.coords {
            write!(f, "    {} = {}", coord.name, coord.len())?;
            match coord.bounds() {
                Some((lo, hi)) => writeln!(f, "  [{lo} .. {hi}]")?,
                None => writeln!(f)?,
            }
        }
        writeln!(f, "Data variables:")?;
        for field in self.fields.values() {
            write!(f, "    {} ({})", field.name, field.dims.join(", "))?;
            if let Some(units) = field.units() {
                write!(f, " [{units}]")?;
            }
            writeln!(f)?;
        }
        if !self.attrs.is_empty() {
            writeln!(f, "Attributes:")?;
            for (k, v) in &self.attrs {
                writeln!(f, "    {k}: {v}")?;
            }
        }
        Ok(())
    }
}
