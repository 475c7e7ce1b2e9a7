//! NetCDF I/O: assembling downloaded files into a [`Dataset`] and writing results
//!
//! Reading follows the CF conventions the reanalysis files use: `_FillValue` and
//! `missing_value` become NaN, `scale_factor`/`add_offset` packing is undone, and
//! a dimension without a coordinate variable gets an integer index coordinate.

use crate::dataset::{Attributes, Dataset, Field};
use crate::errors::{Result, ReLensError};
use crate::grid::Coordinate;
use chrono::Utc;
use glob::glob;
use ndarray::{ArrayD, IxDyn};
use netcdf::{create, AttributeValue, Extent, Variable};
use std::collections::BTreeMap;
use std::ops::Range;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Attributes consumed while unpacking values; not carried into the dataset
const PACKING_ATTRIBUTES: [&str; 4] = ["_FillValue", "missing_value", "scale_factor", "add_offset"];

/// Label ranges to apply while reading, keyed by dimension name
pub type Selection = BTreeMap<String, (f64, f64)>;

/// Expand a glob pattern (e.g. `data/200801_*.nc`) into the matching files.
///
/// Results are sorted so the assembled field order does not depend on
/// directory iteration order. Directories matching the pattern are ignored.
pub fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    for entry in glob(pattern)? {
        let path = entry?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        let path = Path::new(pattern);
        return Err(ReLensError::NoFilesMatched {
            pattern: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            dir: match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            },
        });
    }
    matches.sort();
    debug!(pattern, files = matches.len(), "resolved file pattern");
    Ok(matches)
}

/// Read and merge several files into one dataset
pub fn open_dataset(files: &[PathBuf], selection: &Selection) -> Result<Dataset> {
    let mut combined = Dataset::new();
    for path in files {
        let ds = read_file(path, selection)?;
        info!(
            file = %path.display(),
            fields = ?ds.field_names(),
            "assembled file"
        );
        combined.merge(ds)?;
    }
    Ok(combined)
}

/// Read the coordinates and data variables of one NetCDF file
pub fn read_file(path: &Path, selection: &Selection) -> Result<Dataset> {
    let file = netcdf::open(path)?;
    let mut ds = Dataset::new();

    for attr in file.attributes() {
        if let Some(value) = attr.value().ok().and_then(attribute_to_string) {
            ds.attrs.insert(attr.name().to_string(), value);
        }
    }

    // Coordinates first, restricted by the selection
    let mut ranges: BTreeMap<String, Range<usize>> = BTreeMap::new();
    for dim in file.dimensions() {
        let name = dim.name();
        let coord = match file.variable(&name) {
            Some(var) if var.dimensions().len() == 1 => Coordinate {
                name: name.clone(),
                values: read_values_f64(&var)?,
                attrs: string_attributes(&var),
            },
            #[allow(clippy::cast_precision_loss)]
            _ => Coordinate::new(name.clone(), (0..dim.len()).map(|i| i as f64).collect()),
        };
        let range = match selection.get(&name) {
            Some(&(start, stop)) => {
                let range = coord.slice_indices(start, stop);
                debug!(dim = %name, start, stop, ?range, "pushed selection into read");
                range
            }
            None => 0..coord.len(),
        };
        ds.set_coord(coord.select(range.clone()));
        ranges.insert(name, range);
    }

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        if dims.is_empty() || is_coordinate(&name, &dims) || is_bounds(&name) {
            continue;
        }

        let var_ranges: Vec<Range<usize>> = dims
            .iter()
            .map(|d| ranges.get(d).cloned().unwrap_or(0..0))
            .collect();
        let data = read_field_values(&var, &var_ranges)?;

        let mut field = Field::new(name, dims, data);
        field.attrs = string_attributes(&var);
        field.source = Some(path.to_path_buf());
        ds.insert_field(field)?;
    }

    Ok(ds)
}

fn is_coordinate(name: &str, dims: &[String]) -> bool {
    dims.len() == 1 && dims[0] == name
}

fn is_bounds(name: &str) -> bool {
    name.ends_with("_bounds") || name.ends_with("_bnds")
}

fn read_values_f64(var: &Variable) -> Result<Vec<f64>> {
    Ok(var.get_values::<f64, _>(..)?)
}

/// Read a hyperslab as `f32`, undoing CF packing and masking fill values
fn read_field_values(var: &Variable, ranges: &[Range<usize>]) -> Result<ArrayD<f32>> {
    let shape: Vec<usize> = ranges.iter().map(|r| r.end - r.start).collect();
    if shape.iter().any(|&len| len == 0) {
        return Ok(ArrayD::from_shape_vec(IxDyn(&shape), Vec::new())?);
    }

    let extents: Vec<Extent> = ranges.iter().cloned().map(Extent::from).collect();
    let raw = var.get_values::<f32, _>(extents.as_slice())?;

    let fill_values: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|key| attribute_f64(var, key))
        .collect();
    let scale = attribute_f64(var, "scale_factor").unwrap_or(1.0);
    let offset = attribute_f64(var, "add_offset").unwrap_or(0.0);

    #[allow(clippy::cast_possible_truncation)]
    let values: Vec<f32> = raw
        .into_iter()
        .map(|v| {
            let raw = f64::from(v);
            if fill_values.iter().any(|&fv| (raw - fv).abs() <= fv.abs() * 1e-7) {
                f32::NAN
            } else {
                (raw * scale + offset) as f32
            }
        })
        .collect();

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

fn attribute_f64(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        _ => None,
    }
}

fn string_attributes(var: &Variable) -> Attributes {
    var.attributes()
        .filter(|a| !PACKING_ATTRIBUTES.contains(&a.name()))
        .filter_map(|a| {
            let value = attribute_to_string(a.value().ok()?)?;
            Some((a.name().to_string(), value))
        })
        .collect()
}

fn attribute_to_string(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(v) => Some(v.join(", ")),
        AttributeValue::Float(v) => Some(v.to_string()),
        AttributeValue::Double(v) => Some(v.to_string()),
        AttributeValue::Short(v) => Some(v.to_string()),
        AttributeValue::Int(v) => Some(v.to_string()),
        AttributeValue::Longlong(v) => Some(v.to_string()),
        _ => None,
    }
}

/// Writes reduction results and their coordinates to a new NetCDF file
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write `fields` together with the coordinates they reference.
    ///
    /// An existing file at the output path is replaced.
    pub fn write(&self, coords: &[Coordinate], fields: &[Field]) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;

        let used: Vec<&Coordinate> = coords
            .iter()
            .filter(|c| fields.iter().any(|f| f.dims.contains(&c.name)))
            .collect();

        for coord in &used {
            file.add_dimension(&coord.name, coord.len())?;
        }
        for coord in &used {
            let mut var = file.add_variable::<f64>(&coord.name, &[coord.name.as_str()])?;
            for (key, value) in &coord.attrs {
                var.put_attribute(key, value.as_str())?;
            }
            var.put_values(&coord.values, ..)?;
        }

        for field in fields {
            for dim in &field.dims {
                if !used.iter().any(|c| &c.name == dim) {
                    return Err(ReLensError::CoordinateNotFound { name: dim.clone() });
                }
            }
            let dim_refs: Vec<&str> = field.dims.iter().map(String::as_str).collect();
            let mut var = file.add_variable::<f32>(&field.name, &dim_refs)?;
            var.put_attribute("_FillValue", f32::NAN)?;
            for (key, value) in &field.attrs {
                var.put_attribute(key, value.as_str())?;
            }
            var.put(field.data.view(), ..)?;
        }

        file.add_attribute(
            "history",
            format!("Created by ReLens on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}
