//! Point sampling at named locations and the tabular report built from it
//!
//! Locations use signed, west-negative longitudes. They are normalized onto the
//! grid's 0–360° convention before the nearest-neighbour lookup; skipping that
//! step would silently match a cell in the wrong hemisphere.

use crate::dataset::Dataset;
use crate::errors::{Result, ReLensError};
use crate::grid::{decode_cf_time, normalize_longitude, Coordinate, GridNames};
use crate::statistics::{describe, Summary};
use arrow::array::{ArrayRef, Float32Array, Float64Array, TimestampSecondArray};
use arrow::datatypes::{DataType, Field as ArrowField, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A named point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    /// Degrees east, negative for west
    pub lon: f64,
}

impl Location {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
        }
    }

    /// Longitude on the 0–360° grid convention
    pub fn grid_lon(&self) -> f64 {
        normalize_longitude(self.lon)
    }
}

/// Time series extracted at the grid cell nearest to a location
#[derive(Debug, Clone)]
pub struct PointSeries {
    pub location: String,
    pub field: String,
    /// Coordinates of the matched cell
    pub grid_lat: f64,
    pub grid_lon: f64,
    /// The remaining (time) coordinate
    pub index: Coordinate,
    pub values: Vec<f32>,
    pub units: Option<String>,
}

/// Select the nearest cell to `location` and return its series.
///
/// With `tolerance` set, a nearest cell further than that many degrees away on
/// either axis is an error instead of a silent edge match.
pub fn sample_point(
    ds: &Dataset,
    field_name: &str,
    location: &Location,
    names: &GridNames,
    tolerance: Option<f64>,
) -> Result<PointSeries> {
    let field = ds.field(field_name)?;
    let lat_axis = field.axis_of(&names.lat)?;
    let lon_axis = field.axis_of(&names.lon)?;

    let lat_coord = ds.coord(&names.lat)?;
    let lon_coord = ds.coord(&names.lon)?;
    let target_lon = location.grid_lon();
    let lat_idx = lat_coord.nearest_index(location.lat)?;
    let lon_idx = lon_coord.nearest_index(target_lon)?;
    let grid_lat = lat_coord.values[lat_idx];
    let grid_lon = lon_coord.values[lon_idx];

    if let Some(tolerance) = tolerance {
        for (dim, distance) in [
            (&names.lat, (grid_lat - location.lat).abs()),
            (&names.lon, (grid_lon - target_lon).abs()),
        ] {
            if distance > tolerance {
                return Err(ReLensError::OutsideGrid {
                    location: location.name.clone(),
                    dim: dim.clone(),
                    distance,
                    tolerance,
                });
            }
        }
    }

    // Drop the higher axis first so the lower index stays valid
    let ((hi_axis, hi_idx), (lo_axis, lo_idx)) = if lat_axis > lon_axis {
        ((lat_axis, lat_idx), (lon_axis, lon_idx))
    } else {
        ((lon_axis, lon_idx), (lat_axis, lat_idx))
    };
    let column = field.data.index_axis(Axis(hi_axis), hi_idx);
    let column = column.index_axis(Axis(lo_axis), lo_idx);
    if column.ndim() != 1 {
        return Err(ReLensError::IncompatibleCoordinates {
            name: field_name.to_string(),
            message: format!(
                "expected a single remaining dimension after point selection, found {}",
                column.ndim()
            ),
        });
    }

    let index_dim = field
        .dims
        .iter()
        .enumerate()
        .find(|(i, _)| *i != lat_axis && *i != lon_axis)
        .map(|(_, d)| d.as_str())
        .unwrap_or_default();

    debug!(
        location = %location.name,
        grid_lat,
        grid_lon,
        "nearest grid cell"
    );

    Ok(PointSeries {
        location: location.name.clone(),
        field: field_name.to_string(),
        grid_lat,
        grid_lon,
        index: ds.coord(index_dim)?.clone(),
        values: column.iter().copied().collect(),
        units: field.units().map(str::to_string),
    })
}

/// One column per location, sharing a common time index
#[derive(Debug, Clone)]
pub struct SampleTable {
    pub field: String,
    pub units: Option<String>,
    pub index: Coordinate,
    /// Decoded timestamps when the index carries CF time units
    pub timestamps: Option<Vec<NaiveDateTime>>,
    pub columns: Vec<(String, Vec<f32>)>,
}

impl SampleTable {
    /// Combine series of the same field into a table
    pub fn from_series(series: Vec<PointSeries>) -> Result<Self> {
        let first = series.first().ok_or_else(|| ReLensError::EmptySelection {
            dim: "location".to_string(),
        })?;
        let field = first.field.clone();
        let units = first.units.clone();
        let index = first.index.clone();

        for s in &series {
            if s.field != field || !s.index.same_labels(&index, 0.0) {
                return Err(ReLensError::IncompatibleCoordinates {
                    name: index.name.clone(),
                    message: format!("series for '{}' does not share the table index", s.location),
                });
            }
        }

        let timestamps = match index.units().filter(|u| u.contains(" since ")) {
            Some(units) => match decode_cf_time(&index.values, units) {
                Ok(times) => Some(times),
                Err(e) => {
                    warn!(index = %index.name, units, error = %e, "keeping raw time index");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            field,
            units,
            index,
            timestamps,
            columns: series.into_iter().map(|s| (s.location, s.values)).collect(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    /// Arrow view of the table: index column then one nullable column per location
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len() + 1);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() + 1);

        match &self.timestamps {
            Some(times) => {
                fields.push(ArrowField::new(
                    &self.index.name,
                    DataType::Timestamp(TimeUnit::Second, None),
                    false,
                ));
                let secs: Vec<i64> = times.iter().map(|t| t.and_utc().timestamp()).collect();
                arrays.push(Arc::new(TimestampSecondArray::from(secs)));
            }
            None => {
                fields.push(ArrowField::new(&self.index.name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(self.index.values.clone())));
            }
        }

        for (name, values) in &self.columns {
            fields.push(ArrowField::new(name, DataType::Float32, true));
            let column: Vec<Option<f32>> = values
                .iter()
                .map(|v| v.is_finite().then_some(*v))
                .collect();
            arrays.push(Arc::new(Float32Array::from(column)));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    /// Write the table as CSV with a header row
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let batch = self.to_record_batch()?;
        let file = File::create(path)?;
        let mut writer = arrow::csv::Writer::new(file);
        writer.write(&batch)?;
        Ok(())
    }

    /// Descriptive statistics per location column
    pub fn describe(&self) -> Vec<(String, Summary)> {
        self.columns
            .iter()
            .map(|(name, values)| (name.clone(), describe(values)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Field;
    use ndarray::Array3;

    fn dataset() -> Dataset {
        let mut ds = Dataset::new();
        ds.set_coord(
            Coordinate::new("time0", vec![0.0, 1.0, 2.0])
                .with_attr("units", "hours since 2008-01-01 00:00:00"),
        );
        ds.set_coord(Coordinate::new("lat", vec![40.0, 35.0, 30.0]));
        ds.set_coord(Coordinate::new("lon", vec![235.0, 240.0, 245.0]));
        let data = Array3::from_shape_fn((3, 3, 3), |(t, y, x)| (100 * t + 10 * y + x) as f32);
        ds.insert_field(
            Field::new(
                "t2m",
                vec!["time0".into(), "lat".into(), "lon".into()],
                data.into_dyn(),
            )
            .with_attr("units", "C"),
        )
        .unwrap();
        ds
    }

    #[test]
    fn grid_aligned_sample_returns_exact_cell() {
        let ds = dataset();
        let loc = Location::new("aligned", 35.0, -120.0);
        let series = sample_point(&ds, "t2m", &loc, &GridNames::default(), None).unwrap();
        assert_eq!(series.grid_lat, 35.0);
        assert_eq!(series.grid_lon, 240.0);
        assert_eq!(series.values, vec![11.0, 111.0, 211.0]);
    }

    #[test]
    fn west_negative_longitude_is_normalized() {
        let ds = dataset();
        let santa_barbara = Location::new("Santa Barbara", 34.4208, -119.6982);
        let series = sample_point(&ds, "t2m", &santa_barbara, &GridNames::default(), None).unwrap();
        assert_eq!(series.grid_lon, 240.0);
        assert_eq!(series.grid_lat, 35.0);
    }

    #[test]
    fn tolerance_rejects_far_points() {
        let ds = dataset();
        let honolulu = Location::new("Honolulu", 21.3069, -157.8583);
        let err = sample_point(&ds, "t2m", &honolulu, &GridNames::default(), Some(1.0)).unwrap_err();
        assert!(matches!(err, ReLensError::OutsideGrid { .. }));
    }

    #[test]
    fn undecodable_time_units_keep_raw_index() {
        let mut ds = dataset();
        ds.set_coord(
            Coordinate::new("time0", vec![0.0, 1.0, 2.0])
                .with_attr("units", "fortnights since 2008-01-01"),
        );
        let names = GridNames::default();
        let series = vec![sample_point(&ds, "t2m", &Location::new("a", 40.0, -125.0), &names, None).unwrap()];
        let table = SampleTable::from_series(series).unwrap();
        assert!(table.timestamps.is_none());

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Float64);
    }

    #[test]
    fn table_to_arrow_and_describe() {
        let ds = dataset();
        let names = GridNames::default();
        let series = vec![
            sample_point(&ds, "t2m", &Location::new("a", 40.0, -125.0), &names, None).unwrap(),
            sample_point(&ds, "t2m", &Location::new("b", 30.0, -115.0), &names, None).unwrap(),
        ];
        let table = SampleTable::from_series(series).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert!(table.timestamps.is_some());

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_columns(), 3);
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.schema().field(1).name(), "a");

        let summaries = table.describe();
        assert_eq!(summaries[0].0, "a");
        assert_eq!(summaries[0].1.count, 3);
        assert_eq!(summaries[0].1.mean, 100.0);
        assert_eq!(summaries[1].1.min, 22.0);
    }
}
