//! Coordinate axes: label slicing, nearest-neighbour lookup and CF time decoding
//!
//! Reanalysis grids store latitude north-to-south (descending) and longitude on a
//! 0–360° eastward axis (ascending). Label slices follow the axis' own order, so a
//! `(start, stop)` pair given against the grain selects nothing instead of failing.

use crate::errors::{Result, ReLensError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// Direction in which coordinate values run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// A one-dimensional labeled coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub name: String,
    pub values: Vec<f64>,
    pub attrs: BTreeMap<String, String>,
}

impl Coordinate {
    /// Create a coordinate without attributes
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            attrs: BTreeMap::new(),
        }
    }

    /// Attach an attribute, builder style
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `units` attribute, if any
    pub fn units(&self) -> Option<&str> {
        self.attrs.get("units").map(String::as_str)
    }

    /// Direction of the axis. Single-valued and empty axes count as ascending.
    pub fn order(&self) -> Order {
        match (self.values.first(), self.values.last()) {
            (Some(first), Some(last)) if last < first => Order::Descending,
            _ => Order::Ascending,
        }
    }

    /// Inclusive label slice `[start, stop]` in the axis' own direction.
    ///
    /// On a descending axis `start` must be the larger bound; bounds given in
    /// the opposite order produce an empty range.
    pub fn slice_indices(&self, start: f64, stop: f64) -> Range<usize> {
        let (lo, hi) = match self.order() {
            Order::Ascending => (
                self.values.partition_point(|&v| v < start),
                self.values.partition_point(|&v| v <= stop),
            ),
            Order::Descending => (
                self.values.partition_point(|&v| v > start),
                self.values.partition_point(|&v| v >= stop),
            ),
        };
        if lo < hi {
            lo..hi
        } else {
            lo..lo
        }
    }

    /// Index of the value closest to `target`; ties go to the lower index.
    pub fn nearest_index(&self, target: f64) -> Result<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| {
                let distance = (v - target).abs();
                match best {
                    Some((_, d)) if d <= distance => best,
                    _ => Some((i, distance)),
                }
            })
            .map(|(i, _)| i)
            .ok_or_else(|| ReLensError::EmptySelection {
                dim: self.name.clone(),
            })
    }

    /// New coordinate holding only `range`
    #[must_use]
    pub fn select(&self, range: Range<usize>) -> Self {
        Self {
            name: self.name.clone(),
            values: self.values[range].to_vec(),
            attrs: self.attrs.clone(),
        }
    }

    /// Inclusive `(min, max)` of the values, `None` when empty
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let first = *self.values.first()?;
        Some(
            self.values
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Whether two coordinates carry the same labels within `tolerance`
    pub fn same_labels(&self, other: &Self, tolerance: f64) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Names of the time, latitude and longitude dimensions in the source files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridNames {
    pub time: String,
    pub lat: String,
    pub lon: String,
}

impl Default for GridNames {
    fn default() -> Self {
        Self {
            time: "time0".to_string(),
            lat: "lat".to_string(),
            lon: "lon".to_string(),
        }
    }
}

/// Inclusive geographic selection.
///
/// Bounds are `(start, stop)` pairs in the grid's own order: descending for
/// latitude, ascending for longitude on the reanalysis grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat: (f64, f64),
    pub lon: (f64, f64),
}

impl BoundingBox {
    /// Western United States, matching the default reanalysis subset
    pub const WESTERN_US: Self = Self {
        lat: (50.0, 30.0),
        lon: (220.0, 255.0),
    };

    /// Whether a point (longitude already normalized) lies inside the box
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let within = |v: f64, (a, b): (f64, f64)| v >= a.min(b) && v <= a.max(b);
        within(lat, self.lat) && within(lon, self.lon)
    }
}

/// Map a signed west-negative longitude onto the 0–360° eastward convention.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon < 0.0 {
        360.0 + lon
    } else {
        lon
    }
}

/// Decode CF `"<unit> since <reference>"` offsets into timestamps.
pub fn decode_cf_time(values: &[f64], units: &str) -> Result<Vec<NaiveDateTime>> {
    let invalid = || ReLensError::InvalidTimeUnits {
        units: units.to_string(),
    };

    let (unit, reference) = units.split_once(" since ").ok_or_else(invalid)?;
    let millis_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" | "s" => 1_000.0,
        "minutes" | "minute" | "mins" => 60_000.0,
        "hours" | "hour" | "hrs" | "h" => 3_600_000.0,
        "days" | "day" | "d" => 86_400_000.0,
        _ => return Err(invalid()),
    };
    let origin = parse_reference(reference.trim()).ok_or_else(invalid)?;

    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return Err(invalid());
            }
            #[allow(clippy::cast_possible_truncation)]
            let offset = Duration::milliseconds((v * millis_per_unit).round() as i64);
            origin.checked_add_signed(offset).ok_or_else(invalid)
        })
        .collect()
}

fn parse_reference(s: &str) -> Option<NaiveDateTime> {
    // Drop a trailing time zone designator such as "UTC" or "Z"
    let s = s.trim_end_matches(" UTC").trim_end_matches('Z');
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
