#![allow(dead_code)]

use ndarray::Array3;
use netcdf::create;
use std::path::{Path, PathBuf};

/// 2008-01-01 00:00 in hours since 1900-01-01
pub const JAN_2008_HOURS: f64 = 946_704.0;
pub const TIME_UNITS: &str = "hours since 1900-01-01 00:00:00";

pub const TEMPERATURE: &str = "air_temperature_at_2_metres";
pub const PRESSURE: &str = "air_pressure_at_mean_sea_level";

/// 60N to 20N in 5 degree steps, descending like the reanalysis grid
pub fn lats() -> Vec<f64> {
    (0..9).map(|i| 60.0 - 5.0 * f64::from(i)).collect()
}

/// 200E to 270E in 5 degree steps
pub fn lons() -> Vec<f64> {
    (0..15).map(|i| 200.0 + 5.0 * f64::from(i)).collect()
}

pub fn times() -> Vec<f64> {
    (0..4).map(|i| JAN_2008_HOURS + f64::from(i)).collect()
}

/// Write one variable on the `time0`/`lat`/`lon` grid, the way the bucket ships it
pub fn write_variable_file(
    path: &Path,
    name: &str,
    units: &str,
    value: impl Fn(usize, f64, f64) -> f32,
) {
    let (times, lats, lons) = (times(), lats(), lons());
    let mut file = create(path).expect("Failed to create NetCDF file");

    file.add_dimension("time0", times.len())
        .expect("Failed to add dimension time0");
    file.add_dimension("lat", lats.len())
        .expect("Failed to add dimension lat");
    file.add_dimension("lon", lons.len())
        .expect("Failed to add dimension lon");

    let mut time = file
        .add_variable::<f64>("time0", &["time0"])
        .expect("Failed to add time0");
    time.put_attribute("units", TIME_UNITS).unwrap();
    time.put_values(&times, ..).unwrap();

    let mut lat = file.add_variable::<f64>("lat", &["lat"]).unwrap();
    lat.put_attribute("units", "degrees_north").unwrap();
    lat.put_values(&lats, ..).unwrap();

    let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
    lon.put_attribute("units", "degrees_east").unwrap();
    lon.put_values(&lons, ..).unwrap();

    let data = Array3::from_shape_fn((times.len(), lats.len(), lons.len()), |(t, y, x)| {
        value(t, lats[y], lons[x])
    });
    let mut var = file
        .add_variable::<f32>(name, &["time0", "lat", "lon"])
        .expect("Failed to add variable");
    var.put_attribute("units", units).unwrap();
    var.put(data.view(), ..).expect("Failed to write data");
}

/// Kelvin field between roughly 280 K (north) and 303 K (south)
#[allow(clippy::cast_possible_truncation)]
pub fn temperature_k(t: usize, lat: f64, _lon: f64) -> f32 {
    (300.0 - 0.5 * (lat - 20.0)) as f32 + t as f32
}

/// Pascal field between 100000 Pa and roughly 101400 Pa
#[allow(clippy::cast_possible_truncation)]
pub fn pressure_pa(t: usize, _lat: f64, lon: f64) -> f32 {
    (100_000.0 + 20.0 * (lon - 200.0)) as f32 + 10.0 * t as f32
}

/// Write January 2008 temperature and pressure files into `dir`
pub fn write_month(dir: &Path) -> Vec<PathBuf> {
    let temperature = dir.join(format!("200801_{TEMPERATURE}.nc"));
    let pressure = dir.join(format!("200801_{PRESSURE}.nc"));
    write_variable_file(&temperature, TEMPERATURE, "K", temperature_k);
    write_variable_file(&pressure, PRESSURE, "Pa", pressure_pa);
    vec![temperature, pressure]
}
