//! Pipeline configuration
//!
//! Built-in defaults reproduce the classic ERA5 walkthrough: January 2008 from
//! the public `era5-pds` bucket, 2 m air temperature and mean sea level pressure,
//! a western-US bounding box and a handful of cities. A TOML file and `RELENS_*`
//! environment variables (nested keys separated by `__`) are layered on top.

use crate::dataset::MissingPolicy;
use crate::errors::Result;
use crate::grid::{BoundingBox, GridNames};
use crate::sampling::Location;
use crate::units::{LinearTransform, CELSIUS, HECTOPASCAL, KELVIN_TO_CELSIUS, PASCAL_TO_HECTOPASCAL};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source variable, the short name it is renamed to and its unit conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Variable name in the bucket and in the downloaded file
    pub source: String,
    /// Short name used after assembly
    pub name: String,
    #[serde(default)]
    pub transform: Option<LinearTransform>,
    /// Unit label written together with `transform`
    #[serde(default)]
    pub units: Option<String>,
}

/// Where results are written besides stdout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// NetCDF file receiving the mean/std maps
    pub netcdf: Option<PathBuf>,
    /// Directory receiving one `<field>_samples.csv` per field
    pub csv_dir: Option<PathBuf>,
    /// Print the report as JSON instead of text
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bucket: String,
    pub region: String,
    pub year: i32,
    pub month: u32,
    pub data_dir: PathBuf,
    /// Also download `{year}/{month}/main.nc`
    pub fetch_main: bool,
    pub progress: bool,
    pub grid: GridNames,
    pub fields: Vec<FieldSpec>,
    pub bbox: BoundingBox,
    /// Keep the evaluated dataset in memory for the reductions and samples
    pub persist: bool,
    pub locations: Vec<Location>,
    pub missing_policy: MissingPolicy,
    /// Maximum distance in degrees between a location and its nearest cell
    pub sample_tolerance: Option<f64>,
    pub threads: Option<usize>,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket: "era5-pds".to_string(),
            region: "us-east-1".to_string(),
            year: 2008,
            month: 1,
            data_dir: PathBuf::from("."),
            fetch_main: false,
            progress: true,
            grid: GridNames::default(),
            fields: vec![
                FieldSpec {
                    source: "air_temperature_at_2_metres".to_string(),
                    name: "t2m".to_string(),
                    transform: Some(KELVIN_TO_CELSIUS),
                    units: Some(CELSIUS.to_string()),
                },
                FieldSpec {
                    source: "air_pressure_at_mean_sea_level".to_string(),
                    name: "msl".to_string(),
                    transform: Some(PASCAL_TO_HECTOPASCAL),
                    units: Some(HECTOPASCAL.to_string()),
                },
            ],
            bbox: BoundingBox::WESTERN_US,
            persist: true,
            locations: vec![
                Location::new("Santa Barbara", 34.4208, -119.6982),
                Location::new("Seattle", 47.6062, -122.3321),
                Location::new("Salt Lake City", 40.7608, -111.8910),
                Location::new("Las Vegas", 36.1699, -115.1398),
            ],
            missing_policy: MissingPolicy::Strict,
            sample_tolerance: None,
            threads: None,
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the optional file, then `RELENS_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("RELENS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Source variable names to download
    pub fn variables(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.source.clone()).collect()
    }
}
