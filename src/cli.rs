//! Defines command-line interface options using `clap` for the ReLens application.

use crate::config::PipelineConfig;
use crate::grid::BoundingBox;
use crate::sampling::Location;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// A CLI tool for fetching and summarizing ERA5 reanalysis months
#[derive(Parser, Debug)]
#[command(
    version,
    name = "relens",
    about = "Fetch, subset and summarize ERA5 reanalysis NetCDF files"
)]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the configured month unless the files are already present
    Fetch(MonthArgs),
    /// Fetch, assemble, reduce and sample the configured month
    Run(RunArgs),
    /// Print the coordinates and fields of NetCDF files
    Inspect {
        /// File path or glob pattern, e.g. `data/200801_*.nc`
        pattern: String,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct MonthArgs {
    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub month: Option<u32>,

    /// Directory holding the downloaded files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Also download the month's main.nc
    #[arg(long)]
    pub main: bool,

    /// Hide download progress bars
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub month: MonthArgs,

    /// Bounding box, formatted as <lat_start>:<lat_stop>:<lon_start>:<lon_stop>
    #[arg(long, allow_hyphen_values = true, value_parser = parse_bbox_arg)]
    pub bbox: Option<BoundingBox>,

    /// Sample location, formatted as <name>:<lat>:<lon>. Repeat for several.
    #[arg(long = "location", value_parser = parse_location_arg)]
    pub locations: Vec<Location>,

    /// Re-read the files for every consumer instead of caching the evaluated dataset
    #[arg(long)]
    pub no_persist: bool,

    /// Path to save the mean/std maps as NetCDF.
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Directory to save one CSV of samples per field.
    #[arg(long)]
    pub output_csv: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl MonthArgs {
    /// Apply the flags that were given on top of `cfg`
    pub fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(year) = self.year {
            cfg.year = year;
        }
        if let Some(month) = self.month {
            cfg.month = month;
        }
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        if self.main {
            cfg.fetch_main = true;
        }
        if self.no_progress {
            cfg.progress = false;
        }
    }
}

impl RunArgs {
    pub fn apply(&self, cfg: &mut PipelineConfig) {
        self.month.apply(cfg);
        if let Some(bbox) = self.bbox {
            cfg.bbox = bbox;
        }
        if !self.locations.is_empty() {
            cfg.locations = self.locations.clone();
        }
        if self.no_persist {
            cfg.persist = false;
        }
        if let Some(path) = &self.output_netcdf {
            cfg.output.netcdf = Some(path.clone());
        }
        if let Some(dir) = &self.output_csv {
            cfg.output.csv_dir = Some(dir.clone());
        }
        if self.json {
            cfg.output.json = true;
        }
    }
}

fn parse_f64(s: &str, what: &str) -> Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid {what}: '{s}'"))
}

fn parse_bbox_arg(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [lat0, lat1, lon0, lon1] => Ok(BoundingBox {
            lat: (parse_f64(lat0, "latitude")?, parse_f64(lat1, "latitude")?),
            lon: (parse_f64(lon0, "longitude")?, parse_f64(lon1, "longitude")?),
        }),
        _ => Err(
            "Invalid format: Expected '<lat_start>:<lat_stop>:<lon_start>:<lon_stop>'.".to_string(),
        ),
    }
}

fn parse_location_arg(s: &str) -> Result<Location, String> {
    // Split from the right so names may contain ':'
    let mut parts = s.rsplitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lon), Some(lat), Some(name)) if !name.is_empty() => Ok(Location::new(
            name,
            parse_f64(lat, "latitude")?,
            parse_f64(lon, "longitude")?,
        )),
        _ => Err("Invalid format: Expected '<name>:<lat>:<lon>'.".to_string()),
    }
}
