//! ReLens: monthly ERA5 reanalysis retrieval and summary
//!
//! ReLens downloads a month of ERA5 surface fields from the public `era5-pds`
//! bucket, assembles the per-variable NetCDF files into one dataset, cuts a
//! geographic box out of it, converts units, reduces over time and samples the
//! series at named locations.
//!
//! ## Key Features
//!
//! - **Conditional Fetch**: Files already present locally are never re-downloaded
//! - **Deferred Evaluation**: Selections and conversions are recorded in a [`plan::Plan`]
//!   and only run on evaluation, with label selections pushed into the NetCDF reads
//! - **Parallel Processing**: Reductions and conversions use Rayon
//! - **Point Sampling**: Nearest grid cell with 0–360° longitude normalization
//! - **Tabular Output**: Arrow record batches, CSV and descriptive statistics
//!
//! ## Module Organization
//!
//! - [`acquisition`]: Object-store download with skip-if-present semantics
//! - [`netcdf_io`]: Reading, assembling and writing NetCDF files
//! - [`dataset`]: In-memory labelled fields and their coordinates
//! - [`grid`]: Coordinates, bounding boxes, longitude and time conventions
//! - [`units`]: Linear unit conversions
//! - [`plan`]: Deferred operations, persistence and reductions
//! - [`statistics`]: Parallel reductions and descriptive summaries
//! - [`sampling`]: Nearest-neighbour point series and sample tables
//! - [`pipeline`]: The end-to-end run
//! - [`config`]: Layered configuration
//! - [`parallel`]: Worker pool sizing
//! - [`errors`]: Centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use re_lens::prelude::*;
//!
//! let plan = Plan::open("data/200801_*.nc")
//!     .unwrap()
//!     .rename_field("air_temperature_at_2_metres", "t2m")
//!     .select_box(&BoundingBox::WESTERN_US, &GridNames::default())
//!     .rescale("t2m", KELVIN_TO_CELSIUS, "C");
//!
//! let cached = plan.persist().unwrap();
//! let mean = Reduction::mean("t2m", "time0").evaluate(&cached).unwrap();
//! println!("{:?}", mean.finite_range());
//! ```

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod grid;
pub mod netcdf_io;
pub mod parallel;
pub mod pipeline;
pub mod plan;
pub mod sampling;
pub mod statistics;
pub mod units;

pub use errors::{ReLensError, Result};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::acquisition::{BucketStore, FetchOutcome, Fetcher, MonthRef, RemoteStore};
    pub use crate::config::PipelineConfig;
    pub use crate::dataset::{Dataset, Field, MissingPolicy};
    pub use crate::errors::{ReLensError, Result};
    pub use crate::grid::{normalize_longitude, BoundingBox, Coordinate, GridNames};
    pub use crate::netcdf_io::NetCDFWriter;
    pub use crate::parallel::WorkerPool;
    pub use crate::plan::{DatasetSource, Persisted, Plan, Reduction};
    pub use crate::sampling::{sample_point, Location, SampleTable};
    pub use crate::statistics::{StatOperation, StatResult, Summary};
    pub use crate::units::{LinearTransform, KELVIN_TO_CELSIUS, PASCAL_TO_HECTOPASCAL};
}
