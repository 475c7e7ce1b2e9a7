//! Centralized error handling for ReLens
//!
//! Every stage (fetch, assembly, evaluation, reporting) reports failures through
//! [`ReLensError`]. Nothing is retried: errors propagate with `?` up to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ReLens operations
#[derive(Error, Debug)]
pub enum ReLensError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// Object storage transfer errors
    #[error("Object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// Tabular conversion errors
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Malformed file pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Unreadable path while expanding a file pattern
    #[error("Glob error: {0}")]
    Glob(#[from] glob::GlobError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Variable or field not found in a file or dataset
    #[error("Variable '{var}' not found")]
    VariableNotFound { var: String },

    /// Dimension not found in variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// Coordinate not present in the dataset
    #[error("Coordinate '{name}' not found in dataset")]
    CoordinateNotFound { name: String },

    /// Month outside 1..=12
    #[error("Invalid month {month}: expected a value between 1 and 12")]
    InvalidMonth { month: u32 },

    /// A file pattern matched nothing
    #[error("No files matched pattern '{pattern}' in {}", dir.display())]
    NoFilesMatched { pattern: String, dir: PathBuf },

    /// Files or fields whose coordinates disagree
    #[error("Incompatible coordinate '{name}': {message}")]
    IncompatibleCoordinates { name: String, message: String },

    /// A field with the same name already exists
    #[error("Field '{name}' is already present in the dataset")]
    DuplicateField { name: String },

    /// Selection or lookup over an empty coordinate
    #[error("Empty selection on dimension '{dim}'")]
    EmptySelection { dim: String },

    /// Nearest grid cell is further away than the allowed tolerance
    #[error("Location '{location}' is {distance:.3} from the nearest '{dim}' cell (tolerance {tolerance})")]
    OutsideGrid {
        location: String,
        dim: String,
        distance: f64,
        tolerance: f64,
    },

    /// Unparseable CF time units
    #[error("Invalid time units '{units}'")]
    InvalidTimeUnits { units: String },

    /// Statistics computation errors
    #[error("Statistics computation error: {0}")]
    Statistics(String),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Result type alias for ReLens operations
pub type Result<T> = std::result::Result<T, ReLensError>;
