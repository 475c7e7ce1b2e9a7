//! Deferred computation: describe a pipeline first, evaluate it later
//!
//! A [`Plan`] records the source files and an ordered list of [`Operation`]s.
//! Building a plan does no I/O beyond resolving the file pattern; nothing is read
//! until [`Plan::evaluate`]. [`Plan::persist`] evaluates once and hands back a
//! [`Persisted`] cache handle that every downstream [`Reduction`] can share.

use crate::dataset::{Dataset, MissingPolicy};
use crate::errors::{Result, ReLensError};
use crate::grid::{BoundingBox, GridNames};
use crate::netcdf_io::{open_dataset, resolve_pattern, Selection};
use crate::statistics::{reduce_field, StatOperation, StatResult};
use crate::units::LinearTransform;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One recorded step of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Inclusive label slice along a dimension
    SelectRange { dim: String, start: f64, stop: f64 },
    /// Linear rewrite of a field's values plus a new `units` label
    Rescale {
        field: String,
        transform: LinearTransform,
        units: String,
    },
    RenameField { from: String, to: String },
    DropField { name: String },
    RenameDimension { from: String, to: String },
}

impl Operation {
    fn apply(&self, ds: &mut Dataset, policy: MissingPolicy) -> Result<()> {
        match self {
            Self::SelectRange { dim, start, stop } => ds.select_range(dim, *start, *stop),
            Self::Rescale {
                field,
                transform,
                units,
            } => ds.apply_transform(field, transform, units),
            Self::RenameField { from, to } => ds.rename_field(from, to, policy),
            Self::DropField { name } => ds.drop_field(name, policy).map(|_| ()),
            Self::RenameDimension { from, to } => ds.rename_dimension(from, to),
        }
    }
}

/// Anything that can hand out an evaluated dataset
pub trait DatasetSource {
    /// Produce the dataset, computing it if necessary
    fn materialize(&self) -> Result<Arc<Dataset>>;
}

/// A lazily evaluated dataset: source files plus recorded operations
#[derive(Debug, Clone)]
pub struct Plan {
    files: Vec<PathBuf>,
    operations: Vec<Operation>,
    missing: MissingPolicy,
    loads: Arc<AtomicUsize>,
}

impl Plan {
    /// Plan over every file matching `pattern` (e.g. `data/200801_*.nc`)
    pub fn open(pattern: &str) -> Result<Self> {
        Ok(Self::from_files(resolve_pattern(pattern)?))
    }

    /// Plan over an explicit list of files
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            operations: Vec::new(),
            missing: MissingPolicy::default(),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How renames and drops treat names that are not in the dataset
    #[must_use]
    pub fn with_missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing = policy;
        self
    }

    #[must_use]
    pub fn select_range(mut self, dim: &str, start: f64, stop: f64) -> Self {
        self.operations.push(Operation::SelectRange {
            dim: dim.to_string(),
            start,
            stop,
        });
        self
    }

    /// Latitude then longitude selection
    #[must_use]
    pub fn select_box(self, bbox: &BoundingBox, names: &GridNames) -> Self {
        self.select_range(&names.lat, bbox.lat.0, bbox.lat.1)
            .select_range(&names.lon, bbox.lon.0, bbox.lon.1)
    }

    #[must_use]
    pub fn rescale(mut self, field: &str, transform: LinearTransform, units: &str) -> Self {
        self.operations.push(Operation::Rescale {
            field: field.to_string(),
            transform,
            units: units.to_string(),
        });
        self
    }

    #[must_use]
    pub fn rename_field(mut self, from: &str, to: &str) -> Self {
        self.operations.push(Operation::RenameField {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    #[must_use]
    pub fn drop_field(mut self, name: &str) -> Self {
        self.operations.push(Operation::DropField {
            name: name.to_string(),
        });
        self
    }

    #[must_use]
    pub fn rename_dimension(mut self, from: &str, to: &str) -> Self {
        self.operations.push(Operation::RenameDimension {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The recorded operations, in execution order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of times this plan (or a clone of it) has read its files
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Split off the selections that can be applied while reading.
    ///
    /// A `SelectRange` qualifies when no dimension rename precedes it and it is
    /// the first selection on its dimension. Other operations commute with it.
    fn pushdown(&self) -> (Selection, BTreeSet<usize>) {
        let mut selection = Selection::new();
        let mut pushed = BTreeSet::new();
        for (i, op) in self.operations.iter().enumerate() {
            match op {
                Operation::RenameDimension { .. } => break,
                Operation::SelectRange { dim, start, stop } if !selection.contains_key(dim) => {
                    selection.insert(dim.clone(), (*start, *stop));
                    pushed.insert(i);
                }
                _ => {}
            }
        }
        (selection, pushed)
    }

    /// Read the files and run every recorded operation
    pub fn evaluate(&self) -> Result<Dataset> {
        let started = Instant::now();
        let (selection, pushed) = self.pushdown();
        debug!(?selection, "evaluating plan");

        let mut ds = open_dataset(&self.files, &selection)?;
        self.loads.fetch_add(1, Ordering::SeqCst);

        for dim in selection.keys() {
            if ds.coord(dim).is_err() {
                return Err(ReLensError::CoordinateNotFound { name: dim.clone() });
            }
        }

        for (i, op) in self.operations.iter().enumerate() {
            if !pushed.contains(&i) {
                op.apply(&mut ds, self.missing)?;
            }
        }

        info!(
            files = self.files.len(),
            operations = self.operations.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "plan evaluated"
        );
        Ok(ds)
    }

    /// Evaluate once and keep the result for reuse
    pub fn persist(&self) -> Result<Persisted> {
        let ds = self.evaluate()?;
        info!("dataset persisted in memory");
        Ok(Persisted::new(ds))
    }
}

impl DatasetSource for Plan {
    fn materialize(&self) -> Result<Arc<Dataset>> {
        self.evaluate().map(Arc::new)
    }
}

/// Cache handle for an evaluated dataset.
///
/// Clones share the same data; it is released when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Persisted {
    dataset: Arc<Dataset>,
}

impl Persisted {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Number of live handles sharing this dataset
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.dataset)
    }
}

impl DatasetSource for Persisted {
    fn materialize(&self) -> Result<Arc<Dataset>> {
        Ok(Arc::clone(&self.dataset))
    }
}

/// A deferred reduction of one field over one dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub field: String,
    pub dim: String,
    pub operation: StatOperation,
}

impl Reduction {
    pub fn new(field: &str, dim: &str, operation: StatOperation) -> Self {
        Self {
            field: field.to_string(),
            dim: dim.to_string(),
            operation,
        }
    }

    pub fn mean(field: &str, dim: &str) -> Self {
        Self::new(field, dim, StatOperation::Mean)
    }

    pub fn std(field: &str, dim: &str) -> Self {
        Self::new(field, dim, StatOperation::Std)
    }

    /// Materialize `source` and run the reduction
    pub fn evaluate<S: DatasetSource + ?Sized>(&self, source: &S) -> Result<StatResult<f32>> {
        let ds = source.materialize()?;
        reduce_field(&ds, &self.field, &self.dim, self.operation)
    }
}

/// Run several reductions against a single materialization of `source`
pub fn evaluate_all<S: DatasetSource + ?Sized>(
    source: &S,
    reductions: &[Reduction],
) -> Result<Vec<StatResult<f32>>> {
    let ds = source.materialize()?;
    reductions
        .iter()
        .map(|r| reduce_field(&ds, &r.field, &r.dim, r.operation))
        .collect()
}
