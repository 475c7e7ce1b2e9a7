//! Conditional download of monthly reanalysis files from object storage
//!
//! Remote objects live under `{year}/{month}/data/{variable}.nc` (and
//! `{year}/{month}/main.nc`). Each is copied to `{year}{month}_{variable}.nc` in
//! the data directory unless a file of that name already exists. The presence
//! check is the only cache validation: no size or checksum comparison, no retry.

use crate::errors::{Result, ReLensError};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A calendar month of data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRef {
    year: i32,
    month: u32,
}

impl MonthRef {
    /// Validated constructor; `month` must be 1..=12
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ReLensError::InvalidMonth { month });
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Zero-padded month, e.g. `01`
    pub fn month_str(&self) -> String {
        format!("{:02}", self.month)
    }

    /// Local file prefix, e.g. `200801`
    pub fn prefix(&self) -> String {
        format!("{}{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Builders for keys inside the bucket
pub struct ObjectKey;

impl ObjectKey {
    /// `{year}/{month}/data/{variable}.nc`
    pub fn variable(month: &MonthRef, variable: &str) -> String {
        format!("{}/{}/data/{variable}.nc", month.year, month.month_str())
    }

    /// `{year}/{month}/main.nc`
    pub fn main(month: &MonthRef) -> String {
        format!("{}/{}/main.nc", month.year, month.month_str())
    }
}

/// `{year}{month}_{variable}.nc`
pub fn local_file_name(month: &MonthRef, variable: &str) -> String {
    format!("{}_{variable}.nc", month.prefix())
}

/// Glob pattern matching every local file of a month
pub fn month_pattern(month: &MonthRef) -> String {
    format!("{}_*.nc", month.prefix())
}

/// Source of remote objects
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Copy the object at `key` to `dest`, returning the number of bytes written
    async fn download(&self, key: &str, dest: &Path, progress: Option<&ProgressBar>) -> Result<u64>;
}

/// [`RemoteStore`] backed by any `object_store` implementation
#[derive(Debug, Clone)]
pub struct BucketStore {
    store: Arc<dyn ObjectStore>,
}

impl BucketStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Unsigned (anonymous) client for a public S3 bucket
    pub fn anonymous_s3(bucket: &str, region: &str) -> Result<Self> {
        let s3 = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(region)
            .with_skip_signature(true)
            .build()?;
        Ok(Self::new(Arc::new(s3)))
    }
}

#[async_trait]
impl RemoteStore for BucketStore {
    async fn download(&self, key: &str, dest: &Path, progress: Option<&ProgressBar>) -> Result<u64> {
        let location = ObjectPath::from(key);
        let result = self.store.get(&location).await?;
        let total_size = result.meta.size as u64;

        if let Some(pb) = progress {
            pb.set_length(total_size);
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut downloaded = 0_u64;
        let mut stream = result.into_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(pb) = progress {
                pb.set_position(downloaded);
            }
        }
        file.flush().await?;

        Ok(downloaded)
    }
}

/// What a fetch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A file with the target name already existed
    Skipped,
    Downloaded { bytes: u64 },
}

/// Downloads monthly files into a local directory, skipping files already present
pub struct Fetcher<S> {
    store: S,
    dir: PathBuf,
    show_progress: bool,
}

impl<S: RemoteStore> Fetcher<S> {
    pub fn new(store: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
            show_progress: false,
        }
    }

    /// Show a progress bar per transfer
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Copy `key` to `local_path` unless `local_path` already exists.
    ///
    /// The transfer goes to a `.part` sibling renamed into place on success, so
    /// an interrupted transfer never leaves a file that a re-run would skip.
    pub async fn fetch_if_missing(&self, key: &str, local_path: &Path) -> Result<FetchOutcome> {
        if local_path.exists() {
            debug!(path = %local_path.display(), "already present, not downloading");
            return Ok(FetchOutcome::Skipped);
        }

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut partial = local_path.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        info!(key, path = %local_path.display(), "downloading");
        let progress = self.show_progress.then(|| progress_bar(key));
        let bytes = match self.store.download(key, &partial, progress.as_ref()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Some(pb) = &progress {
                    pb.abandon_with_message(format!("failed {key}"));
                }
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, local_path).await?;

        if let Some(pb) = progress {
            pb.finish_with_message(format!("✓ {key}"));
        }
        info!(key, bytes, "download complete");
        Ok(FetchOutcome::Downloaded { bytes })
    }

    /// Fetch every requested variable of a month, one after another.
    ///
    /// Returns the local paths in request order, with the main file last when
    /// `include_main` is set.
    pub async fn fetch_month(
        &self,
        month: &MonthRef,
        variables: &[String],
        include_main: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut targets: Vec<(String, PathBuf)> = variables
            .iter()
            .map(|var| {
                (
                    ObjectKey::variable(month, var),
                    self.dir.join(local_file_name(month, var)),
                )
            })
            .collect();
        if include_main {
            targets.push((ObjectKey::main(month), self.dir.join(local_file_name(month, "main"))));
        }

        let mut paths = Vec::with_capacity(targets.len());
        for (key, path) in targets {
            self.fetch_if_missing(&key, &path).await?;
            paths.push(path);
        }
        Ok(paths)
    }
}

fn progress_bar(key: &str) -> ProgressBar {
    let pb = ProgressBar::new(0).with_message(key.to_string());
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_local_names() {
        let month = MonthRef::new(2008, 1).unwrap();
        assert_eq!(
            ObjectKey::variable(&month, "air_temperature_at_2_metres"),
            "2008/01/data/air_temperature_at_2_metres.nc"
        );
        assert_eq!(ObjectKey::main(&month), "2008/01/main.nc");
        assert_eq!(
            local_file_name(&month, "air_pressure_at_mean_sea_level"),
            "200801_air_pressure_at_mean_sea_level.nc"
        );
        assert_eq!(month_pattern(&month), "200801_*.nc");
        assert_eq!(month.to_string(), "2008-01");
    }

    #[test]
    fn month_is_validated() {
        assert!(matches!(
            MonthRef::new(2008, 13),
            Err(ReLensError::InvalidMonth { month: 13 })
        ));
        assert!(MonthRef::new(2008, 0).is_err());
        assert!(MonthRef::new(2008, 12).is_ok());
    }

    #[test]
    fn present_file_is_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("200801_main.nc");
        std::fs::write(&local, b"x").unwrap();

        // An empty store fails any request
        let store = BucketStore::new(Arc::new(object_store::memory::InMemory::new()));
        let fetcher = Fetcher::new(store, dir.path());
        let outcome =
            tokio_test::block_on(fetcher.fetch_if_missing("2008/01/main.nc", &local)).unwrap();
        assert_eq!(outcome, FetchOutcome::Skipped);
    }
}
