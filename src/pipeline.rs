//! End-to-end run: fetch, assemble, transform, reduce, sample, report

use crate::acquisition::{local_file_name, month_pattern, BucketStore, Fetcher, MonthRef};
use crate::config::PipelineConfig;
use crate::dataset::Field;
use crate::errors::Result;
use crate::grid::Coordinate;
use crate::netcdf_io::{resolve_pattern, NetCDFWriter};
use crate::plan::{evaluate_all, DatasetSource, Plan, Reduction};
use crate::sampling::{sample_point, SampleTable};
use crate::statistics::{StatResult, Summary};
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Everything the pipeline computed
#[derive(Debug)]
pub struct Report {
    pub month: MonthRef,
    pub files: Vec<PathBuf>,
    /// Human-readable description of the evaluated dataset
    pub dataset_summary: String,
    /// Coordinates of the evaluated dataset, used when exporting reductions
    pub coords: Vec<Coordinate>,
    pub reductions: Vec<StatResult<f32>>,
    pub tables: Vec<SampleTable>,
}

impl Report {
    /// Per-field, per-location descriptive statistics
    pub fn summaries(&self) -> Vec<(String, Vec<(String, Summary)>)> {
        self.tables
            .iter()
            .map(|t| (t.field.clone(), t.describe()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let reductions: Vec<_> = self
            .reductions
            .iter()
            .map(|r| {
                let range = r.finite_range();
                json!({
                    "name": r.result_name(),
                    "field": r.variable_name,
                    "operation": r.operation,
                    "dims": r.remaining_dimensions,
                    "shape": r.shape(),
                    "units": r.units,
                    "min": range.map(|(lo, _)| lo),
                    "max": range.map(|(_, hi)| hi),
                })
            })
            .collect();

        let samples: serde_json::Map<String, serde_json::Value> = self
            .summaries()
            .into_iter()
            .map(|(field, per_location)| {
                let locations: serde_json::Map<String, serde_json::Value> = per_location
                    .into_iter()
                    .map(|(loc, summary)| (loc, json!(summary)))
                    .collect();
                (field, serde_json::Value::Object(locations))
            })
            .collect();

        json!({
            "month": self.month.to_string(),
            "files": self.files,
            "reductions": reductions,
            "samples": samples,
        })
    }

    /// Write the reductions to one NetCDF file
    pub fn write_netcdf(&self, path: &std::path::Path) -> Result<()> {
        let fields: Vec<Field> = self
            .reductions
            .iter()
            .map(|r| {
                let mut field = Field::new(
                    r.result_name(),
                    r.remaining_dimensions.clone(),
                    r.data.clone(),
                );
                if let Some(units) = &r.units {
                    field.attrs.insert("units".to_string(), units.clone());
                }
                field
            })
            .collect();
        NetCDFWriter::new(path).write(&self.coords, &fields)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n===== Dataset ({}) =====", self.month)?;
        write!(f, "{}", self.dataset_summary)?;

        writeln!(f, "\n===== Reductions =====")?;
        for r in &self.reductions {
            let units = r.units.as_deref().unwrap_or("");
            match r.finite_range() {
                Some((lo, hi)) => writeln!(
                    f,
                    "- {} {:?}: {lo:.2} .. {hi:.2} {units}",
                    r.result_name(),
                    r.shape()
                )?,
                None => writeln!(f, "- {} {:?}: no finite values", r.result_name(), r.shape())?,
            }
        }

        for (field, per_location) in self.summaries() {
            writeln!(f, "\n===== Samples: {field} =====")?;
            for (loc, summary) in per_location {
                writeln!(f, " {loc}")?;
                writeln!(f, "{summary}")?;
            }
        }
        Ok(())
    }
}

/// Download the configured month, skipping files already on disk
pub async fn fetch(cfg: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let month = MonthRef::new(cfg.year, cfg.month)?;
    let store = BucketStore::anonymous_s3(&cfg.bucket, &cfg.region)?;
    let fetcher = Fetcher::new(store, &cfg.data_dir).with_progress(cfg.progress);
    info!(bucket = %cfg.bucket, %month, "fetching");
    fetcher
        .fetch_month(&month, &cfg.variables(), cfg.fetch_main)
        .await
}

/// Every downloaded variable file of the month, excluding the main file
pub fn assembled_files(cfg: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let month = MonthRef::new(cfg.year, cfg.month)?;
    let pattern = cfg.data_dir.join(month_pattern(&month));
    let main = local_file_name(&month, "main");
    let mut files = resolve_pattern(&pattern.to_string_lossy())?;
    files.retain(|p| p.file_name().map_or(true, |n| n != main.as_str()));
    Ok(files)
}

/// Record the configured renames, selection and unit conversions
pub fn build_plan(cfg: &PipelineConfig, files: Vec<PathBuf>) -> Plan {
    let mut plan = Plan::from_files(files).with_missing_policy(cfg.missing_policy);
    for spec in &cfg.fields {
        if spec.source != spec.name {
            plan = plan.rename_field(&spec.source, &spec.name);
        }
    }
    plan = plan.select_box(&cfg.bbox, &cfg.grid);
    for spec in &cfg.fields {
        if let Some(transform) = spec.transform {
            let units = spec.units.as_deref().unwrap_or("");
            plan = plan.rescale(&spec.name, transform, units);
        }
    }
    plan
}

/// Reductions over time and point samples for every configured field
pub fn analyze(cfg: &PipelineConfig, plan: &Plan) -> Result<Report> {
    let month = MonthRef::new(cfg.year, cfg.month)?;
    let source: Box<dyn DatasetSource> = if cfg.persist {
        Box::new(plan.persist()?)
    } else {
        Box::new(plan.clone())
    };

    let reductions: Vec<Reduction> = cfg
        .fields
        .iter()
        .flat_map(|spec| {
            [
                Reduction::mean(&spec.name, &cfg.grid.time),
                Reduction::std(&spec.name, &cfg.grid.time),
            ]
        })
        .collect();
    let results = evaluate_all(source.as_ref(), &reductions)?;

    let ds = source.materialize()?;
    let mut tables = Vec::with_capacity(cfg.fields.len());
    for spec in &cfg.fields {
        let series = cfg
            .locations
            .iter()
            .map(|loc| sample_point(&ds, &spec.name, loc, &cfg.grid, cfg.sample_tolerance))
            .collect::<Result<Vec<_>>>()?;
        if !series.is_empty() {
            tables.push(SampleTable::from_series(series)?);
        }
    }

    info!(loads = plan.load_count(), "analysis complete");

    Ok(Report {
        month,
        files: plan.files().to_vec(),
        dataset_summary: ds.to_string(),
        coords: ds.coords().to_vec(),
        reductions: results,
        tables,
    })
}

/// Write the configured outputs of a report
pub fn write_outputs(cfg: &PipelineConfig, report: &Report) -> Result<()> {
    if let Some(path) = &cfg.output.netcdf {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        report.write_netcdf(path)?;
        println!("✅ Saved reductions to {}", path.display());
    }
    if let Some(dir) = &cfg.output.csv_dir {
        std::fs::create_dir_all(dir)?;
        for table in &report.tables {
            let path = dir.join(format!("{}_samples.csv", table.field));
            table.write_csv(&path)?;
            println!("✅ Saved samples to {}", path.display());
        }
    }
    Ok(())
}

/// Fetch, assemble and analyze the configured month
pub async fn run(cfg: &PipelineConfig) -> Result<Report> {
    fetch(cfg).await?;
    let files = assembled_files(cfg)?;
    let plan = build_plan(cfg, files);
    let report = analyze(cfg, &plan)?;
    write_outputs(cfg, &report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Operation;

    #[test]
    fn plan_renames_before_selecting_and_rescaling() {
        let cfg = PipelineConfig::default();
        let plan = build_plan(&cfg, vec![]);
        let ops = plan.operations();
        assert_eq!(ops.len(), 6);
        assert!(matches!(&ops[0], Operation::RenameField { to, .. } if to == "t2m"));
        assert!(matches!(&ops[2], Operation::SelectRange { dim, .. } if dim == "lat"));
        assert!(matches!(&ops[5], Operation::Rescale { field, units, .. } if field == "msl" && units == "hPa"));
    }
}
