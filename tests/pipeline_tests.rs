mod common;

use common::{write_month, PRESSURE, TEMPERATURE};
use re_lens::config::PipelineConfig;
use re_lens::dataset::MissingPolicy;
use re_lens::errors::ReLensError;
use re_lens::grid::{BoundingBox, GridNames};
use re_lens::netcdf_io::{read_file, Selection};
use re_lens::pipeline;
use re_lens::plan::{evaluate_all, DatasetSource, Plan, Reduction};
use re_lens::units::{KELVIN_TO_CELSIUS, PASCAL_TO_HECTOPASCAL};
use std::path::Path;
use tempfile::tempdir;

fn western_us_plan(dir: &Path) -> Plan {
    let pattern = dir.join("200801_*.nc");
    Plan::open(pattern.to_str().unwrap())
        .expect("Failed to resolve files")
        .rename_field(TEMPERATURE, "t2m")
        .rename_field(PRESSURE, "msl")
        .select_box(&BoundingBox::WESTERN_US, &GridNames::default())
        .rescale("t2m", KELVIN_TO_CELSIUS, "C")
        .rescale("msl", PASCAL_TO_HECTOPASCAL, "hPa")
}

fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        data_dir: dir.to_path_buf(),
        progress: false,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_assembled_box_is_converted_and_inside_bounds() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_month(temp_dir.path());

    let ds = western_us_plan(temp_dir.path()).evaluate().unwrap();

    let lat = ds.coord("lat").unwrap();
    assert_eq!(lat.values, vec![50.0, 45.0, 40.0, 35.0, 30.0]);
    let lon = ds.coord("lon").unwrap();
    assert_eq!(lon.len(), 8);
    assert!(lon.values.iter().all(|&x| (220.0..=255.0).contains(&x)));

    assert_eq!(ds.field_names(), vec!["msl", "t2m"]);

    let t2m = ds.field("t2m").unwrap();
    assert_eq!(t2m.data.shape(), &[4, 5, 8]);
    assert_eq!(t2m.units(), Some("C"));
    assert!(t2m.data.iter().all(|&v| (-40.0..=50.0).contains(&v)));

    let msl = ds.field("msl").unwrap();
    assert_eq!(msl.units(), Some("hPa"));
    assert!(msl.data.iter().all(|&v| (900.0..=1080.0).contains(&v)));
}

#[test]
fn test_selection_read_matches_in_memory_selection() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let files = write_month(temp_dir.path());

    // A leading selection is applied while reading
    let pushed = Plan::from_files(files.clone())
        .select_range("lat", 45.0, 35.0)
        .evaluate()
        .unwrap();

    // After a dimension rename the same selection runs on the full grid in memory
    let in_memory = Plan::from_files(files)
        .rename_dimension("lat", "latitude")
        .select_range("latitude", 45.0, 35.0)
        .evaluate()
        .unwrap();

    assert_eq!(
        pushed.coord("lat").unwrap().values,
        in_memory.coord("latitude").unwrap().values
    );
    assert_eq!(
        pushed.field(TEMPERATURE).unwrap().data,
        in_memory.field(TEMPERATURE).unwrap().data
    );
}

#[test]
fn test_reversed_bounds_select_nothing() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let files = write_month(temp_dir.path());

    let ds = Plan::from_files(files)
        .select_range("lat", 30.0, 50.0)
        .evaluate()
        .unwrap();
    assert!(ds.coord("lat").unwrap().is_empty());
    assert_eq!(ds.field(PRESSURE).unwrap().data.len(), 0);
}

#[test]
fn test_persisted_plan_reads_files_once() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_month(temp_dir.path());

    let plan = western_us_plan(temp_dir.path());
    let cached = plan.persist().unwrap();
    for reduction in [Reduction::mean("t2m", "time0"), Reduction::std("msl", "time0")] {
        reduction.evaluate(&cached).unwrap();
    }
    cached.materialize().unwrap();
    assert_eq!(plan.load_count(), 1);

    let uncached = western_us_plan(temp_dir.path());
    Reduction::mean("t2m", "time0").evaluate(&uncached).unwrap();
    Reduction::std("t2m", "time0").evaluate(&uncached).unwrap();
    assert_eq!(uncached.load_count(), 2);
}

#[test]
fn test_time_reductions() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_month(temp_dir.path());

    let cached = western_us_plan(temp_dir.path()).persist().unwrap();
    let results = evaluate_all(
        &cached,
        &[
            Reduction::mean("t2m", "time0"),
            Reduction::std("t2m", "time0"),
            Reduction::mean("msl", "time0"),
        ],
    )
    .unwrap();

    let mean = &results[0];
    assert_eq!(mean.result_name(), "t2m_mean_over_time0");
    assert_eq!(mean.remaining_dimensions, vec!["lat", "lon"]);
    assert_eq!(mean.shape(), &[5, 8]);
    assert_eq!(mean.units.as_deref(), Some("C"));
    // 285 K + 1.5 at 50N, 295 K + 1.5 at 30N
    let (lo, hi) = mean.finite_range().unwrap();
    assert!((lo - 13.35).abs() < 1e-3, "lo = {lo}");
    assert!((hi - 23.35).abs() < 1e-3, "hi = {hi}");

    // Four hourly steps of +1 K: population std is sqrt(1.25)
    let std = &results[1];
    assert!(std.data.iter().all(|&v| (v - 1.25_f32.sqrt()).abs() < 1e-3));

    let (lo, hi) = results[2].finite_range().unwrap();
    assert!((lo - 1004.15).abs() < 1e-2, "lo = {lo}");
    assert!((hi - 1011.15).abs() < 1e-2, "hi = {hi}");
}

#[test]
fn test_missing_field_policy() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let files = write_month(temp_dir.path());

    let strict = Plan::from_files(files.clone()).rename_field("total_precipitation", "tp");
    assert!(matches!(
        strict.evaluate(),
        Err(ReLensError::VariableNotFound { .. })
    ));

    let lenient = Plan::from_files(files)
        .with_missing_policy(MissingPolicy::Skip)
        .rename_field("total_precipitation", "tp")
        .drop_field("total_precipitation");
    let ds = lenient.evaluate().unwrap();
    assert!(!ds.has_field("tp"));
    assert!(ds.has_field(TEMPERATURE));
}

#[test]
fn test_analysis_samples_every_location() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_month(temp_dir.path());
    // The main file is fetched alongside but never assembled
    std::fs::write(temp_dir.path().join("200801_main.nc"), b"not netcdf").unwrap();

    let cfg = test_config(temp_dir.path());
    let files = pipeline::assembled_files(&cfg).unwrap();
    assert_eq!(files.len(), 2);

    let plan = pipeline::build_plan(&cfg, files);
    let report = pipeline::analyze(&cfg, &plan).unwrap();
    assert_eq!(plan.load_count(), 1);

    assert_eq!(report.reductions.len(), 4);
    assert_eq!(report.tables.len(), 2);

    let t2m = &report.tables[0];
    assert_eq!(t2m.field, "t2m");
    assert_eq!(t2m.num_rows(), 4);
    assert_eq!(t2m.columns.len(), cfg.locations.len());
    assert_eq!(t2m.columns[0].0, "Santa Barbara");
    let first = t2m.timestamps.as_ref().unwrap()[0];
    assert_eq!(first.to_string(), "2008-01-01 00:00:00");

    // Santa Barbara (34.42N, 119.70W) snaps to 35N, 240E: 292.5 K at t = 0
    let santa_barbara = &t2m.columns[0].1;
    assert!((santa_barbara[0] - 19.35).abs() < 1e-3);

    for (field, per_location) in report.summaries() {
        for (location, summary) in per_location {
            assert_eq!(summary.count, 4, "{field} at {location}");
        }
    }

    let json = report.to_json();
    assert_eq!(json["month"], "2008-01");
    assert_eq!(json["reductions"].as_array().unwrap().len(), 4);
    assert!(json["samples"]["msl"]["Seattle"]["mean"].is_number());
}

#[test]
fn test_outputs_are_written() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_month(temp_dir.path());

    let mut cfg = test_config(temp_dir.path());
    cfg.persist = false;
    cfg.output.netcdf = Some(temp_dir.path().join("out").join("reductions.nc"));
    cfg.output.csv_dir = Some(temp_dir.path().join("out"));

    let plan = pipeline::build_plan(&cfg, pipeline::assembled_files(&cfg).unwrap());
    let report = pipeline::analyze(&cfg, &plan).unwrap();
    // Without persistence the reductions and the samples each read the files
    assert_eq!(plan.load_count(), 2);

    pipeline::write_outputs(&cfg, &report).unwrap();

    let written = read_file(cfg.output.netcdf.as_ref().unwrap(), &Selection::new()).unwrap();
    let mean = written.field("t2m_mean_over_time0").unwrap();
    assert_eq!(mean.dims, vec!["lat", "lon"]);
    assert_eq!(mean.data.shape(), &[5, 8]);
    assert_eq!(mean.units(), Some("C"));
    assert!(written.has_field("msl_std_over_time0"));
    assert_eq!(written.coord("lat").unwrap().values[0], 50.0);

    let csv = std::fs::read_to_string(temp_dir.path().join("out").join("t2m_samples.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("time0,Santa Barbara,Seattle"));
}

#[tokio::test]
async fn test_run_uses_files_already_present() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_month(temp_dir.path());

    let cfg = test_config(temp_dir.path());
    let report = pipeline::run(&cfg).await.unwrap();
    assert_eq!(report.files.len(), 2);
    assert!(report.to_string().contains("t2m_mean_over_time0"));
}
