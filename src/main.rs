//! Entry point for the ReLens application.
//! Handles CLI parsing, configuration layering, and dispatches fetch, run and inspect.

use clap::Parser;
use re_lens::cli::{Args, Command};
use re_lens::config::PipelineConfig;
use re_lens::netcdf_io::{open_dataset, resolve_pattern, Selection};
use re_lens::parallel::{pool_info, WorkerPool};
use re_lens::pipeline;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "re_lens=debug" } else { "re_lens=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut cfg = PipelineConfig::load(args.config.as_deref())?;
    if args.threads.is_some() {
        cfg.threads = args.threads;
    }

    WorkerPool::new(cfg.threads).setup_global_pool()?;
    if args.verbose {
        println!("Using {}", pool_info());
    }

    match args.command {
        Command::Fetch(month) => {
            month.apply(&mut cfg);
            let paths = pipeline::fetch(&cfg).await?;
            for path in paths {
                println!("✅ {}", path.display());
            }
        }
        Command::Run(run) => {
            run.apply(&mut cfg);
            let report = pipeline::run(&cfg).await?;
            if cfg.output.json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                println!("{report}");
            }
        }
        Command::Inspect { pattern } => {
            let files = resolve_pattern(&pattern)?;
            for file in &files {
                println!("Successfully opened NetCDF file: {}", file.display());
            }
            let ds = open_dataset(&files, &Selection::new())?;
            println!("{ds}");
        }
    }

    Ok(())
}
