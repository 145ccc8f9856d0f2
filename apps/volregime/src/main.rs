//! volregime CLI — volatility regime data pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Quality gate only: validate, repair, enhance, normalize
//! volregime quality --input data/raw/spy.csv
//!
//! # Label regimes on a processed table
//! volregime label --input data/processed/spy_processed.csv
//!
//! # Build the feature table from a processed table
//! volregime features --input data/processed/spy_processed.csv
//!
//! # Full pipeline with a run report
//! volregime run --input data/raw/spy.csv --out-dir runs/spy
//! ```
//!
//! ## Exit Codes
//! - 0: pipeline passed
//! - 1: a gating validation failed (no output written for the failing stage)
//! - 2: error (unreadable input, invalid config, unwritable output)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use volregime_core::io;
use volregime_features::{engineer_features, write_features_csv};
use volregime_gates::{run_quality_pipeline, QualityReport};
use volregime_labeler::{label_regimes, write_labeled_csv};

mod config;
mod report;

use config::{AppConfig, PathsConfig};
use report::{RunReport, StageSummary};

/// volregime: single-asset volatility regime data pipeline.
///
/// Turns a raw price/volume CSV into a validated processed table, a
/// regime-labeled table, and a supervised feature table.
#[derive(Parser)]
#[command(name = "volregime")]
#[command(version)]
#[command(about = "Volatility regime data pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (defaults apply when omitted)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the data-quality gate on a raw series
    Quality {
        /// Raw input CSV
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Output path (default: <processed_dir>/<stem>_processed.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Label volatility regimes on a processed table
    Label {
        /// Processed input CSV
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Output path (default: <processed_dir>/<stem>_labeled.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Build the feature table from a processed table
    Features {
        /// Processed input CSV
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Output path (default: <features_dir>/<stem>_features.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline: quality gate, labeling, features, report
    Run {
        /// Raw input CSV
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Put all outputs and the run report under this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    volregime_core::observability::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(passed) => {
            if passed {
                ExitCode::from(0)
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Quality { input, output } => cmd_quality(&config, &input, output),
        Commands::Label { input, output } => cmd_label(&config, &input, output),
        Commands::Features { input, output } => cmd_features(&config, &input, output),
        Commands::Run { input, out_dir } => cmd_run(&config, &input, out_dir),
    }
}

fn print_report(report: &QualityReport) {
    for check in &report.checks {
        println!(
            "[{}] {}",
            check.name,
            if check.passed { "PASS" } else { "FAIL" }
        );
        println!("  {}", check.message);
    }
    println!("\n{}", report.summary);
    println!(
        "Quality gate {}",
        if report.passed { "PASSED" } else { "FAILED" }
    );
}

fn cmd_quality(config: &AppConfig, input: &Path, output: Option<PathBuf>) -> Result<bool> {
    let output = output.unwrap_or_else(|| config.paths.processed_path(input));
    let outcome = run_quality_pipeline(input, &output, &config.quality)?;
    print_report(&outcome.report);
    if let Some(artifact) = &outcome.artifact {
        println!("\nProcessed table: {}", artifact.path.display());
    }
    Ok(outcome.passed)
}

fn cmd_label(config: &AppConfig, input: &Path, output: Option<PathBuf>) -> Result<bool> {
    let output = output.unwrap_or_else(|| config.paths.labeled_path(input));
    let loaded = io::read_table(input)?;
    let labeled = label_regimes(&loaded.table, &config.regime)?;
    let artifact = write_labeled_csv(&output, &labeled)?;

    for (name, count) in labeled.fit.names().iter().zip(labeled.occupancy()) {
        println!("[{name}] {count} rows");
    }
    println!("\nLabeled table: {}", artifact.path.display());
    Ok(true)
}

fn cmd_features(config: &AppConfig, input: &Path, output: Option<PathBuf>) -> Result<bool> {
    let output = output.unwrap_or_else(|| config.paths.features_path(input));
    let loaded = io::read_table(input)?;
    let features = engineer_features(&loaded.table)?;
    let artifact = write_features_csv(&output, &features)?;

    println!(
        "{} features, {} high-volatility days of {}",
        features.feature_count,
        features.high_count,
        features.table.len()
    );
    println!("\nFeature table: {}", artifact.path.display());
    Ok(true)
}

fn cmd_run(config: &AppConfig, input: &Path, out_dir: Option<PathBuf>) -> Result<bool> {
    let paths = match &out_dir {
        Some(dir) => PathsConfig::rooted(dir),
        None => config.paths.clone(),
    };
    let mut run_report = RunReport::new();
    info!(run_id = %run_report.run_id, input = %input.display(), "starting pipeline run");

    let processed_path = paths.processed_path(input);
    let outcome = run_quality_pipeline(input, &processed_path, &config.quality)?;
    run_report.push_stage(StageSummary {
        stage: "quality".to_string(),
        passed: outcome.passed,
        duration_ms: outcome.report.duration_ms,
        rows_in: outcome.rows_in,
        rows_out: outcome.rows_out,
        detail: Some(json!({
            "summary": outcome.report.summary,
            "failed_checks": outcome
                .report
                .failed_checks()
                .map(|c| c.name.clone())
                .collect::<Vec<_>>(),
        })),
    });
    if let Some(artifact) = &outcome.artifact {
        run_report.push_output(artifact);
    }

    if !outcome.passed {
        print_report(&outcome.report);
        run_report.finish(false);
        run_report.save(&paths.reports_dir)?;
        return Ok(false);
    }
    let table = outcome
        .table
        .context("quality gate passed without a table")?;

    let label_start = Instant::now();
    let labeled = label_regimes(&table, &config.regime)?;
    let labeled_path = paths.labeled_path(input);
    let artifact = write_labeled_csv(&labeled_path, &labeled)?;
    run_report.push_stage(StageSummary {
        stage: "label".to_string(),
        passed: true,
        duration_ms: label_start.elapsed().as_millis() as u64,
        rows_in: table.len(),
        rows_out: labeled.table.len(),
        detail: Some(json!({ "occupancy": labeled.occupancy() })),
    });
    run_report.push_output(&artifact);

    let features_start = Instant::now();
    let features = engineer_features(&table)?;
    let features_path = paths.features_path(input);
    let artifact = write_features_csv(&features_path, &features)?;
    run_report.push_stage(StageSummary {
        stage: "features".to_string(),
        passed: true,
        duration_ms: features_start.elapsed().as_millis() as u64,
        rows_in: table.len(),
        rows_out: features.table.len(),
        detail: Some(json!({
            "features": features.feature_count,
            "high_days": features.high_count,
        })),
    });
    run_report.push_output(&artifact);

    run_report.finish(true);
    let report_path = run_report.save(&paths.reports_dir)?;

    println!("Pipeline PASSED");
    println!("  processed: {}", processed_path.display());
    println!("  labeled:   {}", labeled_path.display());
    println!("  features:  {}", features_path.display());
    println!("  report:    {}", report_path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_shape() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parses_with_out_dir() {
        let cli = Cli::parse_from([
            "volregime",
            "run",
            "--input",
            "data/raw/spy.csv",
            "--out-dir",
            "runs/spy",
        ]);
        match cli.command {
            Commands::Run { input, out_dir } => {
                assert_eq!(input, PathBuf::from("data/raw/spy.csv"));
                assert_eq!(out_dir, Some(PathBuf::from("runs/spy")));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from([
            "volregime",
            "quality",
            "-i",
            "raw.csv",
            "-c",
            "volregime.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("volregime.toml")));
    }
}
