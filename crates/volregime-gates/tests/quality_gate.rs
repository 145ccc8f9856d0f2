//! End-to-end tests for the quality gate: raw CSV in, processed CSV plus
//! digest sidecar out, with gating failures producing no output at all.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;

use volregime_core::schema;
use volregime_gates::{run_quality_pipeline, GateError, QualityConfig};

fn write_raw_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let mut out = String::from(
        "timestamp,open,high,low,close,volume,log_returns,realized_volatility\n",
    );
    let mut day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for i in 0..rows {
        let close = 100.0 + i as f64;
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            day.format("%Y-%m-%d"),
            close - 1.0,
            close + 2.0,
            close - 2.0,
            close,
            1000.0 + 10.0 * i as f64,
            0.001 * (i % 5) as f64,
            0.02 + 0.001 * (i % 7) as f64,
        ));
        day = day.succ_opt().unwrap();
    }
    let path = dir.join(name);
    fs::write(&path, out).unwrap();
    path
}

#[test]
fn test_full_run_writes_output_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_csv(dir.path(), "raw.csv", 40);
    let output = dir.path().join("processed.csv");

    let outcome = run_quality_pipeline(&input, &output, &QualityConfig::default()).unwrap();
    assert!(outcome.passed);
    assert!(outcome.report.passed);
    assert_eq!(outcome.rows_in, 40);
    assert_eq!(outcome.rows_out, 40);

    assert!(output.exists());
    let sidecar = output.with_extension("sha256");
    assert!(sidecar.exists());
    let artifact = outcome.artifact.unwrap();
    let sidecar_text = fs::read_to_string(&sidecar).unwrap();
    assert!(sidecar_text.starts_with(&artifact.sha256));
    assert!(sidecar_text.trim_end().ends_with("processed.csv"));

    let table = outcome.table.unwrap();
    for name in schema::REQUIRED_COLUMNS {
        if name == schema::TIMESTAMP {
            assert!(table.has_timestamp_column());
        } else {
            assert!(table.has_column(name), "missing {name}");
        }
    }
    for name in schema::NORMALIZED_COLUMNS {
        assert!(
            table.has_column(&schema::normalized_name(name)),
            "missing twin for {name}"
        );
    }

    let header = fs::read_to_string(&output)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string();
    assert!(header.starts_with("timestamp,open,high,low,close,volume"));
    assert!(header.contains("volume_normalized"));
}

#[test]
fn test_missing_column_gates_without_output() {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    csv.push_str("2024-01-01,99,102,98,100,1000\n");
    let input = dir.path().join("raw.csv");
    fs::write(&input, csv).unwrap();
    let output = dir.path().join("processed.csv");

    let outcome = run_quality_pipeline(&input, &output, &QualityConfig::default()).unwrap();
    assert!(!outcome.passed);
    assert!(!output.exists());
    assert!(outcome.table.is_none());
    assert!(outcome.artifact.is_none());

    let structure = outcome
        .report
        .check("structure/required_columns")
        .unwrap();
    assert!(!structure.passed);
    assert!(structure.message.contains("log_returns"));
    assert!(structure.message.contains("realized_volatility"));
}

#[test]
fn test_zero_volume_gates_while_price_passes() {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from(
        "timestamp,open,high,low,close,volume,log_returns,realized_volatility\n",
    );
    csv.push_str("2024-01-01,9.0,10.0,8.0,9.5,100,0.0,0.02\n");
    csv.push_str("2024-01-02,9.5,11.0,9.0,10.0,0,0.05,0.03\n");
    let input = dir.path().join("raw.csv");
    fs::write(&input, csv).unwrap();
    let output = dir.path().join("processed.csv");

    let outcome = run_quality_pipeline(&input, &output, &QualityConfig::default()).unwrap();
    assert!(!outcome.passed);
    assert!(!output.exists());

    for name in [
        "price/negative_open",
        "price/negative_high",
        "price/negative_low",
        "price/negative_close",
        "price/ohlc_consistency",
    ] {
        assert!(outcome.report.check(name).unwrap().passed, "{name} failed");
    }
    assert!(!outcome.report.check("volume/zero_volume").unwrap().passed);
}

#[test]
fn test_rerun_on_own_output_is_stable() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_csv(dir.path(), "raw.csv", 40);
    let first_out = dir.path().join("processed.csv");
    let second_out = dir.path().join("processed_again.csv");
    let config = QualityConfig::default();

    let first = run_quality_pipeline(&input, &first_out, &config).unwrap();
    assert!(first.passed);
    let second = run_quality_pipeline(&first_out, &second_out, &config).unwrap();
    assert!(second.passed);

    let order = second.report.check("clean/row_order").unwrap();
    assert_eq!(order.metrics.as_ref().unwrap()["reordered"], false);
    let dedup = second.report.check("clean/duplicate_timestamps").unwrap();
    assert_eq!(dedup.metrics.as_ref().unwrap()["dropped"], 0);

    let first_table = first.table.unwrap();
    let second_table = second.table.unwrap();
    assert_eq!(first_table.len(), second_table.len());
    assert_eq!(first_table.timestamps(), second_table.timestamps());
    for name in [
        schema::OPEN,
        schema::HIGH,
        schema::LOW,
        schema::CLOSE,
        schema::VOLUME,
        schema::LOG_RETURNS,
        schema::REALIZED_VOLATILITY,
    ] {
        assert_eq!(
            first_table.column(name).unwrap(),
            second_table.column(name).unwrap(),
            "{name} changed on rerun"
        );
    }
}

#[test]
fn test_unreadable_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.csv");
    let output = dir.path().join("processed.csv");
    let err = run_quality_pipeline(&missing, &output, &QualityConfig::default()).unwrap_err();
    assert!(matches!(err, GateError::Table(_)));
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_csv(dir.path(), "raw.csv", 10);
    let output = dir.path().join("processed.csv");
    let config = QualityConfig {
        target_window: 0,
        ..QualityConfig::default()
    };
    let err = run_quality_pipeline(&input, &output, &config).unwrap_err();
    assert!(matches!(err, GateError::Config(_)));
}
