//! Full pipeline flow: raw CSV through the quality gate, then regime
//! labeling and feature assembly both consuming the processed table.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;

use volregime_core::schema;
use volregime_features::{engineer_features, write_features_csv};
use volregime_gates::{run_quality_pipeline, QualityConfig};
use volregime_labeler::{label_regimes, write_labeled_csv, RegimeConfig};

fn write_raw_csv(dir: &Path, rows: usize) -> PathBuf {
    let mut out = String::from(
        "timestamp,open,high,low,close,volume,log_returns,realized_volatility\n",
    );
    let mut day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for i in 0..rows {
        let close = 100.0 + i as f64 + (i as f64 * 0.7).sin();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            day.format("%Y-%m-%d"),
            close - 1.0,
            close + 2.0,
            close - 2.0,
            close,
            1000.0 + 10.0 * i as f64 + (i as f64 * 1.3).cos() * 5.0,
            0.001 * (i % 5) as f64,
            0.02 + 0.001 * (i % 7) as f64,
        ));
        day = day.succ_opt().unwrap();
    }
    let path = dir.join("raw.csv");
    fs::write(&path, out).unwrap();
    path
}

#[test]
fn test_quality_label_feature_chain() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_csv(dir.path(), 60);
    let processed_path = dir.path().join("processed.csv");

    let outcome =
        run_quality_pipeline(&input, &processed_path, &QualityConfig::default()).unwrap();
    assert!(outcome.passed);
    let processed = outcome.table.unwrap();

    let labeled = label_regimes(&processed, &RegimeConfig::default()).unwrap();
    let labeled_path = dir.path().join("labeled.csv");
    write_labeled_csv(&labeled_path, &labeled).unwrap();
    assert!(labeled_path.exists());
    assert!(labeled_path.with_extension("sha256").exists());

    // every row of a complete series gets a regime
    assert_eq!(labeled.occupancy().iter().sum::<usize>(), 60);
    assert_eq!(labeled.table.len(), 60);

    let features = engineer_features(&processed).unwrap();
    assert_eq!(features.feature_count, 61);
    let features_path = dir.path().join("features.csv");
    write_features_csv(&features_path, &features).unwrap();
    assert!(features_path.with_extension("sha256").exists());

    let text = fs::read_to_string(&features_path).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("timestamp,price_change_1d,"));
    assert!(header.ends_with(&format!(",{}", schema::TARGET_COLUMN)));
    assert_eq!(text.lines().count(), 61); // header + 60 rows
}
