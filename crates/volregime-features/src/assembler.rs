//! Feature assembly: target first, then the five families, then repairs.

use std::path::Path;

use tracing::info;

use volregime_core::io::{self, ArtifactDigest};
use volregime_core::schema;
use volregime_core::SeriesTable;

use crate::families;
use crate::target::TargetFit;
use crate::FeatureError;

/// An engineered feature set: the date index, the feature columns, and the
/// target as the last column.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub table: SeriesTable,
    pub target_fit: TargetFit,
    pub high_count: usize,
    pub feature_count: usize,
}

fn required<'t>(table: &'t SeriesTable, name: &str) -> Result<&'t [f64], FeatureError> {
    table
        .column(name)
        .ok_or_else(|| FeatureError::MissingColumn(name.to_string()))
}

/// Build the target and all five feature families from a processed table.
///
/// The target is computed first because the volatility family depends on it.
/// After the families are merged the table is forward/backward filled,
/// infinities are cleared to NaN, and the fill runs once more; the target is
/// appended after the repairs so it is never fill-modified.
pub fn engineer_features(table: &SeriesTable) -> Result<FeatureSet, FeatureError> {
    let close = required(table, schema::CLOSE)?;
    let volume = required(table, schema::VOLUME)?;
    let volatility = required(table, schema::REALIZED_VOLATILITY)?;

    let target_fit = TargetFit::fit(volatility);
    let target = target_fit.apply(volatility);
    let high_count = target.iter().filter(|&&v| v == 1.0).count();
    let total = target.len();
    let pct = if total == 0 {
        0.0
    } else {
        high_count as f64 / total as f64 * 100.0
    };
    info!(
        threshold = target_fit.threshold,
        "high volatility regime: {high_count}/{total} days ({pct:.2}%)"
    );

    let mut series: Vec<(String, Vec<f64>)> = Vec::with_capacity(61);
    series.extend(families::price_features(close));
    series.extend(families::volume_features(volume));
    series.extend(families::volatility_features(volatility, &target));
    series.extend(families::time_features(table.timestamps()));
    series.extend(families::interaction_features(close, volume, volatility));

    let mut out = if table.has_timestamp_column() {
        SeriesTable::new(table.timestamps().to_vec())
    } else {
        SeriesTable::undated(table.len())
    };
    let feature_count = series.len();
    for (name, values) in series {
        out.set_column(name, values)?;
    }

    let filled = out.fill_missing();
    let infinite = out.replace_infinite();
    let refilled = out.fill_missing();
    info!(
        features = feature_count,
        filled, infinite, refilled, "feature families merged"
    );

    out.set_column(schema::TARGET_COLUMN, target)?;

    Ok(FeatureSet {
        table: out,
        target_fit,
        high_count,
        feature_count,
    })
}

/// Write the feature table as CSV with a digest sidecar.
pub fn write_features_csv(
    path: &Path,
    features: &FeatureSet,
) -> Result<ArtifactDigest, FeatureError> {
    let artifact = io::write_table_with_digest(path, &features.table)?;
    info!(
        path = %path.display(),
        sha256 = %artifact.sha256,
        rows = features.table.len(),
        "feature table written"
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dates_from(start: &str, n: usize) -> Vec<Option<NaiveDate>> {
        let mut out = Vec::with_capacity(n);
        let mut day = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        for _ in 0..n {
            out.push(Some(day));
            day = day.succ_opt().unwrap();
        }
        out
    }

    fn make_processed_table(n: usize) -> SeriesTable {
        let mut table = SeriesTable::new(dates_from("2024-01-01", n));
        let close: Vec<f64> = (0..n)
            .map(|i| 100.0 + i as f64 + (i as f64 * 0.7).sin())
            .collect();
        let volume: Vec<f64> = (0..n)
            .map(|i| 1000.0 + 10.0 * i as f64 + (i as f64 * 1.3).cos() * 5.0)
            .collect();
        let volatility: Vec<f64> = (0..n).map(|i| 0.02 + 0.001 * (i % 7) as f64).collect();
        table.set_column(schema::CLOSE, close).unwrap();
        table.set_column(schema::VOLUME, volume).unwrap();
        table
            .set_column(schema::REALIZED_VOLATILITY, volatility)
            .unwrap();
        table
    }

    #[test]
    fn test_engineer_builds_sixty_one_features_plus_target() {
        let table = make_processed_table(40);
        let features = engineer_features(&table).unwrap();
        assert_eq!(features.feature_count, 61);
        assert_eq!(features.table.column_count(), 62);

        let names: Vec<&str> = features.table.column_names().collect();
        assert_eq!(names[0], "price_change_1d");
        assert_eq!(names[61], schema::TARGET_COLUMN);
        assert_eq!(features.table.len(), 40);
    }

    #[test]
    fn test_all_feature_cells_are_finite_after_repair() {
        let table = make_processed_table(40);
        let features = engineer_features(&table).unwrap();
        for column in features.table.columns() {
            for (row, value) in column.values.iter().enumerate() {
                assert!(
                    value.is_finite(),
                    "{}[{}] is {}",
                    column.name,
                    row,
                    value
                );
            }
        }
    }

    #[test]
    fn test_warmup_rows_are_backfilled() {
        let table = make_processed_table(40);
        let features = engineer_features(&table).unwrap();
        // price_change_1d has no value at row 0; backward fill copies row 1
        let change = features.table.column("price_change_1d").unwrap();
        assert_eq!(change[0], change[1]);
        let ma20 = features.table.column("volatility_ma_20d").unwrap();
        assert_eq!(ma20[0], ma20[19]);
        assert_ne!(ma20[19], ma20[39]);
    }

    #[test]
    fn test_target_column_is_binary_and_unfilled() {
        let mut table = make_processed_table(40);
        let mut volatility = table.column(schema::REALIZED_VOLATILITY).unwrap().to_vec();
        volatility[35] = 0.5;
        table
            .set_column(schema::REALIZED_VOLATILITY, volatility)
            .unwrap();

        let features = engineer_features(&table).unwrap();
        let target = features.table.column(schema::TARGET_COLUMN).unwrap();
        assert!(target.iter().all(|&v| v == 0.0 || v == 1.0));
        assert_eq!(features.high_count, 1);
        assert_eq!(target[35], 1.0);
    }

    #[test]
    fn test_missing_input_column_errors() {
        let mut table = make_processed_table(10);
        table.drop_column(schema::VOLUME);
        assert!(matches!(
            engineer_features(&table).unwrap_err(),
            FeatureError::MissingColumn(_)
        ));
    }
}
