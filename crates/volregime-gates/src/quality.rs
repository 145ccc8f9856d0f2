//! Quality-gate stages and driver.
//!
//! Stage order is fixed: load → structure → clean → price → volume →
//! volatility → enhance → normalize → persist. Each stage is a pure function
//! from a table (plus parameters) to a table plus diagnostics; the driver
//! threads values between stages and accumulates every check into one
//! [`QualityReport`].
//!
//! Gating is asymmetric on purpose: structure, price, and volume failures
//! abort before anything is written, while the volatility stage flags
//! negative values and caps outliers but always passes.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use volregime_core::io::{self, ArtifactDigest};
use volregime_core::schema;
use volregime_core::stats;
use volregime_core::SeriesTable;

use crate::{CheckResult, GateError, QualityReport};

/// Quality gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Rolling window (rows) for the target-horizon volatility mean.
    #[serde(default = "default_target_window")]
    pub target_window: usize,

    /// Z-score magnitude beyond which realized volatility is capped.
    #[serde(default = "default_outlier_z")]
    pub outlier_z: f64,
}

fn default_target_window() -> usize {
    7
}

fn default_outlier_z() -> f64 {
    3.0
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            target_window: default_target_window(),
            outlier_z: default_outlier_z(),
        }
    }
}

impl QualityConfig {
    fn validate(&self) -> Result<(), GateError> {
        if self.target_window == 0 {
            return Err(GateError::Config("target_window must be positive".into()));
        }
        if !(self.outlier_z > 0.0) {
            return Err(GateError::Config("outlier_z must be positive".into()));
        }
        Ok(())
    }
}

/// Outcome of a full quality-gate run.
#[derive(Debug)]
pub struct QualityOutcome {
    pub passed: bool,
    pub report: QualityReport,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Final table when the gate passed (what was persisted).
    pub table: Option<SeriesTable>,
    pub artifact: Option<ArtifactDigest>,
}

/// Check that all required columns are present.
pub fn validate_structure(table: &SeriesTable) -> CheckResult {
    let mut missing: Vec<&str> = Vec::new();
    for name in schema::REQUIRED_COLUMNS {
        let present = if name == schema::TIMESTAMP {
            table.has_timestamp_column()
        } else {
            table.has_column(name)
        };
        if !present {
            missing.push(name);
        }
    }
    if missing.is_empty() {
        CheckResult::pass(
            "structure/required_columns",
            format!("all {} required columns present", schema::REQUIRED_COLUMNS.len()),
        )
    } else {
        CheckResult::fail(
            "structure/required_columns",
            format!("missing required columns: {}", missing.join(", ")),
        )
        .with_metrics(json!({ "missing": missing }))
    }
}

/// Drop cosmetic columns, sort by timestamp, fill missing cells
/// (forward then backward), and drop duplicate timestamps keeping the first.
pub fn clean(mut table: SeriesTable) -> (SeriesTable, Vec<CheckResult>) {
    let mut dropped_names: Vec<&str> = Vec::new();
    for name in schema::COSMETIC_COLUMNS {
        if table.drop_column(name) {
            dropped_names.push(name);
        }
    }
    let reordered = table.sort_by_timestamp();
    let filled = table.fill_missing();
    let duplicates = table.dedup_by_timestamp();

    let checks = vec![
        CheckResult::pass(
            "clean/cosmetic_columns",
            if dropped_names.is_empty() {
                "none present".to_string()
            } else {
                format!("dropped {}", dropped_names.join(", "))
            },
        ),
        CheckResult::pass(
            "clean/row_order",
            if reordered {
                "reordered by timestamp"
            } else {
                "already sorted"
            },
        )
        .with_metrics(json!({ "reordered": reordered })),
        CheckResult::pass("clean/missing_fill", format!("filled {filled} missing cells"))
            .with_metrics(json!({ "filled": filled })),
        CheckResult::pass(
            "clean/duplicate_timestamps",
            format!("dropped {duplicates} duplicate rows"),
        )
        .with_metrics(json!({ "dropped": duplicates })),
    ];
    (table, checks)
}

/// Flag negative prices and OHLC inconsistencies. Any failed check gates the
/// pipeline.
pub fn validate_price(table: &SeriesTable) -> Result<Vec<CheckResult>, GateError> {
    let mut checks = Vec::with_capacity(schema::PRICE_COLUMNS.len() + 1);
    for name in schema::PRICE_COLUMNS {
        let values = table.require_column(name)?;
        let negative = values.iter().filter(|&&v| v < 0.0).count();
        checks.push(if negative > 0 {
            CheckResult::fail(
                format!("price/negative_{name}"),
                format!("found {negative} negative {name} values"),
            )
            .with_metrics(json!({ "count": negative }))
        } else {
            CheckResult::pass(
                format!("price/negative_{name}"),
                format!("no negative {name} values"),
            )
        });
    }

    let open = table.require_column(schema::OPEN)?;
    let high = table.require_column(schema::HIGH)?;
    let low = table.require_column(schema::LOW)?;
    let close = table.require_column(schema::CLOSE)?;
    let mut invalid = 0usize;
    for i in 0..table.len() {
        let (o, h, l, c) = (open[i], high[i], low[i], close[i]);
        if h < l || o < l || o > h || c < l || c > h {
            invalid += 1;
        }
    }
    checks.push(if invalid > 0 {
        CheckResult::fail(
            "price/ohlc_consistency",
            format!("found {invalid} rows with invalid OHLC relationships"),
        )
        .with_metrics(json!({ "count": invalid }))
    } else {
        CheckResult::pass("price/ohlc_consistency", "all OHLC relationships valid")
    });
    Ok(checks)
}

/// Flag negative and exactly-zero volume. Any failed check gates the
/// pipeline.
pub fn validate_volume(table: &SeriesTable) -> Result<Vec<CheckResult>, GateError> {
    let values = table.require_column(schema::VOLUME)?;
    let negative = values.iter().filter(|&&v| v < 0.0).count();
    let zero = values.iter().filter(|&&v| v == 0.0).count();

    let mut checks = Vec::with_capacity(2);
    checks.push(if negative > 0 {
        CheckResult::fail(
            "volume/negative_volume",
            format!("found {negative} negative volume values"),
        )
        .with_metrics(json!({ "count": negative }))
    } else {
        CheckResult::pass("volume/negative_volume", "no negative volume values")
    });
    checks.push(if zero > 0 {
        CheckResult::fail(
            "volume/zero_volume",
            format!("found {zero} zero volume values"),
        )
        .with_metrics(json!({ "count": zero }))
    } else {
        CheckResult::pass("volume/zero_volume", "no zero volume values")
    });
    Ok(checks)
}

/// Log volatility statistics, flag negative values, and cap outliers beyond
/// the configured z-score to `mean ± z·std` with the sign of the original
/// deviation. Never gates: every check passes.
pub fn validate_volatility(
    mut table: SeriesTable,
    config: &QualityConfig,
) -> Result<(SeriesTable, Vec<CheckResult>), GateError> {
    let values: Vec<f64> = table.require_column(schema::REALIZED_VOLATILITY)?.to_vec();
    let mean = stats::nan_mean(&values);
    let std = stats::nan_std(&values);
    let min = stats::nan_min(&values);
    let max = stats::nan_max(&values);
    info!(mean, std, min, max, "realized volatility statistics");

    let mut checks = vec![CheckResult::pass(
        "volatility/stats",
        format!("mean {mean:.4}, std {std:.4}, min {min:.4}, max {max:.4}"),
    )
    .with_metrics(json!({ "mean": mean, "std": std, "min": min, "max": max }))];

    let negative = values.iter().filter(|&&v| v < 0.0).count();
    checks.push(if negative > 0 {
        warn!(count = negative, "negative realized volatility values found");
        CheckResult::pass(
            "volatility/negative_values",
            format!("found {negative} negative values (flagged, not gating)"),
        )
        .with_metrics(json!({ "count": negative }))
    } else {
        CheckResult::pass("volatility/negative_values", "no negative values")
    });

    let cap = config.outlier_z;
    let mut capped_values = values;
    let mut capped = 0usize;
    if !std.is_nan() && std > 0.0 {
        for v in &mut capped_values {
            let deviation = *v - mean;
            if (deviation / std).abs() > cap {
                *v = mean + cap * std * deviation.signum();
                capped += 1;
            }
        }
    }
    if capped > 0 {
        warn!(capped, cap_z = cap, "capped extreme volatility values");
        table.set_column(schema::REALIZED_VOLATILITY, capped_values)?;
    }
    checks.push(
        CheckResult::pass(
            "volatility/outlier_cap",
            format!("capped {capped} values beyond |z| > {cap}"),
        )
        .with_metrics(json!({ "capped": capped, "cap_z": cap })),
    );
    Ok((table, checks))
}

fn elementwise_div(numerator: &[f64], denominator: &[f64]) -> Vec<f64> {
    numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| n / d)
        .collect()
}

/// Derive the enhancement columns: range/change ratios, rolling volume and
/// volatility means with their ratios, calendar fields, and trend/momentum
/// series.
pub fn enhance(
    mut table: SeriesTable,
    config: &QualityConfig,
) -> Result<(SeriesTable, CheckResult), GateError> {
    let short = schema::ENHANCE_SHORT_WINDOW;
    let long = schema::ENHANCE_LONG_WINDOW;

    let mut derived: Vec<(String, Vec<f64>)> = Vec::new();
    {
        let close = table.require_column(schema::CLOSE)?;
        let high = table.require_column(schema::HIGH)?;
        let low = table.require_column(schema::LOW)?;
        let volume = table.require_column(schema::VOLUME)?;
        let log_returns = table.require_column(schema::LOG_RETURNS)?;
        let volatility = table.require_column(schema::REALIZED_VOLATILITY)?;

        let daily_range: Vec<f64> = high
            .iter()
            .zip(low)
            .zip(close)
            .map(|((h, l), c)| (h - l) / c)
            .collect();
        let price_change = stats::pct_change(close, 1);
        let price_volatility = stats::rolling_std(&price_change, short);

        let volume_ma_short = stats::rolling_mean(volume, short);
        let volume_ma_long = stats::rolling_mean(volume, long);
        let volume_ratio = elementwise_div(volume, &volume_ma_short);

        let volatility_ma_short = stats::rolling_mean(volatility, short);
        let volatility_ma_long = stats::rolling_mean(volatility, long);
        let volatility_ma_target = stats::rolling_mean(volatility, config.target_window);
        let volatility_ratio = elementwise_div(volatility, &volatility_ma_short);

        let day_of_week: Vec<f64> = table
            .timestamps()
            .iter()
            .map(|ts| {
                ts.map(|d| d.weekday().num_days_from_monday() as f64)
                    .unwrap_or(f64::NAN)
            })
            .collect();
        let month: Vec<f64> = table
            .timestamps()
            .iter()
            .map(|ts| ts.map(|d| d.month() as f64).unwrap_or(f64::NAN))
            .collect();
        let is_weekend: Vec<f64> = day_of_week
            .iter()
            .map(|&d| {
                if d.is_nan() {
                    f64::NAN
                } else if d >= 5.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();

        let price_trend = stats::pct_change(&stats::rolling_mean(close, short), 1);
        let volume_trend = stats::pct_change(&stats::rolling_mean(volume, short), 1);
        let return_momentum = stats::rolling_mean(log_returns, short);
        let volatility_momentum = stats::rolling_mean(volatility, short);

        derived.push(("daily_range".into(), daily_range));
        derived.push(("price_change".into(), price_change));
        derived.push(("price_volatility".into(), price_volatility));
        derived.push((schema::ma_name("volume", short), volume_ma_short));
        derived.push((schema::ma_name("volume", long), volume_ma_long));
        derived.push(("volume_ratio".into(), volume_ratio));
        derived.push((schema::ma_name("volatility", short), volatility_ma_short));
        derived.push((schema::ma_name("volatility", long), volatility_ma_long));
        derived.push((
            schema::ma_name("volatility", config.target_window),
            volatility_ma_target,
        ));
        derived.push(("volatility_ratio".into(), volatility_ratio));
        derived.push(("day_of_week".into(), day_of_week));
        derived.push(("month".into(), month));
        derived.push(("is_weekend".into(), is_weekend));
        derived.push(("price_trend".into(), price_trend));
        derived.push(("volume_trend".into(), volume_trend));
        derived.push(("return_momentum".into(), return_momentum));
        derived.push(("volatility_momentum".into(), volatility_momentum));
    }

    let count = derived.len();
    for (name, values) in derived {
        table.set_column(name, values)?;
    }
    Ok((
        table,
        CheckResult::pass("enhance/derived_columns", format!("derived {count} columns")),
    ))
}

/// Append a z-score twin for each configured column, using whole-sample mean
/// and std. Absent columns are skipped silently.
pub fn normalize(mut table: SeriesTable) -> Result<(SeriesTable, CheckResult), GateError> {
    let mut added = 0usize;
    for name in schema::NORMALIZED_COLUMNS {
        let Some(values) = table.column(name) else {
            continue;
        };
        let normalized = stats::zscore(values);
        table.set_column(schema::normalized_name(name), normalized)?;
        added += 1;
    }
    Ok((
        table,
        CheckResult::pass(
            "normalize/zscore_columns",
            format!("added {added} normalized columns"),
        ),
    ))
}

fn coercion_checks(coercions: &BTreeMap<String, usize>) -> Vec<CheckResult> {
    if coercions.is_empty() {
        return vec![CheckResult::pass("load/type_coercion", "all cells parsed")];
    }
    coercions
        .iter()
        .map(|(column, count)| {
            CheckResult::pass(
                format!("load/type_coercion_{column}"),
                format!("coerced {count} unparseable cells to missing"),
            )
            .with_metrics(json!({ "column": column, "count": count }))
        })
        .collect()
}

/// Run the full quality gate: returns `Ok` with `passed = false` for gating
/// validation failures (nothing written), `Err` for I/O or config errors.
pub fn run_quality_pipeline(
    input: &Path,
    output: &Path,
    config: &QualityConfig,
) -> Result<QualityOutcome, GateError> {
    config.validate()?;
    let start = Instant::now();
    let mut report = QualityReport::new();

    info!(input = %input.display(), "starting quality gate");
    let loaded = io::read_table(input)?;
    let rows_in = loaded.table.len();
    info!(
        rows = rows_in,
        columns = loaded.table.column_count(),
        "raw table loaded"
    );
    report.extend_checks(coercion_checks(&loaded.coercions));

    let table = loaded.table;
    report.add_check(validate_structure(&table));
    if !report.passed {
        error!("structure validation failed");
        return Ok(finish(report, start, rows_in, 0, None, None));
    }

    let (table, checks) = clean(table);
    report.extend_checks(checks);

    let price_checks = validate_price(&table)?;
    let price_ok = price_checks.iter().all(|c| c.passed);
    report.extend_checks(price_checks);
    if !price_ok {
        error!("price validation failed");
        return Ok(finish(report, start, rows_in, table.len(), None, None));
    }

    let volume_checks = validate_volume(&table)?;
    let volume_ok = volume_checks.iter().all(|c| c.passed);
    report.extend_checks(volume_checks);
    if !volume_ok {
        error!("volume validation failed");
        return Ok(finish(report, start, rows_in, table.len(), None, None));
    }

    let (table, checks) = validate_volatility(table, config)?;
    report.extend_checks(checks);

    let (table, check) = enhance(table, config)?;
    report.add_check(check);

    let (table, check) = normalize(table)?;
    report.add_check(check);

    let artifact = io::write_table_with_digest(output, &table)?;
    info!(
        path = %output.display(),
        sha256 = %artifact.sha256,
        rows = table.len(),
        "processed table written"
    );

    let rows_out = table.len();
    Ok(finish(
        report,
        start,
        rows_in,
        rows_out,
        Some(table),
        Some(artifact),
    ))
}

fn finish(
    mut report: QualityReport,
    start: Instant,
    rows_in: usize,
    rows_out: usize,
    table: Option<SeriesTable>,
    artifact: Option<ArtifactDigest>,
) -> QualityOutcome {
    report.duration_ms = start.elapsed().as_millis() as u64;
    report.summary = format!(
        "{}/{} checks passed in {}ms",
        report.passed_count(),
        report.checks.len(),
        report.duration_ms
    );
    for check in &report.checks {
        if check.passed {
            info!(check = %check.name, "{}", check.message);
        } else {
            warn!(check = %check.name, "{}", check.message);
        }
    }
    info!(
        passed = report.passed,
        checks_passed = report.passed_count(),
        checks_total = report.checks.len(),
        duration_ms = report.duration_ms,
        "quality gate complete"
    );
    QualityOutcome {
        passed: report.passed,
        report,
        rows_in,
        rows_out,
        table,
        artifact,
    }
}
