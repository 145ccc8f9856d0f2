//! Regime labeling over a processed table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use volregime_core::io::{self, ArtifactDigest};
use volregime_core::schema;
use volregime_core::{CoreError, SeriesTable};

use crate::fit::RegimeFit;
use crate::LabelError;

/// Regime labeling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Number of equal-frequency regimes.
    #[serde(default = "default_regime_count")]
    pub count: usize,

    /// Column the regimes are fitted on.
    #[serde(default = "default_regime_column")]
    pub column: String,
}

fn default_regime_count() -> usize {
    3
}

fn default_regime_column() -> String {
    schema::REALIZED_VOLATILITY.to_string()
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            count: default_regime_count(),
            column: default_regime_column(),
        }
    }
}

/// Row-to-row transition probabilities between regimes, estimated from
/// consecutive label pairs. A regime that never appears as a source has an
/// all-NaN row; a regime that never appears as a destination contributes 0.0
/// cells.
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    /// Estimate from a label sequence. Pairs with a missing label on either
    /// side are dropped.
    pub fn from_labels(labels: &[Option<usize>], fit: &RegimeFit) -> Self {
        let count = fit.count();
        let mut observed = vec![vec![0usize; count]; count];
        for pair in labels.windows(2) {
            if let (Some(from), Some(to)) = (pair[0], pair[1]) {
                observed[from][to] += 1;
            }
        }
        let rows = observed
            .iter()
            .map(|row| {
                let total: usize = row.iter().sum();
                if total == 0 {
                    vec![f64::NAN; count]
                } else {
                    row.iter().map(|&c| c as f64 / total as f64).collect()
                }
            })
            .collect();
        Self {
            names: fit.names().to_vec(),
            rows,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// P(from → to). NaN when `from` was never observed as a source.
    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }

    pub fn row(&self, from: usize) -> &[f64] {
        &self.rows[from]
    }
}

fn labels_equal(a: Option<usize>, b: Option<usize>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// 1-based run id, incremented whenever the label differs from the previous
/// row. A missing label never equals anything, so it always breaks a run.
pub fn run_groups(labels: &[Option<usize>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(labels.len());
    let mut group = 0u64;
    for i in 0..labels.len() {
        if i == 0 || !labels_equal(labels[i - 1], labels[i]) {
            group += 1;
        }
        out.push(group as f64);
    }
    out
}

/// 0-based position within the current run.
pub fn run_durations(labels: &[Option<usize>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(labels.len());
    let mut duration = 0u64;
    for i in 0..labels.len() {
        if i == 0 || !labels_equal(labels[i - 1], labels[i]) {
            duration = 0;
        } else {
            duration += 1;
        }
        out.push(duration as f64);
    }
    out
}

/// A labeled table: the input columns plus annotation columns, with the
/// string regime labels kept alongside rather than inside the numeric table.
#[derive(Debug, Clone)]
pub struct RegimeLabeled {
    pub table: SeriesTable,
    pub labels: Vec<Option<usize>>,
    pub fit: RegimeFit,
    pub transitions: TransitionMatrix,
    base_columns: usize,
}

impl RegimeLabeled {
    /// String label for a row, `None` when the row got no regime.
    pub fn label_name(&self, row: usize) -> Option<&str> {
        self.labels[row].map(|bin| self.fit.name_of(bin))
    }

    /// Occupancy count per regime, in regime order.
    pub fn occupancy(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.fit.count()];
        for label in self.labels.iter().flatten() {
            counts[*label] += 1;
        }
        counts
    }
}

/// Fit regimes on the configured column and annotate every row.
///
/// Annotation columns, in order: `regime_group`, `regime_duration`, one
/// `transition_prob_{name}` per regime, `distance_to_lower_boundary`,
/// `distance_to_upper_boundary`.
pub fn label_regimes(
    table: &SeriesTable,
    config: &RegimeConfig,
) -> Result<RegimeLabeled, LabelError> {
    let values = table
        .column(&config.column)
        .ok_or_else(|| LabelError::MissingColumn(config.column.clone()))?;
    let fit = RegimeFit::fit(values, config.count)?;
    let labels = fit.apply_all(values);

    let mut counts = vec![0usize; fit.count()];
    let mut unlabeled = 0usize;
    for label in &labels {
        match label {
            Some(bin) => counts[*bin] += 1,
            None => unlabeled += 1,
        }
    }
    for (name, count) in fit.names().iter().zip(&counts) {
        info!(regime = %name, count, "regime occupancy");
    }
    if unlabeled > 0 {
        warn!(unlabeled, "rows without a regime label");
    }

    let transitions = TransitionMatrix::from_labels(&labels, &fit);
    for (from, name) in fit.names().iter().enumerate() {
        info!(
            from = %name,
            probabilities = ?transitions.row(from),
            "transition probabilities"
        );
    }

    let groups = run_groups(&labels);
    let durations = run_durations(&labels);
    let lower = fit.lower_bound();
    let upper = fit.upper_bound();
    let to_lower: Vec<f64> = values.iter().map(|v| v - lower).collect();
    let to_upper: Vec<f64> = values.iter().map(|v| upper - v).collect();

    let mut out = table.clone();
    let base_columns = out.column_count();
    out.set_column("regime_group", groups)?;
    out.set_column("regime_duration", durations)?;
    for (to, name) in fit.names().iter().enumerate() {
        let column: Vec<f64> = labels
            .iter()
            .map(|label| match label {
                Some(from) => transitions.probability(*from, to),
                None => f64::NAN,
            })
            .collect();
        out.set_column(format!("transition_prob_{name}"), column)?;
    }
    out.set_column("distance_to_lower_boundary", to_lower)?;
    out.set_column("distance_to_upper_boundary", to_upper)?;

    Ok(RegimeLabeled {
        table: out,
        labels,
        fit,
        transitions,
        base_columns,
    })
}

/// Write a labeled table as CSV with a digest sidecar. The string regime
/// column goes between the input columns and the annotation columns; rows
/// without a regime get an empty label cell.
pub fn write_labeled_csv(
    path: &Path,
    labeled: &RegimeLabeled,
) -> Result<ArtifactDigest, LabelError> {
    let table = &labeled.table;
    let names: Vec<String> = table.column_names().map(str::to_string).collect();
    let (base, annotations) = names.split_at(labeled.base_columns);

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header: Vec<&str> = Vec::with_capacity(names.len() + 2);
    if table.has_timestamp_column() {
        header.push(schema::TIMESTAMP);
    }
    header.extend(base.iter().map(String::as_str));
    header.push(schema::REGIME_COLUMN);
    header.extend(annotations.iter().map(String::as_str));
    writer.write_record(&header).map_err(CoreError::from)?;

    let base_slices: Vec<&[f64]> = base
        .iter()
        .map(|name| table.require_column(name))
        .collect::<Result<_, _>>()?;
    let annotation_slices: Vec<&[f64]> = annotations
        .iter()
        .map(|name| table.require_column(name))
        .collect::<Result<_, _>>()?;

    let mut record: Vec<String> = Vec::with_capacity(header.len());
    for row in 0..table.len() {
        record.clear();
        if table.has_timestamp_column() {
            record.push(io::format_date(&table.timestamps()[row]));
        }
        for values in &base_slices {
            record.push(io::format_cell(values[row]));
        }
        record.push(
            labeled
                .label_name(row)
                .map(str::to_string)
                .unwrap_or_default(),
        );
        for values in &annotation_slices {
            record.push(io::format_cell(values[row]));
        }
        writer.write_record(&record).map_err(CoreError::from)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Io(e.into_error()))?;
    let artifact = io::write_bytes_with_digest(path, &bytes)?;
    info!(
        path = %path.display(),
        sha256 = %artifact.sha256,
        rows = table.len(),
        "labeled table written"
    );
    Ok(artifact)
}
