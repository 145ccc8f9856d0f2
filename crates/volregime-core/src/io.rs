//! CSV and artifact persistence.
//!
//! Tables round-trip as delimited text with a header row, dates as
//! `%Y-%m-%d`, and missing cells written empty. Artifacts are written
//! atomically (temp file + rename) with a `sha256sum`-format sidecar so every
//! persisted table is self-verifying.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::schema;
use crate::table::SeriesTable;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A table loaded from CSV plus type-coercion diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: SeriesTable,
    /// Non-empty cells per column that failed to parse and became missing
    /// markers. Keyed by column name; absent means every cell parsed.
    pub coercions: BTreeMap<String, usize>,
}

/// Digest metadata for a persisted artifact.
#[derive(Debug, Clone)]
pub struct ArtifactDigest {
    pub path: PathBuf,
    pub sha_path: PathBuf,
    /// Lowercase hex SHA-256 of the artifact bytes.
    pub sha256: String,
    pub bytes_len: usize,
}

fn parse_date(field: &str) -> Option<NaiveDate> {
    let field = field.trim();
    NaiveDate::parse_from_str(field, DATE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(field, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Read a table from CSV, coercing cells to their typed form.
///
/// Unparseable non-empty cells become missing markers and are counted per
/// column; empty cells become missing markers silently. A file without a
/// `timestamp` header loads as an undated table.
pub fn read_table(path: &Path) -> Result<LoadedTable, CoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let ts_idx = headers.iter().position(|h| h == schema::TIMESTAMP);

    let mut timestamps: Vec<Option<NaiveDate>> = Vec::new();
    let mut values: Vec<Vec<f64>> = headers.iter().map(|_| Vec::new()).collect();
    let mut coercions: BTreeMap<String, usize> = BTreeMap::new();

    for record in reader.records() {
        let record = record?;
        for (idx, field) in record.iter().enumerate() {
            if Some(idx) == ts_idx {
                let parsed = parse_date(field);
                if parsed.is_none() && !field.trim().is_empty() {
                    *coercions.entry(schema::TIMESTAMP.to_string()).or_default() += 1;
                }
                timestamps.push(parsed);
            } else {
                let trimmed = field.trim();
                let parsed = if trimmed.is_empty() {
                    f64::NAN
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(v) => v,
                        Err(_) => {
                            *coercions.entry(headers[idx].clone()).or_default() += 1;
                            f64::NAN
                        }
                    }
                };
                values[idx].push(parsed);
            }
        }
    }

    let rows = values
        .iter()
        .enumerate()
        .find(|(idx, _)| Some(*idx) != ts_idx)
        .map(|(_, col)| col.len())
        .unwrap_or(timestamps.len());
    let mut table = if ts_idx.is_some() {
        SeriesTable::new(timestamps)
    } else {
        SeriesTable::undated(rows)
    };
    for (idx, column) in values.into_iter().enumerate() {
        if Some(idx) == ts_idx {
            continue;
        }
        table.set_column(headers[idx].clone(), column)?;
    }

    Ok(LoadedTable { table, coercions })
}

/// A numeric cell for CSV output: empty for missing, shortest-round-trip
/// decimal otherwise.
pub fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{value}")
    }
}

/// A date cell for CSV output: empty for missing.
pub fn format_date(date: &Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Serialize a table to CSV bytes: `timestamp` first (when present), then
/// columns in insertion order.
pub fn table_to_csv_bytes(table: &SeriesTable) -> Result<Vec<u8>, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<String> = Vec::with_capacity(table.column_count() + 1);
    if table.has_timestamp_column() {
        header.push(schema::TIMESTAMP.to_string());
    }
    header.extend(table.column_names().map(str::to_string));
    writer.write_record(&header)?;

    let mut row: Vec<String> = Vec::with_capacity(header.len());
    for i in 0..table.len() {
        row.clear();
        if table.has_timestamp_column() {
            row.push(format_date(&table.timestamps()[i]));
        }
        for column in table.columns() {
            row.push(format_cell(column.values[i]));
        }
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Io(e.into_error()))
}

/// Compute SHA-256 of bytes as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Write bytes atomically: temp file in the target directory, sync, rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Write an artifact atomically along with its `.sha256` sidecar
/// (`<hex>  <file name>` in sha256sum format).
pub fn write_bytes_with_digest(path: &Path, bytes: &[u8]) -> Result<ArtifactDigest, CoreError> {
    write_atomic(path, bytes)?;
    let sha256 = sha256_hex(bytes);
    let sha_path = path.with_extension("sha256");
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    write_atomic(&sha_path, format!("{sha256}  {file_name}\n").as_bytes())?;
    Ok(ArtifactDigest {
        path: path.to_path_buf(),
        sha_path,
        sha256,
        bytes_len: bytes.len(),
    })
}

/// Persist a table as CSV with its digest sidecar.
pub fn write_table_with_digest(
    path: &Path,
    table: &SeriesTable,
) -> Result<ArtifactDigest, CoreError> {
    let bytes = table_to_csv_bytes(table)?;
    write_bytes_with_digest(path, &bytes)
}
