//! Column-oriented time-series table.
//!
//! One table type is threaded through every pipeline stage: a date index plus
//! named `f64` columns of equal length. `f64::NAN` marks a missing cell and a
//! `None` timestamp marks an unparseable date. Columns keep insertion order
//! so persisted output is deterministic.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::error::CoreError;

/// A named column of values. NaN is the missing marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Column-oriented table keyed by a date index.
#[derive(Debug, Clone, Default)]
pub struct SeriesTable {
    timestamps: Vec<Option<NaiveDate>>,
    has_timestamp: bool,
    columns: Vec<Column>,
}

impl SeriesTable {
    /// Create a table with a date index and no columns yet.
    pub fn new(timestamps: Vec<Option<NaiveDate>>) -> Self {
        Self {
            timestamps,
            has_timestamp: true,
            columns: Vec::new(),
        }
    }

    /// Create a table whose source carried no date index.
    pub fn undated(rows: usize) -> Self {
        Self {
            timestamps: vec![None; rows],
            has_timestamp: false,
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Whether the source table carried a timestamp column at all.
    pub fn has_timestamp_column(&self) -> bool {
        self.has_timestamp
    }

    pub fn timestamps(&self) -> &[Option<NaiveDate>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[f64], CoreError> {
        self.column(name)
            .ok_or_else(|| CoreError::MissingColumn(name.to_string()))
    }

    /// Insert or replace a column. New columns append at the end.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), CoreError> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(CoreError::ColumnLength {
                name,
                expected: self.timestamps.len(),
                got: values.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    /// Remove a column; true when it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() < before
    }

    /// Stable sort ascending by timestamp, missing dates last.
    /// Returns true when the row order changed.
    pub fn sort_by_timestamp(&mut self) -> bool {
        let mut order: Vec<usize> = (0..self.len()).collect();
        let ts = &self.timestamps;
        order.sort_by_key(|&i| (ts[i].is_none(), ts[i]));
        let changed = order.iter().enumerate().any(|(pos, &i)| pos != i);
        if changed {
            self.apply_row_order(&order);
        }
        changed
    }

    /// Forward-fill then backward-fill missing cells in every column and the
    /// date index. Returns the number of cells filled.
    pub fn fill_missing(&mut self) -> usize {
        let mut filled = 0usize;

        let mut last: Option<NaiveDate> = None;
        for ts in &mut self.timestamps {
            match ts {
                Some(d) => last = Some(*d),
                None => {
                    if let Some(d) = last {
                        *ts = Some(d);
                        filled += 1;
                    }
                }
            }
        }
        let mut next: Option<NaiveDate> = None;
        for ts in self.timestamps.iter_mut().rev() {
            match ts {
                Some(d) => next = Some(*d),
                None => {
                    if let Some(d) = next {
                        *ts = Some(d);
                        filled += 1;
                    }
                }
            }
        }

        for col in &mut self.columns {
            let mut last = f64::NAN;
            for v in &mut col.values {
                if v.is_nan() {
                    if !last.is_nan() {
                        *v = last;
                        filled += 1;
                    }
                } else {
                    last = *v;
                }
            }
            let mut next = f64::NAN;
            for v in col.values.iter_mut().rev() {
                if v.is_nan() {
                    if !next.is_nan() {
                        *v = next;
                        filled += 1;
                    }
                } else {
                    next = *v;
                }
            }
        }
        filled
    }

    /// Drop rows whose timestamp was already seen, keeping the first
    /// occurrence. Two missing dates count as duplicates. Returns the number
    /// of rows dropped.
    pub fn dedup_by_timestamp(&mut self) -> usize {
        let mut seen: HashSet<Option<NaiveDate>> = HashSet::with_capacity(self.len());
        let keep: Vec<bool> = self.timestamps.iter().map(|ts| seen.insert(*ts)).collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            self.retain_rows(&keep);
        }
        dropped
    }

    /// Replace every infinite cell with the missing marker. Returns the
    /// number of cells replaced.
    pub fn replace_infinite(&mut self) -> usize {
        let mut replaced = 0usize;
        for col in &mut self.columns {
            for v in &mut col.values {
                if v.is_infinite() {
                    *v = f64::NAN;
                    replaced += 1;
                }
            }
        }
        replaced
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.timestamps.len());
        let mut idx = 0;
        self.timestamps.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        for col in &mut self.columns {
            let mut idx = 0;
            col.values.retain(|_| {
                let k = keep[idx];
                idx += 1;
                k
            });
        }
    }

    fn apply_row_order(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.timestamps.len());
        self.timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        for col in &mut self.columns {
            col.values = order.iter().map(|&i| col.values[i]).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Option<NaiveDate> {
        Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    fn make_table(dates: &[Option<NaiveDate>], close: &[f64]) -> SeriesTable {
        let mut table = SeriesTable::new(dates.to_vec());
        table.set_column("close", close.to_vec()).unwrap();
        table
    }

    #[test]
    fn test_set_column_rejects_length_mismatch() {
        let mut table = SeriesTable::new(vec![d("2024-01-01"), d("2024-01-02")]);
        let err = table.set_column("close", vec![1.0]).unwrap_err();
        assert!(matches!(err, CoreError::ColumnLength { .. }));
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut table = make_table(&[d("2024-01-01")], &[1.0]);
        table.set_column("close", vec![2.0]).unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.column("close").unwrap(), &[2.0]);
    }

    #[test]
    fn test_sort_puts_missing_dates_last_and_is_stable() {
        let mut table = make_table(
            &[d("2024-01-03"), None, d("2024-01-01"), d("2024-01-01")],
            &[3.0, 9.0, 1.0, 2.0],
        );
        assert!(table.sort_by_timestamp());
        assert_eq!(
            table.timestamps(),
            &[d("2024-01-01"), d("2024-01-01"), d("2024-01-03"), None]
        );
        // ties keep input order
        assert_eq!(table.column("close").unwrap(), &[1.0, 2.0, 3.0, 9.0]);
        assert!(!table.sort_by_timestamp());
    }

    #[test]
    fn test_fill_missing_covers_interior_and_edges() {
        let mut table = make_table(
            &[None, d("2024-01-02"), None, d("2024-01-04")],
            &[f64::NAN, 2.0, f64::NAN, 4.0],
        );
        let filled = table.fill_missing();
        // leading date backward-filled, interior date forward-filled,
        // leading cell backward-filled, interior cell forward-filled
        assert_eq!(filled, 4);
        assert_eq!(
            table.timestamps(),
            &[d("2024-01-02"), d("2024-01-02"), d("2024-01-02"), d("2024-01-04")]
        );
        assert_eq!(table.column("close").unwrap(), &[2.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn test_fill_missing_leaves_all_missing_column_untouched() {
        let mut table = make_table(&[d("2024-01-01"), d("2024-01-02")], &[f64::NAN, f64::NAN]);
        assert_eq!(table.fill_missing(), 0);
        assert!(table.column("close").unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut table = make_table(
            &[d("2024-01-01"), d("2024-01-01"), d("2024-01-02")],
            &[1.0, 99.0, 2.0],
        );
        assert_eq!(table.dedup_by_timestamp(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("close").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_replace_infinite() {
        let mut table = make_table(
            &[d("2024-01-01"), d("2024-01-02"), d("2024-01-03")],
            &[f64::INFINITY, f64::NEG_INFINITY, 1.0],
        );
        assert_eq!(table.replace_infinite(), 2);
        let close = table.column("close").unwrap();
        assert!(close[0].is_nan());
        assert!(close[1].is_nan());
        assert_eq!(close[2], 1.0);
    }

    #[test]
    fn test_drop_column() {
        let mut table = make_table(&[d("2024-01-01")], &[1.0]);
        assert!(table.drop_column("close"));
        assert!(!table.drop_column("close"));
        assert_eq!(table.column_count(), 0);
    }
}
