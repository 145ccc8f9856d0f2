//! Equal-frequency regime bins.

use serde::{Deserialize, Serialize};

use volregime_core::stats;

use crate::LabelError;

/// Regime names for the default three-level split.
pub const THREE_LEVEL_NAMES: [&str; 3] = ["Low", "Medium", "High"];

/// Fitted regime bins: `count` right-closed intervals over `count + 1`
/// quantile cut points, with the lowest value included in the first bin.
/// The cuts are fitted once on a whole sample and can then be applied to any
/// value, including values the fit never saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeFit {
    cuts: Vec<f64>,
    names: Vec<String>,
}

impl RegimeFit {
    /// Fit `count` equal-frequency bins on `values`, ignoring NaN.
    ///
    /// Fails when the sample is empty or has too few distinct values to
    /// produce strictly increasing quantile edges.
    pub fn fit(values: &[f64], count: usize) -> Result<Self, LabelError> {
        if count == 0 {
            return Err(LabelError::InvalidRegimeCount(count));
        }
        let mut cuts = Vec::with_capacity(count + 1);
        for i in 0..=count {
            cuts.push(stats::quantile(values, i as f64 / count as f64));
        }
        if cuts.iter().any(|c| c.is_nan()) {
            return Err(LabelError::EmptyColumn);
        }
        for pair in cuts.windows(2) {
            if pair[1] <= pair[0] {
                return Err(LabelError::TiedQuantiles(pair[0]));
            }
        }
        let names = if count == THREE_LEVEL_NAMES.len() {
            THREE_LEVEL_NAMES.iter().map(|s| s.to_string()).collect()
        } else {
            (1..=count).map(|i| format!("Regime_{i}")).collect()
        };
        Ok(Self { cuts, names })
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn cuts(&self) -> &[f64] {
        &self.cuts
    }

    /// Lowest fitted edge (the sample minimum at fit time).
    pub fn lower_bound(&self) -> f64 {
        self.cuts[0]
    }

    /// Highest fitted edge (the sample maximum at fit time).
    pub fn upper_bound(&self) -> f64 {
        self.cuts[self.cuts.len() - 1]
    }

    /// Name of a bin index. Panics on an out-of-range index.
    pub fn name_of(&self, bin: usize) -> &str {
        &self.names[bin]
    }

    /// Bin index for a value. `None` for NaN and for values outside the
    /// fitted range.
    pub fn apply(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let count = self.count();
        if value < self.cuts[0] || value > self.cuts[count] {
            return None;
        }
        for i in (1..count).rev() {
            if value > self.cuts[i] {
                return Some(i);
            }
        }
        Some(0)
    }

    /// Like [`RegimeFit::apply`] but snaps out-of-range values to the edge
    /// bins, for labeling data the fit never saw.
    pub fn apply_clamped(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        if value <= self.cuts[0] {
            return Some(0);
        }
        if value >= self.upper_bound() {
            return Some(self.count() - 1);
        }
        self.apply(value)
    }

    pub fn apply_all(&self, values: &[f64]) -> Vec<Option<usize>> {
        values.iter().map(|&v| self.apply(v)).collect()
    }
}
