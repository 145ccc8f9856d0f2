//! High-volatility target.

use serde::{Deserialize, Serialize};

use volregime_core::stats;

/// Whole-sample threshold for the high-volatility target: mean plus one
/// sample standard deviation, fitted once and then applied to any series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetFit {
    pub threshold: f64,
}

impl TargetFit {
    pub fn fit(values: &[f64]) -> Self {
        Self {
            threshold: stats::nan_mean(values) + stats::nan_std(values),
        }
    }

    /// 1.0 strictly above the threshold, else 0.0. NaN is not high
    /// volatility.
    pub fn apply_value(&self, value: f64) -> f64 {
        if value > self.threshold {
            1.0
        } else {
            0.0
        }
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.apply_value(v)).collect()
    }
}
