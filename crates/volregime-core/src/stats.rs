//! NaN-aware statistics kernels.
//!
//! Conventions shared by every caller:
//! - reductions skip NaN and return NaN when nothing remains;
//! - sample statistics use ddof = 1;
//! - rolling statistics require a fully-observed window (any NaN inside the
//!   window yields NaN) and update running moments instead of rescanning the
//!   window;
//! - `pct_change` keeps IEEE division: `x/0` is infinite, `0/0` is NaN.

use serde::{Deserialize, Serialize};

/// Mean over non-NaN values; NaN when none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Sample standard deviation (ddof = 1) over non-NaN values; NaN when fewer
/// than two remain.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let mut ss = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            ss += (v - mean) * (v - mean);
            count += 1;
        }
    }
    if count < 2 {
        f64::NAN
    } else {
        (ss / (count - 1) as f64).sqrt()
    }
}

/// Minimum over non-NaN values; NaN when none.
pub fn nan_min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v < acc { v } else { acc })
}

/// Maximum over non-NaN values; NaN when none.
pub fn nan_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v > acc { v } else { acc })
}

/// Empirical quantile with linear interpolation over the sorted non-NaN
/// values; NaN when none. `q` is clamped to [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Whole-sample z-score fit. The literal pipeline path fits this on the full
/// column; forecasting callers fit on a training prefix and apply forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScoreFit {
    pub mean: f64,
    pub std: f64,
}

impl ZScoreFit {
    pub fn fit(values: &[f64]) -> Self {
        Self {
            mean: nan_mean(values),
            std: nan_std(values),
        }
    }

    pub fn apply_value(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.apply_value(v)).collect()
    }
}

/// Z-scores against the sample's own mean and std.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    ZScoreFit::fit(values).apply(values)
}

/// Fractional change over `periods` rows: `v[i] / v[i - periods] - 1`.
/// The first `periods` rows are NaN.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    for i in periods..n {
        out[i] = values[i] / values[i - periods] - 1.0;
    }
    out
}

/// Running first and second moments over a sliding window, updated by
/// Welford's formulas with removal. NaN values never enter the moments;
/// callers gate on their own NaN count to require full windows.
#[derive(Debug, Clone, Copy, Default)]
struct RollingMoments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RollingMoments {
    fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn remove(&mut self, x: f64) {
        if self.count <= 1 {
            *self = Self::default();
            return;
        }
        let count_new = self.count - 1;
        let mean_new = self.mean - (x - self.mean) / count_new as f64;
        self.m2 -= (x - self.mean) * (x - mean_new);
        self.mean = mean_new;
        self.count = count_new;
    }

    fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            f64::NAN
        } else {
            // m2 can drift slightly negative after many removals
            (self.m2 / (self.count as f64 - 1.0)).max(0.0)
        }
    }
}

/// Rolling mean requiring a fully-observed window.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || window > n {
        return out;
    }
    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for i in 0..n {
        let v = values[i];
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= window {
            let old = values[i - window];
            if old.is_nan() {
                nan_count -= 1;
            } else {
                sum -= old;
            }
        }
        if i + 1 >= window && nan_count == 0 {
            out[i] = sum / window as f64;
        }
    }
    out
}

/// Rolling sample standard deviation requiring a fully-observed window.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window < 2 || window > n {
        return out;
    }
    let mut moments = RollingMoments::default();
    let mut nan_count = 0usize;
    for i in 0..n {
        let v = values[i];
        if v.is_nan() {
            nan_count += 1;
        } else {
            moments.add(v);
        }
        if i >= window {
            let old = values[i - window];
            if old.is_nan() {
                nan_count -= 1;
            } else {
                moments.remove(old);
            }
        }
        if i + 1 >= window && nan_count == 0 {
            out[i] = moments.sample_variance().sqrt();
        }
    }
    out
}

/// Paired running moments for rolling correlation.
#[derive(Debug, Clone, Copy, Default)]
struct RollingCoMoments {
    count: usize,
    mean_x: f64,
    mean_y: f64,
    m2x: f64,
    m2y: f64,
    cxy: f64,
}

impl RollingCoMoments {
    fn add(&mut self, x: f64, y: f64) {
        self.count += 1;
        let n = self.count as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        self.m2x += dx * (x - self.mean_x);
        let dy = y - self.mean_y;
        self.mean_y += dy / n;
        self.m2y += dy * (y - self.mean_y);
        self.cxy += dx * (y - self.mean_y);
    }

    fn remove(&mut self, x: f64, y: f64) {
        if self.count <= 1 {
            *self = Self::default();
            return;
        }
        let count_new = (self.count - 1) as f64;
        let mean_x_new = self.mean_x - (x - self.mean_x) / count_new;
        let mean_y_new = self.mean_y - (y - self.mean_y) / count_new;
        self.m2x -= (x - self.mean_x) * (x - mean_x_new);
        self.m2y -= (y - self.mean_y) * (y - mean_y_new);
        self.cxy -= (x - mean_x_new) * (y - self.mean_y);
        self.mean_x = mean_x_new;
        self.mean_y = mean_y_new;
        self.count -= 1;
    }

    fn correlation(&self) -> f64 {
        let denom = (self.m2x * self.m2y).sqrt();
        self.cxy / denom
    }
}

/// Rolling Pearson correlation requiring a fully-observed window on both
/// sides. Degenerate windows (zero variance) yield NaN.
pub fn rolling_corr(x: &[f64], y: &[f64], window: usize) -> Vec<f64> {
    let n = x.len().min(y.len());
    let mut out = vec![f64::NAN; n];
    if window < 2 || window > n {
        return out;
    }
    let mut moments = RollingCoMoments::default();
    let mut nan_count = 0usize;
    for i in 0..n {
        let (xv, yv) = (x[i], y[i]);
        if xv.is_nan() || yv.is_nan() {
            nan_count += 1;
        } else {
            moments.add(xv, yv);
        }
        if i >= window {
            let (xo, yo) = (x[i - window], y[i - window]);
            if xo.is_nan() || yo.is_nan() {
                nan_count -= 1;
            } else {
                moments.remove(xo, yo);
            }
        }
        if i + 1 >= window && nan_count == 0 {
            out[i] = moments.correlation();
        }
    }
    out
}
