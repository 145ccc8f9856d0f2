//! # volregime-gates
//!
//! Data-quality gate for a raw single-asset series: validate, repair,
//! enhance, normalize, persist. The gate accumulates per-check diagnostics
//! into a [`QualityReport`]; structure, price, and volume failures stop the
//! pipeline before anything is written, while the volatility stage flags and
//! caps but never gates.
//!
//! ## Usage
//! ```ignore
//! use volregime_gates::{run_quality_pipeline, QualityConfig};
//!
//! let outcome = run_quality_pipeline(&input, &output, &QualityConfig::default())?;
//! if !outcome.passed {
//!     for check in outcome.report.failed_checks() {
//!         eprintln!("{}: {}", check.name, check.message);
//!     }
//! }
//! ```

pub mod quality;

pub use quality::{
    clean, enhance, normalize, run_quality_pipeline, validate_price, validate_structure,
    validate_volatility, validate_volume, QualityConfig, QualityOutcome,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use volregime_core::CoreError;

/// Accumulated result of a quality-gate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Overall pass/fail
    pub passed: bool,
    /// Timestamp of the run
    pub timestamp: DateTime<Utc>,
    /// Individual check results, in stage order
    pub checks: Vec<CheckResult>,
    /// Summary message
    pub summary: String,
    /// Gate duration in milliseconds
    pub duration_ms: u64,
}

impl QualityReport {
    pub fn new() -> Self {
        Self {
            passed: true,
            timestamp: Utc::now(),
            checks: Vec::new(),
            summary: String::new(),
            duration_ms: 0,
        }
    }

    /// Add a check result; a failed check fails the report.
    pub fn add_check(&mut self, check: CheckResult) {
        if !check.passed {
            self.passed = false;
        }
        self.checks.push(check);
    }

    /// Add a batch of checks in order.
    pub fn extend_checks(&mut self, checks: Vec<CheckResult>) {
        for check in checks {
            self.add_check(check);
        }
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Look up a check by name (first match).
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

impl Default for QualityReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Individual check result within the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name, prefixed with its stage (e.g. `price/negative_open`)
    pub name: String,
    /// Pass/fail
    pub passed: bool,
    /// Details/reason
    pub message: String,
    /// Optional metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

impl CheckResult {
    /// Create a passing check.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            metrics: None,
        }
    }

    /// Create a failing check.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            metrics: None,
        }
    }

    /// Attach metrics to the check.
    pub fn with_metrics(mut self, metrics: serde_json::Value) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Gate failure that is an error rather than a validation verdict.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("table error: {0}")]
    Table(#[from] CoreError),

    #[error("configuration error: {0}")]
    Config(String),
}
