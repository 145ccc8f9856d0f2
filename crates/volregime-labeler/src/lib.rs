//! Volatility regime labeling.
//!
//! Bins realized volatility into equal-frequency regimes fitted on the whole
//! sample, then annotates each row with run, duration, transition, and
//! boundary-distance columns. Labeling is a single in-memory step:
//!
//! ```ignore
//! let labeled = label_regimes(&table, &RegimeConfig::default())?;
//! write_labeled_csv(&output, &labeled)?;
//! ```

use thiserror::Error;

use volregime_core::CoreError;

mod fit;
mod labeler;

pub use fit::{RegimeFit, THREE_LEVEL_NAMES};
pub use labeler::{
    label_regimes, run_durations, run_groups, write_labeled_csv, RegimeConfig, RegimeLabeled,
    TransitionMatrix,
};

/// Errors from regime fitting and labeling.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("regime column not found: {0}")]
    MissingColumn(String),

    #[error("regime count must be positive, got {0}")]
    InvalidRegimeCount(usize),

    #[error("regime column has no finite values")]
    EmptyColumn,

    #[error("tied quantile edge at {0}: not enough distinct values for equal-frequency bins")]
    TiedQuantiles(f64),

    #[error("table error: {0}")]
    Table(#[from] CoreError),
}
