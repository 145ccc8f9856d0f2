//! Feature engineering for volatility regime prediction.
//!
//! Builds the supervised target (volatility above its whole-sample
//! mean + std) and five feature families over a processed table: price,
//! volume, volatility, calendar, and rolling-correlation interactions.
//! The merged table carries the date index, 61 feature columns, and the
//! target as the last column.

use thiserror::Error;

use volregime_core::CoreError;

mod assembler;
mod families;
mod target;

pub use assembler::{engineer_features, write_features_csv, FeatureSet};
pub use families::{
    interaction_features, price_features, time_features, volatility_features, volume_features,
};
pub use target::TargetFit;

/// Errors from feature assembly.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature input column not found: {0}")]
    MissingColumn(String),

    #[error("table error: {0}")]
    Table(#[from] CoreError),
}
