//! Column names and window constants shared across the pipeline.
//!
//! Every stage addresses columns by these names; derived columns are built
//! with the `*_name` helpers so producers and consumers cannot drift apart.

pub const TIMESTAMP: &str = "timestamp";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const LOG_RETURNS: &str = "log_returns";
pub const REALIZED_VOLATILITY: &str = "realized_volatility";

/// Columns every raw input must carry: the date index plus seven numeric series.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    TIMESTAMP,
    OPEN,
    HIGH,
    LOW,
    CLOSE,
    VOLUME,
    LOG_RETURNS,
    REALIZED_VOLATILITY,
];

/// Price columns checked for sign and OHLC consistency.
pub const PRICE_COLUMNS: [&str; 4] = [OPEN, HIGH, LOW, CLOSE];

/// Provider artifacts dropped during cleaning when present.
pub const COSMETIC_COLUMNS: [&str; 2] = ["dividends", "stock_splits"];

/// Enhancement columns that receive a z-score twin named `{col}_normalized`.
pub const NORMALIZED_COLUMNS: [&str; 10] = [
    VOLUME,
    "daily_range",
    "price_change",
    "price_volatility",
    "volume_ratio",
    "volatility_ratio",
    "price_trend",
    "volume_trend",
    "return_momentum",
    "volatility_momentum",
];

pub const NORMALIZED_SUFFIX: &str = "_normalized";

/// Horizons (rows) for change-style features.
pub const CHANGE_HORIZONS: [usize; 4] = [1, 3, 5, 10];

/// Rolling windows (rows) for windowed features.
pub const FEATURE_WINDOWS: [usize; 3] = [5, 10, 20];

/// Window for the rolling interaction correlations.
pub const INTERACTION_WINDOW: usize = 5;

/// Short and long rolling windows used by the enhancement stage.
pub const ENHANCE_SHORT_WINDOW: usize = 5;
pub const ENHANCE_LONG_WINDOW: usize = 20;

/// String regime-label column in the labeled table.
pub const REGIME_COLUMN: &str = "vol_regime";

/// Binary target column in the assembled feature table.
pub const TARGET_COLUMN: &str = "volatility_regime";

/// Name with a horizon/window suffix, e.g. `price_change_3d`.
pub fn windowed_name(stem: &str, window: usize) -> String {
    format!("{stem}_{window}d")
}

/// Rolling-mean name used by the enhancement stage, e.g. `volatility_ma_7`.
pub fn ma_name(stem: &str, window: usize) -> String {
    format!("{stem}_ma_{window}")
}

/// Z-score twin name, e.g. `volume_normalized`.
pub fn normalized_name(stem: &str) -> String {
    format!("{stem}{NORMALIZED_SUFFIX}")
}

const _: () = assert!(REQUIRED_COLUMNS.len() == PRICE_COLUMNS.len() + 4);
const _: () = assert!(NORMALIZED_COLUMNS.len() == 10);
