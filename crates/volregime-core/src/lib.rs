//! # volregime-core
//!
//! Shared foundation for the volatility-regime pipeline: the column-oriented
//! [`SeriesTable`] every stage consumes and produces, NaN-aware statistics
//! kernels, the pipeline column schema, and CSV/artifact persistence with
//! digest sidecars.
//!
//! ## Usage
//! ```ignore
//! use volregime_core::{io, stats, SeriesTable};
//!
//! let loaded = io::read_table(&path)?;
//! let close = loaded.table.require_column("close")?;
//! let ma = stats::rolling_mean(close, 5);
//! ```

pub mod error;
pub mod io;
pub mod observability;
pub mod schema;
pub mod stats;
pub mod table;

pub use error::CoreError;
pub use table::{Column, SeriesTable};
