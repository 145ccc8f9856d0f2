//! Tracing setup for pipeline binaries.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Initialize the fmt subscriber with an INFO default, honoring `RUST_LOG`.
///
/// Call once at binary startup.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();
}
