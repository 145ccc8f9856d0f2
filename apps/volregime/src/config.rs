//! Pipeline configuration.
//!
//! One TOML file configures all three stages; every field has a default so an
//! empty file (or no file at all) runs the standard pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use volregime_gates::QualityConfig;
use volregime_labeler::RegimeConfig;

/// Root configuration for the pipeline CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub quality: QualityConfig,
    pub regime: RegimeConfig,
    pub paths: PathsConfig,
}

/// Output directory layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub processed_dir: PathBuf,
    pub features_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            processed_dir: PathBuf::from("data/processed"),
            features_dir: PathBuf::from("data/features"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl PathsConfig {
    /// Everything under one directory, for ad-hoc runs.
    pub fn rooted(dir: &Path) -> Self {
        Self {
            processed_dir: dir.to_path_buf(),
            features_dir: dir.to_path_buf(),
            reports_dir: dir.to_path_buf(),
        }
    }

    pub fn processed_path(&self, input: &Path) -> PathBuf {
        self.processed_dir
            .join(format!("{}_processed.csv", base_stem(input)))
    }

    pub fn labeled_path(&self, input: &Path) -> PathBuf {
        self.processed_dir
            .join(format!("{}_labeled.csv", base_stem(input)))
    }

    pub fn features_path(&self, input: &Path) -> PathBuf {
        self.features_dir
            .join(format!("{}_features.csv", base_stem(input)))
    }
}

/// File stem without a trailing `_processed` marker, so chained stages name
/// their outputs after the original series.
fn base_stem(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("series");
    stem.strip_suffix("_processed").unwrap_or(stem).to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("could not parse config file: {}", path.display()))
    }
}
