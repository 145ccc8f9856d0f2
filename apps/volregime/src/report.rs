//! Run report assembly.
//!
//! One JSON report per pipeline run: stage summaries, output artifact
//! digests, and an overall pass flag, saved as `{run_id}.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use volregime_core::io::ArtifactDigest;

pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

/// Outcome of one pipeline stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub rows_in: usize,
    pub rows_out: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// A persisted artifact with its digest.
#[derive(Debug, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub path: String,
    pub sha256: String,
    pub bytes: usize,
}

impl From<&ArtifactDigest> for OutputArtifact {
    fn from(digest: &ArtifactDigest) -> Self {
        Self {
            path: digest.path.display().to_string(),
            sha256: digest.sha256.clone(),
            bytes: digest.bytes_len,
        }
    }
}

/// Full record of a pipeline run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub passed: bool,
    pub stages: Vec<StageSummary>,
    pub outputs: Vec<OutputArtifact>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            run_id: generate_run_id(),
            started_at: Utc::now(),
            finished_at: None,
            passed: false,
            stages: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn push_stage(&mut self, stage: StageSummary) {
        self.stages.push(stage);
    }

    pub fn push_output(&mut self, artifact: &ArtifactDigest) {
        self.outputs.push(artifact.into());
    }

    pub fn finish(&mut self, passed: bool) {
        self.passed = passed;
        self.finished_at = Some(Utc::now());
    }

    /// Save as `{run_id}.json` under the reports directory.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create reports dir: {}", dir.display()))?;
        let path = dir.join(format!("{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("could not write run report: {}", path.display()))?;
        info!("run report saved to: {}", path.display());
        Ok(path)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique run id: UTC timestamp plus a short random suffix.
pub fn generate_run_id() -> String {
    let now = Utc::now();
    format!(
        "{}_{}",
        now.format("%Y%m%d_%H%M%S"),
        &uuid::Uuid::new_v4().to_string()[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_id_shape() {
        let id = generate_run_id();
        // 20240101_120000_ab12cd34
        assert_eq!(id.len(), 24);
        assert_eq!(id.matches('_').count(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut report = RunReport::new();
        report.push_stage(StageSummary {
            stage: "quality".to_string(),
            passed: true,
            duration_ms: 12,
            rows_in: 100,
            rows_out: 99,
            detail: None,
        });
        report.finish(true);

        let path = report.save(dir.path()).unwrap();
        assert!(path.exists());
        let text = std::fs::read_to_string(&path).unwrap();
        let reloaded: RunReport = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded.schema_version, RUN_REPORT_SCHEMA_VERSION);
        assert_eq!(reloaded.run_id, report.run_id);
        assert!(reloaded.passed);
        assert_eq!(reloaded.stages.len(), 1);
        assert!(reloaded.finished_at.is_some());
    }
}
