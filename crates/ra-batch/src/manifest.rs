use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One derived table promoted into a group's output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    pub step: String,
    pub path: String,
    pub rows: usize,
    pub sha256: String,
}

/// Outcome of one `(weather_bins_id, weather_draws_id)` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group: String,
    pub weather_bins_id: u32,
    pub weather_draws_id: u32,
    pub status: String,
    pub error: Option<String>,
    /// Error kind when the failure came from the generators.
    pub error_kind: Option<String>,
    pub steps_completed: Vec<String>,
    pub iteration_fingerprint: Option<String>,
    pub files: Vec<OutputFile>,
}

impl GroupRecord {
    pub fn succeeded(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub created_at: DateTime<Utc>,
    pub output_dir: String,
    pub steps: Vec<String>,
    pub reused_steps: Vec<String>,
    pub binning_files: Vec<OutputFile>,
    pub num_groups: usize,
    pub success: usize,
    pub failure: usize,
    pub groups: Vec<GroupRecord>,
}

pub fn write_run_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(manifest).context("serializing run manifest to JSON")?;
    fs::write(path, json).with_context(|| format!("writing run manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_run_manifest(path: &Path) -> Result<RunManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening run manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing run manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn manifest_writes_and_reads_back() {
        let record = GroupRecord {
            group: "bins_1_draws_1".into(),
            weather_bins_id: 1,
            weather_draws_id: 1,
            status: "ok".into(),
            error: None,
            error_kind: None,
            steps_completed: vec!["draws".into()],
            iteration_fingerprint: Some("ab".into()),
            files: vec![OutputFile {
                step: "draws".into(),
                path: "out/bins_1_draws_1/weather_iterations.csv".into(),
                rows: 365,
                sha256: "cd".into(),
            }],
        };
        let manifest = RunManifest {
            created_at: Utc::now(),
            output_dir: "out".into(),
            steps: vec!["draws".into()],
            reused_steps: vec!["binning".into()],
            binning_files: Vec::new(),
            num_groups: 1,
            success: 1,
            failure: 0,
            groups: vec![record],
        };
        let tmp = NamedTempFile::new().unwrap();
        write_run_manifest(tmp.path(), &manifest).unwrap();
        let parsed = load_run_manifest(tmp.path()).unwrap();
        assert_eq!(parsed.groups[0].files[0].rows, 365);
        assert!(parsed.groups[0].succeeded());
    }
}
