//! Per-group ledger of committed steps.
//!
//! Every derived table in a group directory belongs to the step that wrote it
//! and to the iteration set that step consumed. `group_state.json` records,
//! per step, the iteration fingerprint and the files of its last successful
//! commit. Steps that reuse earlier output check the ledger instead of
//! trusting whatever files happen to be on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ra_core::PipelineStep;
use serde::{Deserialize, Serialize};

pub const STATE_FILE: &str = "group_state.json";

/// Files a step may own in a group directory, whether or not the ledger
/// knows about them.
pub fn step_files(step: PipelineStep) -> &'static [&'static str] {
    match step {
        PipelineStep::Binning => &[],
        PipelineStep::Draws => &["weather_iterations.csv"],
        PipelineStep::Materialization => &["var_series.csv", "load_series.csv"],
        PipelineStep::Hydro => &["hydro_iterations.csv"],
        PipelineStep::Availability => &["availability.csv", "availability_summary.csv"],
        PipelineStep::TemporalScenario => {
            &["horizons.csv", "timepoints.csv", "temporal_scenario.json"]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub iteration_fingerprint: String,
    pub files: Vec<String>,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub steps: BTreeMap<String, StepRecord>,
}

impl GroupState {
    /// Read the ledger of `dir`; a directory without one has no committed steps.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(STATE_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let json =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(STATE_FILE);
        let tmp = dir.join(format!(".{STATE_FILE}.tmp"));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, step: PipelineStep) -> Option<&StepRecord> {
        self.steps.get(step.as_str())
    }

    pub fn record(&mut self, step: PipelineStep, fingerprint: &str, files: Vec<String>) {
        self.steps.insert(
            step.as_str().to_string(),
            StepRecord {
                iteration_fingerprint: fingerprint.to_string(),
                files,
                committed_at: Utc::now(),
            },
        );
    }

    /// Why `step`'s recorded output cannot feed a run over `fingerprint`,
    /// or `None` when it can.
    pub fn stale_reason(&self, dir: &Path, step: PipelineStep, fingerprint: &str) -> Option<String> {
        let Some(record) = self.get(step) else {
            return Some(format!("step '{step}' has not completed for this group"));
        };
        if record.iteration_fingerprint != fingerprint {
            return Some(format!(
                "step '{step}' ran against iterations {} but the current iterations are {fingerprint}",
                record.iteration_fingerprint
            ));
        }
        record
            .files
            .iter()
            .find(|file| !dir.join(file).exists())
            .map(|file| format!("step '{step}' output {file} is missing"))
    }

    /// Delete every file owned by `steps` and forget their records.
    pub fn invalidate(&mut self, dir: &Path, steps: &[PipelineStep]) -> Result<()> {
        for step in steps {
            let recorded = self
                .steps
                .remove(step.as_str())
                .map(|r| r.files)
                .unwrap_or_default();
            let known = step_files(*step).iter().map(|f| f.to_string());
            for file in recorded.into_iter().chain(known) {
                let path = dir.join(&file);
                if path.exists() {
                    fs::remove_file(&path)
                        .with_context(|| format!("removing stale {}", path.display()))?;
                    tracing::debug!(step = %step, file = %file, "removed stale output");
                }
            }
        }
        self.save(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_ledger_reads_as_empty() {
        let dir = tempdir().unwrap();
        let state = GroupState::load(dir.path()).unwrap();
        assert!(state.steps.is_empty());
        assert!(state
            .stale_reason(dir.path(), PipelineStep::Hydro, "abc")
            .is_some());
    }

    #[test]
    fn records_survive_a_reload() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("hydro_iterations.csv"), "x\n").unwrap();
        let mut state = GroupState::default();
        state.record(PipelineStep::Hydro, "abc", vec!["hydro_iterations.csv".into()]);
        state.save(dir.path()).unwrap();

        let loaded = GroupState::load(dir.path()).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded
            .stale_reason(dir.path(), PipelineStep::Hydro, "abc")
            .is_none());
        let reason = loaded
            .stale_reason(dir.path(), PipelineStep::Hydro, "def")
            .unwrap();
        assert!(reason.contains("abc"));
    }

    #[test]
    fn missing_file_makes_a_record_stale() {
        let dir = tempdir().unwrap();
        let mut state = GroupState::default();
        state.record(PipelineStep::Availability, "abc", vec!["availability.csv".into()]);
        let reason = state
            .stale_reason(dir.path(), PipelineStep::Availability, "abc")
            .unwrap();
        assert!(reason.contains("availability.csv"));
    }

    #[test]
    fn invalidate_removes_recorded_and_known_files() {
        let dir = tempdir().unwrap();
        for file in ["timepoints.csv", "horizons.csv", "hydro_iterations.csv"] {
            fs::write(dir.path().join(file), "x\n").unwrap();
        }
        let mut state = GroupState::default();
        state.record(PipelineStep::Hydro, "abc", vec!["hydro_iterations.csv".into()]);

        state
            .invalidate(dir.path(), &[PipelineStep::Hydro, PipelineStep::TemporalScenario])
            .unwrap();
        assert!(state.steps.is_empty());
        for file in ["timepoints.csv", "horizons.csv", "hydro_iterations.csv"] {
            assert!(!dir.path().join(file).exists(), "{file} survived");
        }
        assert!(GroupState::load(dir.path()).unwrap().steps.is_empty());
    }
}
