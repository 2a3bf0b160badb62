//! Pipeline orchestration: step planning, per-group execution, parallel
//! fan-out across settings groups and the run manifest.

pub mod fingerprint;
pub mod inputs;
pub mod manifest;
pub mod pipeline;
pub mod runner;
pub mod state;

pub use fingerprint::{compute_sha256, fingerprint_rows};
pub use inputs::{load_inputs, BinnedTables, MappedProfiles, RawInputs};
pub use manifest::{load_run_manifest, write_run_manifest, GroupRecord, OutputFile, RunManifest};
pub use pipeline::{plan_steps, step_and_dependents, StepPlan};
pub use runner::{run_pipeline, RunSummary, ITERATIONS_FILE, MANIFEST_FILE};
pub use state::{step_files, GroupState, StepRecord, STATE_FILE};
