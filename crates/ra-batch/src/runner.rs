use crate::fingerprint::{compute_sha256, fingerprint_rows};
use crate::inputs::{load_inputs, BinnedTables, RawInputs, HYDRO_YEAR_BINS_FILE, WEATHER_BINS_FILE};
use crate::manifest::{write_run_manifest, GroupRecord, OutputFile, RunManifest};
use crate::pipeline::{plan_steps, step_and_dependents, StepPlan};
use crate::state::GroupState;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use ra_algo::{
    bin_hydro_years, bin_weather_days, generate_availability, generate_hydro_iterations,
    generate_iterations, ClassificationScheme,
};
use ra_core::{IterationSet, PipelineStep, RaError, WeatherDrawSettings, WeatherIteration};
use ra_io::{
    load_daily_weather, load_hydro_conditions, load_thresholds, load_weather_iterations,
    StagedOutput,
};
use ra_scenarios::{assemble_temporal_scenario, validate, RunSettings, SchemeSpec};
use ra_ts::materialize;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ITERATIONS_FILE: &str = "weather_iterations.csv";
pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Summary returned after the run so callers can report per-group outcomes.
pub struct RunSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub groups: Vec<GroupRecord>,
}

impl RunSummary {
    /// Fail when any group failed, naming the first one.
    pub fn ensure_success(&self) -> Result<()> {
        match self.groups.iter().find(|g| !g.succeeded()) {
            None => Ok(()),
            Some(group) => Err(anyhow!(
                "{} of {} groups failed; first failure {}: {}",
                self.failure,
                self.groups.len(),
                group.group,
                group.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
}

fn scheme_from_spec(spec: &SchemeSpec) -> Result<ClassificationScheme> {
    Ok(match spec {
        SchemeSpec::Thresholds { path } => ClassificationScheme::Thresholds(load_thresholds(path)?),
        SchemeSpec::Quantiles { n_bins } => ClassificationScheme::Quantiles { n_bins: *n_bins },
    })
}

fn commit_step(
    stage: StagedOutput,
    step: PipelineStep,
    rows: &[usize],
    files: &mut Vec<OutputFile>,
) -> Result<()> {
    let promoted = stage.commit()?;
    for (path, rows) in promoted.iter().zip(rows) {
        files.push(OutputFile {
            step: step.to_string(),
            path: path.display().to_string(),
            rows: *rows,
            sha256: compute_sha256(path)?,
        });
    }
    Ok(())
}

/// Run the binning step for every configured scheme and write the bin
/// tables to `<output_dir>/binning/`.
fn run_binning(settings: &RunSettings, files: &mut Vec<OutputFile>) -> Result<BinnedTables> {
    let dir = settings.binning_dir();
    fs::create_dir_all(&dir).with_context(|| format!("creating '{}'", dir.display()))?;
    let mut stage = StagedOutput::begin(&dir, PipelineStep::Binning.as_str())?;
    let mut binned = BinnedTables::default();
    let mut rows = Vec::new();

    if !settings.weather_binning.is_empty() {
        let path = settings
            .inputs
            .daily_weather
            .as_ref()
            .ok_or_else(|| anyhow!("weather binning needs inputs.daily_weather"))?;
        let observations = load_daily_weather(path)?;
        for spec in &settings.weather_binning {
            let scheme = scheme_from_spec(&spec.scheme)?;
            let bins = bin_weather_days(spec.weather_bins_id, &observations, &scheme)
                .with_context(|| format!("binning weather for weather_bins_id {}", spec.weather_bins_id))?;
            binned.weather_bins.extend(bins);
        }
        stage.write_csv(WEATHER_BINS_FILE, &binned.weather_bins)?;
        rows.push(binned.weather_bins.len());
    }
    if let Some(hydro) = &settings.hydro_binning {
        let path = settings
            .inputs
            .hydro_conditions
            .as_ref()
            .ok_or_else(|| anyhow!("hydro binning needs inputs.hydro_conditions"))?;
        let scheme = scheme_from_spec(&hydro.scheme)?;
        let bins = bin_hydro_years(&load_hydro_conditions(path)?, &scheme)
            .context("binning hydro years")?;
        stage.write_csv(HYDRO_YEAR_BINS_FILE, &bins)?;
        rows.push(bins.len());
        binned.hydro_year_bins = Some(bins);
    }
    commit_step(stage, PipelineStep::Binning, &rows, files)?;
    Ok(binned)
}

/// Run the selected steps for every settings group.
///
/// **Algorithm:**
/// 1. Validate settings against the selected steps and order them with the step graph.
/// 2. Run binning once (it is shared by all groups), then bulk-load the raw tables.
/// 3. Fan groups out over a Rayon pool; each group runs its steps sequentially,
///    writing every step through a staging directory.
/// 4. Write `run_manifest.json` with per-group status, files, row counts and fingerprints.
pub fn run_pipeline(settings: &RunSettings, steps: &BTreeSet<PipelineStep>) -> Result<RunSummary> {
    validate(settings, steps)?;
    let plan = plan_steps(steps)?;
    let output_dir = &settings.run.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory '{}'", output_dir.display()))?;

    let mut binning_files = Vec::new();
    let binned = if plan.runs(PipelineStep::Binning) {
        Some(run_binning(settings, &mut binning_files)?)
    } else {
        None
    };
    let inputs = load_inputs(settings, &plan, binned.as_ref())?;

    // threads = 0 means one worker per core
    let thread_count = if settings.run.threads == 0 {
        num_cpus::get()
    } else {
        settings.run.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for settings groups")?;

    let groups: Vec<GroupRecord> = if plan.order().iter().all(|s| *s == PipelineStep::Binning) {
        Vec::new()
    } else {
        pool.install(|| {
            settings
                .draws
                .par_iter()
                .map(|group| run_group(group, settings, &plan, &inputs))
                .collect()
        })
    };

    let success = groups.iter().filter(|g| g.succeeded()).count();
    let failure = groups.len() - success;
    let manifest = RunManifest {
        created_at: Utc::now(),
        output_dir: output_dir.display().to_string(),
        steps: plan.order().iter().map(|s| s.to_string()).collect(),
        reused_steps: plan.reused().iter().map(|s| s.to_string()).collect(),
        binning_files,
        num_groups: groups.len(),
        success,
        failure,
        groups: groups.clone(),
    };
    let manifest_path = output_dir.join(MANIFEST_FILE);
    write_run_manifest(&manifest_path, &manifest)?;
    tracing::info!(success, failure, manifest = %manifest_path.display(), "run finished");
    Ok(RunSummary {
        success,
        failure,
        manifest_path,
        groups,
    })
}

#[derive(Default)]
struct GroupProgress {
    steps_completed: Vec<String>,
    iteration_fingerprint: Option<String>,
    files: Vec<OutputFile>,
    state: GroupState,
    running: Option<PipelineStep>,
}

impl GroupProgress {
    fn commit(
        &mut self,
        dir: &Path,
        stage: StagedOutput,
        step: PipelineStep,
        rows: &[usize],
    ) -> Result<()> {
        let fingerprint = self
            .iteration_fingerprint
            .clone()
            .ok_or_else(|| anyhow!("step '{step}' committed before the iterations were known"))?;
        let first_new = self.files.len();
        commit_step(stage, step, rows, &mut self.files)?;
        let names = self.files[first_new..]
            .iter()
            .filter_map(|f| Path::new(&f.path).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.state.record(step, &fingerprint, names);
        self.state.save(dir)?;
        self.steps_completed.push(step.to_string());
        tracing::debug!(step = %step, "step committed");
        Ok(())
    }
}

/// Execute one group; failures are captured in the record, never propagated.
fn run_group(
    group: &WeatherDrawSettings,
    settings: &RunSettings,
    plan: &StepPlan,
    inputs: &RawInputs,
) -> GroupRecord {
    let label = group.group_label();
    let mut progress = GroupProgress::default();
    let outcome = execute_group(group, settings, plan, inputs, &mut progress);
    let (status, error, error_kind) = match outcome {
        Ok(()) => ("ok".to_string(), None, None),
        Err(err) => {
            tracing::error!(group = %label, "group failed: {err:#}");
            if let Some(step) = progress.running {
                // a failed step and everything built on it no longer describe this group
                let dir = settings.group_dir(group);
                if let Err(cleanup) = progress.state.invalidate(&dir, &step_and_dependents(step)) {
                    tracing::warn!(group = %label, "removing outputs of failed step '{step}': {cleanup:#}");
                }
            }
            let kind = err.downcast_ref::<RaError>().map(|e| e.kind().to_string());
            ("error".to_string(), Some(format!("{err:#}")), kind)
        }
    };
    GroupRecord {
        group: label,
        weather_bins_id: group.weather_bins_id,
        weather_draws_id: group.weather_draws_id,
        status,
        error,
        error_kind,
        steps_completed: progress.steps_completed,
        iteration_fingerprint: progress.iteration_fingerprint,
        files: progress.files,
    }
}

fn iterations_for_group(
    group: &WeatherDrawSettings,
    settings: &RunSettings,
    plan: &StepPlan,
    inputs: &RawInputs,
    dir: &Path,
    progress: &mut GroupProgress,
) -> Result<Vec<WeatherIteration>> {
    let label = group.group_label();
    if !plan.runs(PipelineStep::Draws) {
        let path = dir.join(ITERATIONS_FILE);
        let rows = load_weather_iterations(&path)
            .with_context(|| format!("{label}: reusing iterations written by a previous run"))?;
        if let Some(foreign) = rows.iter().find(|r| {
            r.weather_bins_id != group.weather_bins_id || r.weather_draws_id != group.weather_draws_id
        }) {
            bail!(
                "{label}: {} holds rows of bins_{}_draws_{}",
                path.display(),
                foreign.weather_bins_id,
                foreign.weather_draws_id
            );
        }
        progress.iteration_fingerprint = Some(fingerprint_rows(&rows)?);
        return Ok(rows);
    }

    progress.running = Some(PipelineStep::Draws);
    let required = inputs.required_series();
    let rows = generate_iterations(group, &inputs.weather_bins, &required)?;
    let fingerprint = fingerprint_rows(&rows)?;
    if settings.run.verify_reproducibility {
        let again = fingerprint_rows(&generate_iterations(group, &inputs.weather_bins, &required)?)?;
        if fingerprint != again {
            return Err(RaError::ReproducibilityViolation {
                group: label,
                detail: format!("iteration fingerprint {fingerprint} became {again} on re-run"),
            }
            .into());
        }
        tracing::debug!(group = %label, "reproducibility check passed");
    }

    let unchanged = progress.state.stale_reason(dir, PipelineStep::Draws, &fingerprint).is_none();
    if !unchanged {
        // tables derived from the previous iteration set go before the new set lands
        progress.state.invalidate(dir, &step_and_dependents(PipelineStep::Draws))?;
    }
    progress.iteration_fingerprint = Some(fingerprint);
    let mut stage = StagedOutput::begin(dir, PipelineStep::Draws.as_str())?;
    stage.write_csv(ITERATIONS_FILE, &rows)?;
    progress.commit(dir, stage, PipelineStep::Draws, &[rows.len()])?;
    Ok(rows)
}

/// Fail unless every unselected upstream step of `step` has output recorded
/// against the current iterations. Reused draws are checked on load.
fn require_reused_outputs(
    group: &WeatherDrawSettings,
    plan: &StepPlan,
    step: PipelineStep,
    dir: &Path,
    progress: &GroupProgress,
) -> Result<()> {
    let Some(fingerprint) = progress.iteration_fingerprint.as_deref() else {
        bail!("{}: iterations not loaded before step '{step}'", group.group_label());
    };
    for dep in step.dependencies() {
        if *dep == PipelineStep::Draws || !plan.reused().contains(dep) {
            continue;
        }
        if let Some(reason) = progress.state.stale_reason(dir, *dep, fingerprint) {
            return Err(RaError::StaleUpstream {
                group: group.group_label(),
                reason,
            }
            .into());
        }
    }
    Ok(())
}

fn execute_group(
    group: &WeatherDrawSettings,
    settings: &RunSettings,
    plan: &StepPlan,
    inputs: &RawInputs,
    progress: &mut GroupProgress,
) -> Result<()> {
    let dir = settings.group_dir(group);
    fs::create_dir_all(&dir).with_context(|| format!("creating '{}'", dir.display()))?;
    progress.state = GroupState::load(&dir)?;

    let rows = iterations_for_group(group, settings, plan, inputs, &dir, progress)?;
    let set = IterationSet::from_rows(&rows)?;

    for step in plan.order() {
        if matches!(step, PipelineStep::Binning | PipelineStep::Draws) {
            continue;
        }
        progress.running = Some(*step);
        require_reused_outputs(group, plan, *step, &dir, progress)?;
        match step {
            PipelineStep::Binning | PipelineStep::Draws => {}
            PipelineStep::Materialization => {
                let mut stage = StagedOutput::begin(&dir, step.as_str())?;
                let mut counts = Vec::new();
                for profiles in [&inputs.var, &inputs.load].into_iter().flatten() {
                    let series = materialize(&set, &profiles.mapping, &profiles.store)?;
                    stage.write_csv(profiles.output_file, &series)?;
                    counts.push(series.len());
                }
                progress.commit(&dir, stage, *step, &counts)?;
            }
            PipelineStep::Hydro => {
                let hydro = generate_hydro_iterations(
                    group,
                    &set,
                    &inputs.hydro_year_bins,
                    &inputs.hydro_params,
                )?;
                let mut stage = StagedOutput::begin(&dir, step.as_str())?;
                stage.write_csv("hydro_iterations.csv", &hydro)?;
                progress.commit(&dir, stage, *step, &[hydro.len()])?;
            }
            PipelineStep::Availability => {
                let out = generate_availability(group, &set, &inputs.units, &inputs.derates)?;
                let mut stage = StagedOutput::begin(&dir, step.as_str())?;
                stage.write_csv("availability.csv", &out.rows)?;
                stage.write_csv("availability_summary.csv", &out.summary)?;
                progress.commit(&dir, stage, *step, &[out.rows.len(), out.summary.len()])?;
            }
            PipelineStep::TemporalScenario => {
                let temporal = assemble_temporal_scenario(&settings.temporal, group, &set)?;
                let mut stage = StagedOutput::begin(&dir, step.as_str())?;
                stage.write_csv("horizons.csv", &temporal.horizons)?;
                stage.write_csv("timepoints.csv", &temporal.timepoints)?;
                stage.write_json("temporal_scenario.json", &temporal.scenario)?;
                progress.commit(
                    &dir,
                    stage,
                    *step,
                    &[temporal.horizons.len(), temporal.timepoints.len(), 1],
                )?;
            }
        }
    }
    progress.running = None;
    tracing::info!(group = %group.group_label(), steps = progress.steps_completed.len(), "group finished");
    Ok(())
}
