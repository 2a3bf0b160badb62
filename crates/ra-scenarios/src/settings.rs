use anyhow::{anyhow, bail, Context, Result};
use ra_core::{IterationMode, PipelineStep, WeatherDrawSettings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::temporal::TemporalSettings;

/// One synthesizer run: inputs, binning schemes, draw groups and the
/// temporal structure handed to the optimization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub inputs: InputPaths,
    #[serde(default)]
    pub weather_binning: Vec<WeatherBinningSpec>,
    #[serde(default)]
    pub hydro_binning: Option<HydroBinningSpec>,
    #[serde(default)]
    pub draws: Vec<WeatherDrawSettings>,
    #[serde(default)]
    pub temporal: TemporalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,
    /// Worker threads; 0 means one per core.
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub verify_reproducibility: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_steps() -> Vec<String> {
    PipelineStep::ALL
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            steps: default_steps(),
            threads: 0,
            verify_reproducibility: false,
        }
    }
}

/// Raw table locations. Each one is only required by the steps that read it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputPaths {
    pub daily_weather: Option<PathBuf>,
    pub weather_bins: Option<PathBuf>,
    pub hydro_conditions: Option<PathBuf>,
    pub hydro_year_bins: Option<PathBuf>,
    pub hydro_params: Option<PathBuf>,
    pub var_profiles: Option<PathBuf>,
    pub var_project_units: Option<PathBuf>,
    pub load_profiles: Option<PathBuf>,
    pub load_zone_units: Option<PathBuf>,
    pub unit_availability: Option<PathBuf>,
    pub unit_weather_derates: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemeSpec {
    Thresholds { path: PathBuf },
    Quantiles { n_bins: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherBinningSpec {
    pub weather_bins_id: u32,
    pub scheme: SchemeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydroBinningSpec {
    pub scheme: SchemeSpec,
}

/// Load run settings, choosing the format by extension (`toml`, `yaml`/`yml`,
/// `json`; anything else is tried in that order). Relative paths inside the
/// file are resolved against the file's directory.
pub fn load_settings_from_path(path: &Path) -> Result<RunSettings> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading run settings '{}'", path.display()))?;
    let mut settings: RunSettings = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(&data).context("parsing run settings toml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing run settings yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing run settings json")?
        }
        _ => toml::from_str::<RunSettings>(&data)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_yaml::from_str(&data).map_err(anyhow::Error::from))
            .or_else(|_| serde_json::from_str(&data).map_err(anyhow::Error::from))
            .context("parsing run settings")?,
    };
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    settings.rebase(base);
    Ok(settings)
}

fn rebase_path(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl RunSettings {
    /// Resolve every relative path against `base`.
    pub fn rebase(&mut self, base: &Path) {
        rebase_path(base, &mut self.run.output_dir);
        let inputs = &mut self.inputs;
        for path in [
            &mut inputs.daily_weather,
            &mut inputs.weather_bins,
            &mut inputs.hydro_conditions,
            &mut inputs.hydro_year_bins,
            &mut inputs.hydro_params,
            &mut inputs.var_profiles,
            &mut inputs.var_project_units,
            &mut inputs.load_profiles,
            &mut inputs.load_zone_units,
            &mut inputs.unit_availability,
            &mut inputs.unit_weather_derates,
        ]
        .into_iter()
        .flatten()
        {
            rebase_path(base, path);
        }
        let schemes = self
            .weather_binning
            .iter_mut()
            .map(|b| &mut b.scheme)
            .chain(self.hydro_binning.iter_mut().map(|h| &mut h.scheme));
        for scheme in schemes {
            if let SchemeSpec::Thresholds { path } = scheme {
                rebase_path(base, path);
            }
        }
    }

    /// Parse the configured step names.
    pub fn selected_steps(&self) -> Result<BTreeSet<PipelineStep>> {
        let mut steps = BTreeSet::new();
        for name in &self.run.steps {
            let step = name.parse::<PipelineStep>().map_err(|e| anyhow!(e))?;
            steps.insert(step);
        }
        if steps.is_empty() {
            bail!("run.steps selects no pipeline step");
        }
        Ok(steps)
    }

    /// Directory holding one settings group's derived tables.
    pub fn group_dir(&self, group: &WeatherDrawSettings) -> PathBuf {
        self.run.output_dir.join(group.group_label())
    }

    pub fn binning_dir(&self) -> PathBuf {
        self.run.output_dir.join("binning")
    }
}

fn require_input(path: &Option<PathBuf>, name: &str, step: PipelineStep) -> Result<()> {
    if path.is_none() {
        bail!("step '{step}' needs inputs.{name}");
    }
    Ok(())
}

fn validate_scheme(scheme: &SchemeSpec, owner: &str) -> Result<()> {
    if let SchemeSpec::Quantiles { n_bins: 0 } = scheme {
        bail!("{owner}: quantile scheme needs n_bins >= 1");
    }
    Ok(())
}

/// Check the settings against the steps about to run. Nothing is read from
/// the input tables; this only rejects runs that cannot succeed.
pub fn validate(settings: &RunSettings, steps: &BTreeSet<PipelineStep>) -> Result<()> {
    let inputs = &settings.inputs;

    let mut bins_ids = HashSet::new();
    for spec in &settings.weather_binning {
        if !bins_ids.insert(spec.weather_bins_id) {
            bail!(
                "weather_bins_id {} has more than one [[weather_binning]] entry",
                spec.weather_bins_id
            );
        }
        validate_scheme(&spec.scheme, &format!("weather_binning {}", spec.weather_bins_id))?;
    }
    if let Some(hydro) = &settings.hydro_binning {
        validate_scheme(&hydro.scheme, "hydro_binning")?;
    }

    let needs_groups = steps.iter().any(|s| *s != PipelineStep::Binning);
    if needs_groups && settings.draws.is_empty() {
        bail!("selected steps need at least one [[draws]] group");
    }
    let mut groups = HashSet::new();
    for group in &settings.draws {
        let label = group.group_label();
        if !groups.insert((group.weather_bins_id, group.weather_draws_id)) {
            bail!("duplicate [[draws]] group {label}");
        }
        if group.n_iterations == 0 {
            bail!("{label}: n_iterations must be at least 1");
        }
        if group.mode == IterationMode::MonteCarlo && group.study_year.is_none() {
            bail!("{label}: monte_carlo mode needs a study_year");
        }
        if steps.contains(&PipelineStep::Draws)
            && !bins_ids.contains(&group.weather_bins_id)
            && inputs.weather_bins.is_none()
        {
            bail!(
                "{label}: weather_bins_id {} has no [[weather_binning]] entry and inputs.weather_bins is not set",
                group.weather_bins_id
            );
        }
    }

    for step in steps {
        match step {
            PipelineStep::Binning => {
                if settings.weather_binning.is_empty() && settings.hydro_binning.is_none() {
                    bail!("step 'binning' needs [[weather_binning]] or [hydro_binning]");
                }
                if !settings.weather_binning.is_empty() {
                    require_input(&inputs.daily_weather, "daily_weather", *step)?;
                }
                if settings.hydro_binning.is_some() {
                    require_input(&inputs.hydro_conditions, "hydro_conditions", *step)?;
                }
            }
            PipelineStep::Draws | PipelineStep::TemporalScenario => {}
            PipelineStep::Materialization => {
                let var = (&inputs.var_profiles, &inputs.var_project_units);
                let load = (&inputs.load_profiles, &inputs.load_zone_units);
                for (name, pair) in [("var", var), ("load", load)] {
                    if pair.0.is_some() != pair.1.is_some() {
                        bail!("step 'materialization': the {name} profile and mapping inputs must be given together");
                    }
                }
                if var.0.is_none() && load.0.is_none() {
                    bail!("step 'materialization' needs var or load profiles");
                }
            }
            PipelineStep::Hydro => {
                require_input(&inputs.hydro_params, "hydro_params", *step)?;
                let binned_here =
                    steps.contains(&PipelineStep::Binning) && settings.hydro_binning.is_some();
                if !binned_here && inputs.hydro_year_bins.is_none() {
                    bail!("step 'hydro' needs inputs.hydro_year_bins or a [hydro_binning] run");
                }
            }
            PipelineStep::Availability => {
                require_input(&inputs.unit_availability, "unit_availability", *step)?;
            }
        }
    }
    Ok(())
}
