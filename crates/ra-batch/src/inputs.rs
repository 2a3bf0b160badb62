//! Bulk read of the raw tables a run needs.
//!
//! Everything is loaded once, before any group starts, and shared read-only
//! across the worker threads. Tables are only read when a selected step
//! consumes them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use ra_algo::RequiredSeries;
use ra_core::{
    HourlyStore, HydroMonthParams, HydroYearBin, IterationMode, PipelineStep,
    UnitAvailabilityParams, WeatherBin,
};
use ra_io::{
    load_hourly_store, load_hydro_params, load_hydro_year_bins, load_load_zone_units,
    load_unit_availability, load_unit_weather_derates, load_var_project_units, load_weather_bins,
};
use ra_scenarios::RunSettings;
use ra_ts::UnitMapping;

use crate::pipeline::StepPlan;

pub const WEATHER_BINS_FILE: &str = "weather_bins.csv";
pub const HYDRO_YEAR_BINS_FILE: &str = "hydro_year_bins.csv";

/// Bin tables produced by this run's binning step.
#[derive(Debug, Clone, Default)]
pub struct BinnedTables {
    pub weather_bins: Vec<WeatherBin>,
    pub hydro_year_bins: Option<Vec<HydroYearBin>>,
}

/// Hourly profiles plus the mapping that aggregates them.
#[derive(Debug, Clone)]
pub struct MappedProfiles {
    pub output_file: &'static str,
    pub mapping: UnitMapping,
    pub store: HourlyStore,
}

#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub weather_bins: Vec<WeatherBin>,
    pub hydro_year_bins: Vec<HydroYearBin>,
    pub hydro_params: Vec<HydroMonthParams>,
    pub var: Option<MappedProfiles>,
    pub load: Option<MappedProfiles>,
    pub units: Vec<UnitAvailabilityParams>,
    pub derates: HourlyStore,
}

impl RawInputs {
    /// Series a sync year has to cover in full: every profile a mapping reads.
    pub fn required_series(&self) -> Vec<RequiredSeries<'_>> {
        [&self.var, &self.load]
            .into_iter()
            .flatten()
            .flat_map(|profiles| {
                profiles
                    .mapping
                    .series_names()
                    .into_iter()
                    .map(move |name| RequiredSeries {
                        name,
                        store: &profiles.store,
                    })
            })
            .collect()
    }
}

fn load_profiles(
    profiles: Option<&Path>,
    mapping: Option<&Path>,
    output_file: &'static str,
    build: impl Fn(&Path) -> Result<UnitMapping>,
) -> Result<Option<MappedProfiles>> {
    match (profiles, mapping) {
        (Some(profiles), Some(mapping)) => Ok(Some(MappedProfiles {
            output_file,
            mapping: build(mapping)?,
            store: load_hourly_store(profiles)?,
        })),
        _ => Ok(None),
    }
}

fn reuse<T>(path: &Path, table: &str, load: impl Fn(&Path) -> Result<T>) -> Result<T> {
    tracing::info!(path = %path.display(), "reusing {table} from a previous run");
    load(path).with_context(|| {
        format!(
            "loading {table} written by a previous run; select the step that produces it or set its input path"
        )
    })
}

pub fn load_inputs(
    settings: &RunSettings,
    plan: &StepPlan,
    binned: Option<&BinnedTables>,
) -> Result<RawInputs> {
    let paths = &settings.inputs;
    let mut inputs = RawInputs::default();

    if plan.runs(PipelineStep::Draws) {
        inputs.weather_bins = match binned {
            Some(binned) if !binned.weather_bins.is_empty() => {
                let ids: HashSet<u32> = binned.weather_bins.iter().map(|b| b.weather_bins_id).collect();
                let mut rows = binned.weather_bins.clone();
                if let Some(path) = &paths.weather_bins {
                    rows.extend(
                        load_weather_bins(path)?
                            .into_iter()
                            .filter(|b| !ids.contains(&b.weather_bins_id)),
                    );
                }
                rows
            }
            _ => match &paths.weather_bins {
                Some(path) => load_weather_bins(path)?,
                None => reuse(
                    &settings.binning_dir().join(WEATHER_BINS_FILE),
                    "weather bins",
                    load_weather_bins,
                )?,
            },
        };
    }

    if plan.runs(PipelineStep::Hydro) {
        inputs.hydro_year_bins = match binned.and_then(|b| b.hydro_year_bins.clone()) {
            Some(rows) => rows,
            None => match &paths.hydro_year_bins {
                Some(path) => load_hydro_year_bins(path)?,
                None => reuse(
                    &settings.binning_dir().join(HYDRO_YEAR_BINS_FILE),
                    "hydro year bins",
                    load_hydro_year_bins,
                )?,
            },
        };
        if let Some(path) = &paths.hydro_params {
            inputs.hydro_params = load_hydro_params(path)?;
        }
    }

    let any_sync = settings.draws.iter().any(|g| g.mode == IterationMode::Sync);
    if plan.runs(PipelineStep::Materialization) || (plan.runs(PipelineStep::Draws) && any_sync) {
        inputs.var = load_profiles(
            paths.var_profiles.as_deref(),
            paths.var_project_units.as_deref(),
            "var_series.csv",
            |path| Ok(UnitMapping::from_var_projects(&load_var_project_units(path)?)?),
        )?;
        inputs.load = load_profiles(
            paths.load_profiles.as_deref(),
            paths.load_zone_units.as_deref(),
            "load_series.csv",
            |path| Ok(UnitMapping::from_load_zones(&load_load_zone_units(path)?)?),
        )?;
    }

    if plan.runs(PipelineStep::Availability) {
        if let Some(path) = &paths.unit_availability {
            inputs.units = load_unit_availability(path)?;
        }
        if let Some(path) = &paths.unit_weather_derates {
            inputs.derates = load_unit_weather_derates(path)?;
        }
    }
    Ok(inputs)
}
