//! Availability iteration generator.
//!
//! Combines a two-state forced-outage process with deterministic weather
//! derates and aggregates unit availability to project level.
//!
//! **Outage chain.** Each unit instance steps hourly between `available` and
//! `out`. The repair probability is `1 / MTTR`; the failure probability is
//! chosen so that the stationary outage fraction equals the forced outage
//! rate:
//!
//! ```text
//! p_repair = 1 / MTTR
//! p_fail   = FOR * p_repair / (1 - FOR)
//! ```
//!
//! The first hour's state is drawn from the stationary distribution. A unit
//! with `n_units > 1` runs `n_units` independent instances, each on its own
//! stream `stream_seed(seed, [bins_id, draws_id, iteration, unit_index,
//! instance])`, so the result does not depend on how rayon schedules units.
//!
//! **Hybrid storage.** Storage units of a hybrid project are resolved on
//! their own first; the generation side's availability then gates them.

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;
use ra_core::{
    stream_rng, HourlyStore, Iteration, IterationSet, OutageModelKind, RaError, RaResult,
    UnitAvailabilityParams, WeatherDrawSettings, HOURS_PER_DAY,
};
use serde::{Deserialize, Serialize};

/// Transition probabilities of one unit's outage process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutageChain {
    pub forced_outage_rate: f64,
    pub p_fail: f64,
    pub p_repair: f64,
}

impl OutageChain {
    pub fn from_rates(forced_outage_rate: f64, mean_time_to_repair: f64) -> RaResult<Self> {
        if !(0.0..=1.0).contains(&forced_outage_rate) {
            return Err(RaError::Validation(format!(
                "forced_outage_rate {forced_outage_rate} outside [0, 1]"
            )));
        }
        if forced_outage_rate == 0.0 || forced_outage_rate == 1.0 {
            return Ok(Self {
                forced_outage_rate,
                p_fail: if forced_outage_rate == 0.0 { 0.0 } else { 1.0 },
                p_repair: if forced_outage_rate == 0.0 { 1.0 } else { 0.0 },
            });
        }
        if !(mean_time_to_repair >= 1.0) {
            return Err(RaError::Validation(format!(
                "mean_time_to_repair {mean_time_to_repair} must be at least one hour"
            )));
        }
        let p_repair = 1.0 / mean_time_to_repair;
        let p_fail = forced_outage_rate * p_repair / (1.0 - forced_outage_rate);
        if p_fail > 1.0 {
            return Err(RaError::Validation(format!(
                "forced_outage_rate {forced_outage_rate} with mean_time_to_repair \
                 {mean_time_to_repair} implies a failure probability of {p_fail}"
            )));
        }
        Ok(Self {
            forced_outage_rate,
            p_fail,
            p_repair,
        })
    }

    fn is_degenerate(&self) -> bool {
        self.forced_outage_rate == 0.0 || self.forced_outage_rate == 1.0
    }

    /// Hourly availability of one instance; `true` means available.
    ///
    /// Degenerate rates (0 or 1) return a constant path without drawing.
    pub fn simulate<R: Rng>(&self, hours: usize, rng: &mut R) -> Vec<bool> {
        if self.is_degenerate() {
            return vec![self.forced_outage_rate == 0.0; hours];
        }
        let mut path = Vec::with_capacity(hours);
        let mut available = rng.gen::<f64>() >= self.forced_outage_rate;
        for _ in 0..hours {
            path.push(available);
            available = if available {
                rng.gen::<f64>() >= self.p_fail
            } else {
                rng.gen::<f64>() < self.p_repair
            };
        }
        path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRow {
    pub project: String,
    pub weather_iteration: u32,
    pub timepoint: u32,
    pub availability_derate: f64,
    pub hyb_stor_availability_derate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySummaryRow {
    pub project: String,
    pub weather_iteration: u32,
    pub timepoints: u32,
    pub mean_availability_derate: f64,
    pub mean_hyb_stor_availability_derate: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AvailabilityOutput {
    pub rows: Vec<AvailabilityRow>,
    pub summary: Vec<AvailabilitySummaryRow>,
}

struct PreparedUnit<'a> {
    index: usize,
    params: &'a UnitAvailabilityParams,
    chain: OutageChain,
}

struct ProjectUnits<'a> {
    name: &'a str,
    generation: Vec<usize>,
    storage: Vec<usize>,
}

fn derate_factor(
    unit: &UnitAvailabilityParams,
    derates: &HourlyStore,
    iteration: &Iteration,
    hour_index: usize,
) -> RaResult<f64> {
    let day = &iteration.days[hour_index / HOURS_PER_DAY];
    let hour = (hour_index % HOURS_PER_DAY) as u32;
    match (unit.outage_model_kind, unit.timeseries_name.as_deref()) {
        (OutageModelKind::None, _) => Ok(1.0),
        (OutageModelKind::Markov, None) => Ok(1.0),
        (OutageModelKind::Markov, Some(name)) if !derates.has_series(name) => Ok(1.0),
        (_, Some(name)) => derates.require(name, day.study_date, hour),
        (OutageModelKind::Derate, None) => Err(RaError::MissingData {
            series: "unit_weather_derates".into(),
            key: format!("unit {} has no derate profile", unit.unit),
        }),
    }
}

/// Hourly availability fraction of one unit over one iteration.
fn simulate_unit(
    settings: &WeatherDrawSettings,
    unit: &PreparedUnit<'_>,
    iteration: &Iteration,
    derates: &HourlyStore,
) -> RaResult<Vec<f64>> {
    let hours = iteration.hours();
    let params = unit.params;
    let mut available = vec![params.n_units; hours];
    if params.outage_model_kind == OutageModelKind::Markov && !unit.chain.is_degenerate() {
        available.iter_mut().for_each(|a| *a = 0);
        for instance in 0..params.n_units {
            let mut rng = stream_rng(
                settings.seed,
                &[
                    settings.weather_bins_id as u64,
                    settings.weather_draws_id as u64,
                    iteration.weather_iteration as u64,
                    unit.index as u64,
                    instance as u64,
                ],
            );
            for (count, up) in available.iter_mut().zip(unit.chain.simulate(hours, &mut rng)) {
                *count += up as u32;
            }
        }
    } else if params.outage_model_kind == OutageModelKind::Markov
        && unit.chain.forced_outage_rate == 1.0
    {
        available.iter_mut().for_each(|a| *a = 0);
    }
    let n_units = params.n_units as f64;
    available
        .into_iter()
        .enumerate()
        .map(|(h, count)| -> RaResult<f64> {
            Ok(count as f64 / n_units * derate_factor(params, derates, iteration, h)?)
        })
        .collect()
}

fn weighted_mean(
    project: &str,
    members: &[usize],
    units: &[PreparedUnit<'_>],
    series: &[Vec<f64>],
    hours: usize,
) -> RaResult<Vec<f64>> {
    let total: f64 = members.iter().map(|i| units[*i].params.unit_weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(RaError::WeightConfiguration {
            entity: project.to_string(),
            reason: format!("availability unit weights sum to {total}"),
        });
    }
    let mut out = vec![0.0; hours];
    for i in members {
        let w = units[*i].params.unit_weight;
        for (acc, v) in out.iter_mut().zip(&series[*i]) {
            *acc += w * v;
        }
    }
    out.iter_mut().for_each(|v| *v /= total);
    Ok(out)
}

fn check_fraction(project: &str, iteration: u32, timepoint: u32, value: f64) -> RaResult<f64> {
    const SLACK: f64 = 1e-9;
    if !(-SLACK..=1.0 + SLACK).contains(&value) {
        return Err(RaError::Validation(format!(
            "availability of {project} iteration {iteration} timepoint {timepoint} is {value}, outside [0, 1]"
        )));
    }
    Ok(value.clamp(0.0, 1.0))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Simulate availability for every iteration of one settings group.
///
/// Rows are ordered by iteration, project (first appearance in `units`) and
/// timepoint.
pub fn generate_availability(
    settings: &WeatherDrawSettings,
    iterations: &IterationSet,
    units: &[UnitAvailabilityParams],
    derates: &HourlyStore,
) -> RaResult<AvailabilityOutput> {
    let prepared: Vec<PreparedUnit<'_>> = units
        .iter()
        .enumerate()
        .map(|(index, params)| {
            let chain = match params.outage_model_kind {
                OutageModelKind::Markov => {
                    OutageChain::from_rates(params.forced_outage_rate, params.mean_time_to_repair)
                        .map_err(|e| match e {
                            RaError::Validation(msg) => {
                                RaError::Validation(format!("unit {}: {msg}", params.unit))
                            }
                            other => other,
                        })?
                }
                _ => OutageChain::from_rates(0.0, 1.0)?,
            };
            if params.outage_model_kind == OutageModelKind::Markov && chain.forced_outage_rate == 0.0
            {
                tracing::warn!(unit = %params.unit, "markov unit with zero forced outage rate");
            }
            if params.n_units == 0 {
                return Err(RaError::Validation(format!(
                    "unit {}: n_units must be at least 1",
                    params.unit
                )));
            }
            Ok(PreparedUnit {
                index,
                params,
                chain,
            })
        })
        .collect::<RaResult<_>>()?;

    let mut projects: Vec<ProjectUnits<'_>> = Vec::new();
    let mut position: BTreeMap<&str, usize> = BTreeMap::new();
    for unit in &prepared {
        let name = unit.params.project.as_str();
        let slot = *position.entry(name).or_insert_with(|| {
            projects.push(ProjectUnits {
                name,
                generation: Vec::new(),
                storage: Vec::new(),
            });
            projects.len() - 1
        });
        if unit.params.is_hybrid_storage {
            projects[slot].storage.push(unit.index);
        } else {
            projects[slot].generation.push(unit.index);
        }
    }

    let mut output = AvailabilityOutput::default();
    for iteration in &iterations.iterations {
        let hours = iteration.hours();
        let series: Vec<Vec<f64>> = prepared
            .par_iter()
            .map(|unit| simulate_unit(settings, unit, iteration, derates))
            .collect::<RaResult<_>>()?;

        for project in &projects {
            // storage is resolved independently before the generation gate applies
            let storage = if project.storage.is_empty() {
                None
            } else {
                Some(weighted_mean(project.name, &project.storage, &prepared, &series, hours)?)
            };
            let (generation, hybrid) = match (project.generation.is_empty(), storage) {
                (true, Some(storage)) => (storage.clone(), Some(storage)),
                (false, storage) => {
                    let generation =
                        weighted_mean(project.name, &project.generation, &prepared, &series, hours)?;
                    let gated = storage.map(|s| {
                        s.iter()
                            .zip(&generation)
                            .map(|(s, g)| s * g)
                            .collect::<Vec<f64>>()
                    });
                    (generation, gated)
                }
                (true, None) => {
                    return Err(RaError::WeightConfiguration {
                        entity: project.name.to_string(),
                        reason: "project has no availability units".into(),
                    })
                }
            };

            let mut values = Vec::with_capacity(hours);
            let mut hybrid_values = Vec::new();
            for h in 0..hours {
                let timepoint = Iteration::timepoint(h / HOURS_PER_DAY, h % HOURS_PER_DAY);
                let value =
                    check_fraction(project.name, iteration.weather_iteration, timepoint, generation[h])?;
                let hyb = hybrid
                    .as_ref()
                    .map(|s| check_fraction(project.name, iteration.weather_iteration, timepoint, s[h]))
                    .transpose()?;
                values.push(value);
                if let Some(v) = hyb {
                    hybrid_values.push(v);
                }
                output.rows.push(AvailabilityRow {
                    project: project.name.to_string(),
                    weather_iteration: iteration.weather_iteration,
                    timepoint,
                    availability_derate: value,
                    hyb_stor_availability_derate: hyb,
                });
            }
            output.summary.push(AvailabilitySummaryRow {
                project: project.name.to_string(),
                weather_iteration: iteration.weather_iteration,
                timepoints: hours as u32,
                mean_availability_derate: mean(&values),
                mean_hyb_stor_availability_derate: hybrid.as_ref().map(|_| mean(&hybrid_values)),
            });
        }
        tracing::debug!(
            group = %settings.group_label(),
            iteration = iteration.weather_iteration,
            units = prepared.len(),
            "simulated availability"
        );
    }
    tracing::info!(
        group = %settings.group_label(),
        rows = output.rows.len(),
        "generated availability iterations"
    );
    Ok(output)
}
