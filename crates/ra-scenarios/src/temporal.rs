//! Temporal scenario assembler.
//!
//! Maps each realized iteration onto its own horizon so the optimization
//! engine treats iterations as independent simulation units.
//!
//! **Output structure:**
//! ```text
//! <group>/
//!   horizons.csv             # one horizon per iteration, first/last global timepoint
//!   timepoints.csv           # global timepoint -> iteration, draw, dates, hour, weight
//!   temporal_scenario.json   # counts, boundary, carry-over flag, iteration weight
//! ```
//!
//! Global timepoint ids run across iterations using the cumulative length of
//! the preceding iterations, so iterations of unequal length (sync years that
//! straddle leap years) stay contiguous.

use chrono::NaiveDate;
use ra_core::{DayType, IterationSet, RaError, RaResult, WeatherDrawSettings, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};

/// How a horizon's last timepoint relates to its first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    #[default]
    Circular,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalSettings {
    #[serde(default = "default_scenario_id")]
    pub temporal_scenario_id: u32,
    #[serde(default)]
    pub boundary: Boundary,
    /// Link each horizon to the previous one so storage state carries over.
    #[serde(default)]
    pub carry_over_state: bool,
}

fn default_scenario_id() -> u32 {
    1
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            temporal_scenario_id: default_scenario_id(),
            boundary: Boundary::default(),
            carry_over_state: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonRow {
    pub horizon: u32,
    pub weather_iteration: u32,
    pub first_timepoint: u64,
    pub last_timepoint: u64,
    pub boundary: Boundary,
    pub linked_horizon: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimepointRow {
    pub timepoint: u64,
    pub weather_iteration: u32,
    pub local_timepoint: u32,
    pub draw_number: u32,
    pub study_calendar_date: NaiveDate,
    pub study_date: NaiveDate,
    pub hour_of_day: u32,
    pub month: u32,
    pub day_type: DayType,
    pub horizon: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalScenario {
    pub temporal_scenario_id: u32,
    pub weather_bins_id: u32,
    pub weather_draws_id: u32,
    pub iterations: u32,
    pub timepoints_per_iteration: Vec<u32>,
    pub total_timepoints: u64,
    pub boundary: Boundary,
    pub carry_over_state: bool,
    pub iteration_weight: f64,
}

#[derive(Debug, Clone)]
pub struct TemporalOutput {
    pub horizons: Vec<HorizonRow>,
    pub timepoints: Vec<TimepointRow>,
    pub scenario: TemporalScenario,
}

pub fn assemble_temporal_scenario(
    settings: &TemporalSettings,
    group: &WeatherDrawSettings,
    iterations: &IterationSet,
) -> RaResult<TemporalOutput> {
    if iterations.is_empty() {
        return Err(RaError::Validation(format!(
            "{}: no iterations to assemble",
            group.group_label()
        )));
    }
    let weight = 1.0 / iterations.len() as f64;
    let mut horizons = Vec::with_capacity(iterations.len());
    let mut timepoints = Vec::new();
    let mut per_iteration = Vec::with_capacity(iterations.len());
    let mut offset: u64 = 0;

    for (idx, iteration) in iterations.iterations.iter().enumerate() {
        let horizon = idx as u32 + 1;
        let hours = iteration.hours() as u64;
        if hours == 0 {
            return Err(RaError::Validation(format!(
                "{}: iteration {} has no days",
                group.group_label(),
                iteration.weather_iteration
            )));
        }
        for (day_index, day) in iteration.days.iter().enumerate() {
            for hour in 0..HOURS_PER_DAY {
                let local = ra_core::Iteration::timepoint(day_index, hour);
                timepoints.push(TimepointRow {
                    timepoint: offset + local as u64,
                    weather_iteration: iteration.weather_iteration,
                    local_timepoint: local,
                    draw_number: day.draw_number,
                    study_calendar_date: day.study_calendar_date,
                    study_date: day.study_date,
                    hour_of_day: hour as u32,
                    month: day.month,
                    day_type: day.day_type,
                    horizon,
                    weight,
                });
            }
        }
        horizons.push(HorizonRow {
            horizon,
            weather_iteration: iteration.weather_iteration,
            first_timepoint: offset + 1,
            last_timepoint: offset + hours,
            boundary: settings.boundary,
            linked_horizon: (settings.carry_over_state && horizon > 1).then(|| horizon - 1),
        });
        per_iteration.push(hours as u32);
        offset += hours;
    }

    tracing::info!(
        group = %group.group_label(),
        horizons = horizons.len(),
        timepoints = offset,
        "assembled temporal scenario"
    );
    Ok(TemporalOutput {
        scenario: TemporalScenario {
            temporal_scenario_id: settings.temporal_scenario_id,
            weather_bins_id: group.weather_bins_id,
            weather_draws_id: group.weather_draws_id,
            iterations: horizons.len() as u32,
            timepoints_per_iteration: per_iteration,
            total_timepoints: offset,
            boundary: settings.boundary,
            carry_over_state: settings.carry_over_state,
            iteration_weight: weight,
        },
        horizons,
        timepoints,
    })
}
