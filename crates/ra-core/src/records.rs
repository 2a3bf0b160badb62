//! Typed records for the raw reference tables and the derived iteration table.
//!
//! Field names match the CSV column headers so the records deserialize
//! directly with `csv` + `serde`. Raw tables are read-only to the pipeline;
//! [`WeatherIteration`] is produced by the draw engine or the sync builder and
//! never mutated afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{date_from_parts, weekday_rule, DayType};
use crate::error::RaResult;

/// One historical daily observation used to classify weather regimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub year: i32,
    pub month: u32,
    pub day_of_month: u32,
    #[serde(default)]
    pub day_type: Option<DayType>,
    pub value: f64,
}

impl DailyObservation {
    pub fn date(&self) -> RaResult<NaiveDate> {
        date_from_parts(self.year, self.month, self.day_of_month)
    }

    /// Day type as recorded, falling back to the weekday rule.
    pub fn resolved_day_type(&self) -> RaResult<DayType> {
        match self.day_type {
            Some(day_type) => Ok(day_type),
            None => Ok(weekday_rule(self.date()?)),
        }
    }
}

/// Half-open `[lower, upper)` value range mapped to a bin for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinThreshold {
    pub month: u32,
    #[serde(alias = "weather_bin", alias = "hydro_bin")]
    pub bin: u32,
    pub lower: f64,
    pub upper: f64,
}

impl BinThreshold {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value < self.upper
    }
}

/// Bin assignment of one historical day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherBin {
    pub weather_bins_id: u32,
    pub year: i32,
    pub month: u32,
    pub day_of_month: u32,
    pub day_type: DayType,
    pub weather_bin: u32,
}

impl WeatherBin {
    pub fn date(&self) -> RaResult<NaiveDate> {
        date_from_parts(self.year, self.month, self.day_of_month)
    }
}

/// Monthly hydrological observation used to classify hydro years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroObservation {
    pub year: i32,
    pub month: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydroYearBin {
    pub year: i32,
    pub month: u32,
    pub hydro_bin: u32,
}

/// Historical monthly operating limits of one hydro project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroMonthParams {
    pub project: String,
    pub year: i32,
    pub month: u32,
    pub average_power_fraction: f64,
    pub min_power_fraction: f64,
    pub max_power_fraction: f64,
}

/// One hourly value of a raw unit-level series (load component, capacity
/// factor profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyValue {
    pub timeseries_name: String,
    pub year: i32,
    pub month: u32,
    pub day_of_month: u32,
    pub hour_of_day: u32,
    pub value: f64,
}

/// Sub-project generating unit feeding a project-level profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarProjectUnit {
    pub unit: String,
    pub project: String,
    pub unit_weight: f64,
    pub timeseries_name: String,
}

/// Load component feeding a load zone; the raw series is named after the
/// component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadZoneUnit {
    pub load_zone_unit: String,
    pub load_zone: String,
    pub unit_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageModelKind {
    /// Two-state Markov outage process, times the weather derate if any.
    Markov,
    /// Deterministic weather derate only.
    Derate,
    /// Always fully available.
    None,
}

/// Stochastic-process parameters for one outage-modeled unit-equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitAvailabilityParams {
    pub unit: String,
    pub project: String,
    pub unit_weight: f64,
    pub n_units: u32,
    pub outage_model_kind: OutageModelKind,
    pub forced_outage_rate: f64,
    /// Expected outage duration in hours.
    pub mean_time_to_repair: f64,
    /// Weather-derate profile name, shared by units with identical exposure.
    #[serde(default)]
    pub timeseries_name: Option<String>,
    #[serde(default)]
    pub is_hybrid_storage: bool,
}

/// Deterministic multiplicative derate of a profile at one historical hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitWeatherDerate {
    pub timeseries_name: String,
    pub year: i32,
    pub month: u32,
    pub day_of_month: u32,
    pub hour_of_day: u32,
    pub availability_derate_weather: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationMode {
    /// One iteration per historical year, verbatim.
    Sync,
    /// Stratified resampling of historical days.
    MonteCarlo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinSequence {
    /// Each draw's bin comes from the stratum's bin frequencies.
    #[default]
    Independent,
    /// Each draw's bin is conditioned on the previous draw's bin.
    Markov,
}

/// Settings of one `(weather_bins_id, weather_draws_id)` group.
///
/// Owns the reproducibility contract: identical settings and identical bin
/// tables always yield an identical iteration set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDrawSettings {
    pub weather_bins_id: u32,
    pub weather_draws_id: u32,
    pub mode: IterationMode,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub iterations_seed: u64,
    #[serde(default = "default_iterations")]
    pub n_iterations: u32,
    #[serde(default = "default_consider_day_types")]
    pub consider_day_types: bool,
    #[serde(default)]
    pub study_year: Option<i32>,
    #[serde(default)]
    pub bin_sequence: BinSequence,
    #[serde(default)]
    pub sync_years: Option<Vec<i32>>,
}

fn default_iterations() -> u32 {
    1
}

fn default_consider_day_types() -> bool {
    true
}

impl WeatherDrawSettings {
    /// Stable label used for directories, manifests and error messages.
    pub fn group_label(&self) -> String {
        format!(
            "bins_{}_draws_{}",
            self.weather_bins_id, self.weather_draws_id
        )
    }
}

/// One resampled (or verbatim) day of one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherIteration {
    pub weather_bins_id: u32,
    pub weather_draws_id: u32,
    pub weather_iteration: u32,
    pub draw_number: u32,
    pub month: u32,
    pub day_type: DayType,
    /// Target bin; absent for sync iterations, which do no bin lookup.
    pub weather_day_bin: Option<u32>,
    /// Date of the synthetic calendar this draw stands for.
    pub study_calendar_date: NaiveDate,
    /// Historical date whose observations instantiate the draw.
    pub study_date: NaiveDate,
}
