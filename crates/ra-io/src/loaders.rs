//! Typed loaders for the raw reference tables.
//!
//! Each loader reads one CSV table and rejects rows that break the table's
//! primary key or stated invariants immediately, naming the file, line and
//! key. Nothing is deferred to point-of-use failures.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::path::Path;

use anyhow::{Context, Result};
use ra_core::{
    date_from_parts, BinThreshold, DailyObservation, HourlyStore, HourlyValue, HydroMonthParams,
    HydroObservation, HydroYearBin, LoadZoneUnit, OutageModelKind, RaError,
    UnitAvailabilityParams, UnitWeatherDerate, VarProjectUnit, WeatherBin, WeatherIteration,
};

use crate::tables::read_table;

fn reject(path: &Path, idx: usize, reason: String) -> anyhow::Error {
    RaError::Validation(format!("{} line {}: {reason}", path.display(), idx + 2)).into()
}

/// Enforce primary-key uniqueness over `rows`.
fn ensure_unique<T, K, F>(path: &Path, rows: &[T], key: F) -> Result<()>
where
    K: Eq + Hash + std::fmt::Debug,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let k = key(row);
        if seen.contains(&k) {
            return Err(reject(path, idx, format!("duplicate key {k:?}")));
        }
        seen.insert(k);
    }
    Ok(())
}

fn check_month(path: &Path, idx: usize, month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(reject(path, idx, format!("month {month} outside 1..=12")));
    }
    Ok(())
}

fn check_date(path: &Path, idx: usize, year: i32, month: u32, day: u32) -> Result<()> {
    date_from_parts(year, month, day).map_err(|e| reject(path, idx, e.to_string()))?;
    Ok(())
}

fn check_weight(path: &Path, idx: usize, weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(reject(
            path,
            idx,
            format!("unit_weight {weight} must be finite and non-negative"),
        ));
    }
    Ok(())
}

pub fn load_daily_weather(path: &Path) -> Result<Vec<DailyObservation>> {
    let rows: Vec<DailyObservation> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_date(path, idx, row.year, row.month, row.day_of_month)?;
    }
    ensure_unique(path, &rows, |r| (r.year, r.month, r.day_of_month))?;
    Ok(rows)
}

/// Threshold tables: `lower < upper`, and ranges of one month never overlap.
pub fn load_thresholds(path: &Path) -> Result<Vec<BinThreshold>> {
    let rows: Vec<BinThreshold> = read_table(path)?;
    let mut by_month: BTreeMap<u32, Vec<(usize, &BinThreshold)>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        check_month(path, idx, row.month)?;
        if row.lower.is_nan() || row.upper.is_nan() || row.lower >= row.upper {
            return Err(reject(
                path,
                idx,
                format!("empty range [{}, {})", row.lower, row.upper),
            ));
        }
        by_month.entry(row.month).or_default().push((idx, row));
    }
    for ranges in by_month.values_mut() {
        ranges.sort_by(|a, b| a.1.lower.total_cmp(&b.1.lower));
        for pair in ranges.windows(2) {
            let (_, prev) = pair[0];
            let (idx, next) = pair[1];
            if next.lower < prev.upper {
                return Err(reject(
                    path,
                    idx,
                    format!(
                        "month {} range [{}, {}) overlaps [{}, {})",
                        next.month, next.lower, next.upper, prev.lower, prev.upper
                    ),
                ));
            }
        }
    }
    Ok(rows)
}

pub fn load_weather_bins(path: &Path) -> Result<Vec<WeatherBin>> {
    let rows: Vec<WeatherBin> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_date(path, idx, row.year, row.month, row.day_of_month)?;
    }
    ensure_unique(path, &rows, |r| {
        (r.weather_bins_id, r.year, r.month, r.day_of_month)
    })?;
    Ok(rows)
}

pub fn load_hydro_conditions(path: &Path) -> Result<Vec<HydroObservation>> {
    let rows: Vec<HydroObservation> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_month(path, idx, row.month)?;
    }
    ensure_unique(path, &rows, |r| (r.year, r.month))?;
    Ok(rows)
}

pub fn load_hydro_year_bins(path: &Path) -> Result<Vec<HydroYearBin>> {
    let rows: Vec<HydroYearBin> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_month(path, idx, row.month)?;
    }
    ensure_unique(path, &rows, |r| (r.year, r.month))?;
    Ok(rows)
}

/// Hydro limits must be finite here; their min/avg/max ordering is checked by
/// the hydro generator so that violations surface against the emitted row.
pub fn load_hydro_params(path: &Path) -> Result<Vec<HydroMonthParams>> {
    let rows: Vec<HydroMonthParams> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_month(path, idx, row.month)?;
        let values = [
            row.average_power_fraction,
            row.min_power_fraction,
            row.max_power_fraction,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(reject(
                path,
                idx,
                format!("non-finite power fraction for project '{}'", row.project),
            ));
        }
    }
    ensure_unique(path, &rows, |r| (r.project.clone(), r.year, r.month))?;
    Ok(rows)
}

/// Hourly unit-level profiles (`var_profiles`, `load_profiles`), indexed.
pub fn load_hourly_store(path: &Path) -> Result<HourlyStore> {
    let rows: Vec<HourlyValue> = read_table(path)?;
    HourlyStore::from_hourly(&rows).with_context(|| format!("indexing {}", path.display()))
}

pub fn load_var_project_units(path: &Path) -> Result<Vec<VarProjectUnit>> {
    let rows: Vec<VarProjectUnit> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_weight(path, idx, row.unit_weight)?;
    }
    ensure_unique(path, &rows, |r| (r.unit.clone(), r.project.clone()))?;
    Ok(rows)
}

pub fn load_load_zone_units(path: &Path) -> Result<Vec<LoadZoneUnit>> {
    let rows: Vec<LoadZoneUnit> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_weight(path, idx, row.unit_weight)?;
    }
    ensure_unique(path, &rows, |r| {
        (r.load_zone_unit.clone(), r.load_zone.clone())
    })?;
    Ok(rows)
}

pub fn load_unit_availability(path: &Path) -> Result<Vec<UnitAvailabilityParams>> {
    let rows: Vec<UnitAvailabilityParams> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        check_weight(path, idx, row.unit_weight)?;
        if row.n_units == 0 {
            return Err(reject(path, idx, format!("unit '{}' has n_units = 0", row.unit)));
        }
        if !(0.0..=1.0).contains(&row.forced_outage_rate) {
            return Err(reject(
                path,
                idx,
                format!(
                    "unit '{}' forced_outage_rate {} outside [0, 1]",
                    row.unit, row.forced_outage_rate
                ),
            ));
        }
        let needs_repair_time = row.outage_model_kind == OutageModelKind::Markov
            && row.forced_outage_rate > 0.0
            && row.forced_outage_rate < 1.0;
        if needs_repair_time && !(row.mean_time_to_repair >= 1.0) {
            return Err(reject(
                path,
                idx,
                format!(
                    "unit '{}' mean_time_to_repair {} must be at least one hour",
                    row.unit, row.mean_time_to_repair
                ),
            ));
        }
        if row.outage_model_kind == OutageModelKind::Derate && row.timeseries_name.is_none() {
            return Err(reject(
                path,
                idx,
                format!("derate unit '{}' has no timeseries_name", row.unit),
            ));
        }
    }
    ensure_unique(path, &rows, |r| r.unit.clone())?;
    Ok(rows)
}

pub fn load_unit_weather_derates(path: &Path) -> Result<HourlyStore> {
    let rows: Vec<UnitWeatherDerate> = read_table(path)?;
    for (idx, row) in rows.iter().enumerate() {
        if !(0.0..=1.0).contains(&row.availability_derate_weather) {
            return Err(reject(
                path,
                idx,
                format!(
                    "derate {} for '{}' outside [0, 1]",
                    row.availability_derate_weather, row.timeseries_name
                ),
            ));
        }
    }
    HourlyStore::from_derates(&rows).with_context(|| format!("indexing {}", path.display()))
}

/// Previously written iteration table of a settings group.
pub fn load_weather_iterations(path: &Path) -> Result<Vec<WeatherIteration>> {
    let rows: Vec<WeatherIteration> = read_table(path)?;
    ensure_unique(path, &rows, |r| (r.weather_iteration, r.draw_number))?;
    Ok(rows)
}
