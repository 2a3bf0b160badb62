//! Weather and hydro-year binners.
//!
//! Both binners are pure functions from historical observations to one bin
//! label per record. They are total over their input: a value that the
//! classification scheme does not cover fails the whole binning with
//! [`RaError::ClassificationGap`] instead of falling into a default bin.

use std::collections::BTreeMap;

use ra_core::{
    BinThreshold, DailyObservation, HydroObservation, HydroYearBin, RaError, RaResult, WeatherBin,
};
use serde::{Deserialize, Serialize};

/// How observed values map to bins within a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassificationScheme {
    /// Explicit per-month half-open value ranges.
    Thresholds(Vec<BinThreshold>),
    /// Per-month empirical quantile bins, labelled `1..=n_bins` from low to high.
    Quantiles { n_bins: u32 },
}

struct Record {
    key: String,
    month: u32,
    value: f64,
}

fn classify(records: &[Record], scheme: &ClassificationScheme) -> RaResult<Vec<u32>> {
    if let Some(bad) = records.iter().find(|r| !r.value.is_finite()) {
        return Err(RaError::ClassificationGap {
            key: format!("{} has non-finite value {}", bad.key, bad.value),
        });
    }
    match scheme {
        ClassificationScheme::Thresholds(table) => classify_thresholds(records, table),
        ClassificationScheme::Quantiles { n_bins } => classify_quantiles(records, *n_bins),
    }
}

fn classify_thresholds(records: &[Record], table: &[BinThreshold]) -> RaResult<Vec<u32>> {
    let mut by_month: BTreeMap<u32, Vec<&BinThreshold>> = BTreeMap::new();
    for threshold in table {
        by_month.entry(threshold.month).or_default().push(threshold);
    }
    records
        .iter()
        .map(|record| {
            by_month
                .get(&record.month)
                .and_then(|ranges| ranges.iter().find(|t| t.contains(record.value)))
                .map(|t| t.bin)
                .ok_or_else(|| RaError::ClassificationGap {
                    key: format!(
                        "{} value {} is not covered by any month {} threshold",
                        record.key, record.value, record.month
                    ),
                })
        })
        .collect()
}

fn classify_quantiles(records: &[Record], n_bins: u32) -> RaResult<Vec<u32>> {
    if n_bins == 0 {
        return Err(RaError::Config("quantile binning needs n_bins >= 1".into()));
    }
    let mut by_month: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        by_month.entry(record.month).or_default().push(idx);
    }
    let mut bins = vec![0u32; records.len()];
    for indices in by_month.values_mut() {
        // stable sort: equal values keep input (date) order
        indices.sort_by(|a, b| records[*a].value.total_cmp(&records[*b].value));
        let n = indices.len() as u64;
        for (rank, &idx) in indices.iter().enumerate() {
            bins[idx] = (rank as u64 * n_bins as u64 / n) as u32 + 1;
        }
    }
    Ok(bins)
}

/// Assign a weather bin to every historical day, in date order.
pub fn bin_weather_days(
    weather_bins_id: u32,
    observations: &[DailyObservation],
    scheme: &ClassificationScheme,
) -> RaResult<Vec<WeatherBin>> {
    let mut ordered: Vec<&DailyObservation> = observations.iter().collect();
    ordered.sort_by_key(|o| (o.year, o.month, o.day_of_month));
    let records: Vec<Record> = ordered
        .iter()
        .map(|o| {
            Ok(Record {
                key: o.date()?.to_string(),
                month: o.month,
                value: o.value,
            })
        })
        .collect::<RaResult<_>>()?;
    let bins = classify(&records, scheme)?;
    let rows = ordered
        .iter()
        .zip(bins)
        .map(|(o, weather_bin)| {
            Ok(WeatherBin {
                weather_bins_id,
                year: o.year,
                month: o.month,
                day_of_month: o.day_of_month,
                day_type: o.resolved_day_type()?,
                weather_bin,
            })
        })
        .collect::<RaResult<Vec<_>>>()?;
    tracing::info!(weather_bins_id, days = rows.len(), "binned historical days");
    Ok(rows)
}

/// Assign a hydro bin to every historical `(year, month)`.
pub fn bin_hydro_years(
    observations: &[HydroObservation],
    scheme: &ClassificationScheme,
) -> RaResult<Vec<HydroYearBin>> {
    let mut ordered: Vec<&HydroObservation> = observations.iter().collect();
    ordered.sort_by_key(|o| (o.year, o.month));
    let records: Vec<Record> = ordered
        .iter()
        .map(|o| Record {
            key: format!("hydro year-month {}-{:02}", o.year, o.month),
            month: o.month,
            value: o.value,
        })
        .collect();
    let bins = classify(&records, scheme)?;
    Ok(ordered
        .iter()
        .zip(bins)
        .map(|(o, hydro_bin)| HydroYearBin {
            year: o.year,
            month: o.month,
            hydro_bin,
        })
        .collect())
}
