//! Indexed hourly series store.
//!
//! Raw unit-level series and weather-derate profiles are looked up by
//! `(series name, historical date, hour)` many times per iteration; the store
//! turns the flat CSV rows into per-day arrays once.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::calendar::{date_from_parts, HOURS_PER_DAY};
use crate::error::{RaError, RaResult};
use crate::records::{HourlyValue, UnitWeatherDerate};

const FULL_DAY: u32 = (1 << HOURS_PER_DAY) - 1;

#[derive(Debug, Clone, Default)]
struct DayProfile {
    values: [f64; HOURS_PER_DAY],
    present: u32,
}

#[derive(Debug, Clone, Default)]
pub struct HourlyStore {
    series: HashMap<String, BTreeMap<NaiveDate, DayProfile>>,
}

impl HourlyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, date: NaiveDate, hour: u32, value: f64) -> RaResult<()> {
        if hour as usize >= HOURS_PER_DAY {
            return Err(RaError::Validation(format!(
                "series '{name}' {date}: hour_of_day {hour} outside 0..=23"
            )));
        }
        let day = self
            .series
            .entry(name.to_string())
            .or_default()
            .entry(date)
            .or_default();
        let bit = 1u32 << hour;
        if day.present & bit != 0 {
            return Err(RaError::Validation(format!(
                "series '{name}' has duplicate value for {date} hour {hour}"
            )));
        }
        day.values[hour as usize] = value;
        day.present |= bit;
        Ok(())
    }

    pub fn from_hourly(rows: &[HourlyValue]) -> RaResult<Self> {
        let mut store = Self::new();
        for row in rows {
            let date = date_from_parts(row.year, row.month, row.day_of_month)?;
            store.insert(&row.timeseries_name, date, row.hour_of_day, row.value)?;
        }
        Ok(store)
    }

    pub fn from_derates(rows: &[UnitWeatherDerate]) -> RaResult<Self> {
        let mut store = Self::new();
        for row in rows {
            let date = date_from_parts(row.year, row.month, row.day_of_month)?;
            store.insert(
                &row.timeseries_name,
                date,
                row.hour_of_day,
                row.availability_derate_weather,
            )?;
        }
        Ok(store)
    }

    pub fn has_series(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn value(&self, name: &str, date: NaiveDate, hour: u32) -> Option<f64> {
        let day = self.series.get(name)?.get(&date)?;
        if hour as usize >= HOURS_PER_DAY || day.present & (1 << hour) == 0 {
            return None;
        }
        Some(day.values[hour as usize])
    }

    /// Value lookup that reports the missing key as [`RaError::MissingData`].
    pub fn require(&self, name: &str, date: NaiveDate, hour: u32) -> RaResult<f64> {
        self.value(name, date, hour)
            .ok_or_else(|| RaError::MissingData {
                series: name.to_string(),
                key: format!("{date} hour {hour}"),
            })
    }

    /// True when all 24 hours of `date` are present.
    pub fn is_day_complete(&self, name: &str, date: NaiveDate) -> bool {
        self.series
            .get(name)
            .and_then(|days| days.get(&date))
            .map(|day| day.present == FULL_DAY)
            .unwrap_or(false)
    }
}
