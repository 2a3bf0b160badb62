//! Sync iteration builder: one iteration per historical year, verbatim.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use ra_core::{
    dates_in_year, HourlyStore, RaError, RaResult, WeatherBin, WeatherDrawSettings,
    WeatherIteration, ANY_DAY_TYPE, HOURS_PER_DAY,
};

/// A series every sync year must cover in full.
#[derive(Debug, Clone, Copy)]
pub struct RequiredSeries<'a> {
    pub name: &'a str,
    pub store: &'a HourlyStore,
}

fn missing_hours(store: &HourlyStore, name: &str, date: NaiveDate) -> String {
    let hours: Vec<String> = (0..HOURS_PER_DAY as u32)
        .filter(|h| store.value(name, date, *h).is_none())
        .map(|h| h.to_string())
        .collect();
    format!("{date} hours [{}]", hours.join(","))
}

/// Build sync iterations, numbered `1..=N` in ascending year order.
///
/// Candidate years are `sync_years` when given, otherwise every year present
/// in the group's bin table. A year missing any calendar day in the bin table
/// or any hour of any required series fails with
/// [`RaError::IncompleteYear`]; it is never padded.
pub fn build_sync_iterations(
    settings: &WeatherDrawSettings,
    bins: &[WeatherBin],
    required: &[RequiredSeries<'_>],
) -> RaResult<Vec<WeatherIteration>> {
    let mut binned: BTreeMap<NaiveDate, &WeatherBin> = BTreeMap::new();
    for row in bins
        .iter()
        .filter(|b| b.weather_bins_id == settings.weather_bins_id)
    {
        binned.insert(row.date()?, row);
    }

    let years: BTreeSet<i32> = match &settings.sync_years {
        Some(years) => years.iter().copied().collect(),
        None => binned.keys().map(|d| d.year()).collect(),
    };
    if years.is_empty() {
        return Err(RaError::Config(format!(
            "{}: sync mode found no historical years",
            settings.group_label()
        )));
    }

    let mut rows = Vec::new();
    for (idx, year) in years.iter().enumerate() {
        let weather_iteration = idx as u32 + 1;
        for (pos, date) in dates_in_year(*year)?.into_iter().enumerate() {
            let bin = binned.get(&date).ok_or_else(|| RaError::IncompleteYear {
                year: *year,
                series: "weather_bins".into(),
                missing: date.to_string(),
            })?;
            if let Some(series) = required
                .iter()
                .find(|s| !s.store.is_day_complete(s.name, date))
            {
                return Err(RaError::IncompleteYear {
                    year: *year,
                    series: series.name.to_string(),
                    missing: missing_hours(series.store, series.name, date),
                });
            }
            rows.push(WeatherIteration {
                weather_bins_id: settings.weather_bins_id,
                weather_draws_id: settings.weather_draws_id,
                weather_iteration,
                draw_number: pos as u32 + 1,
                month: date.month(),
                day_type: if settings.consider_day_types {
                    bin.day_type
                } else {
                    ANY_DAY_TYPE
                },
                weather_day_bin: None,
                study_calendar_date: date,
                study_date: date,
            });
        }
    }
    tracing::info!(
        group = %settings.group_label(),
        years = years.len(),
        "built sync iterations"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ra_core::{weekday_rule, IterationMode};

    fn settings(sync_years: Option<Vec<i32>>) -> WeatherDrawSettings {
        WeatherDrawSettings {
            weather_bins_id: 1,
            weather_draws_id: 2,
            mode: IterationMode::Sync,
            seed: 0,
            iterations_seed: 0,
            n_iterations: 1,
            consider_day_types: true,
            study_year: None,
            bin_sequence: Default::default(),
            sync_years,
        }
    }

    fn year_bins(year: i32) -> Vec<WeatherBin> {
        dates_in_year(year)
            .unwrap()
            .into_iter()
            .map(|d| WeatherBin {
                weather_bins_id: 1,
                year,
                month: d.month(),
                day_of_month: d.day(),
                day_type: weekday_rule(d),
                weather_bin: 1,
            })
            .collect()
    }

    #[test]
    fn years_become_ordered_iterations() {
        let mut bins = year_bins(2003);
        bins.extend(year_bins(2001));
        let rows = build_sync_iterations(&settings(None), &bins, &[]).unwrap();
        assert_eq!(rows.len(), 365 * 2);
        assert_eq!(rows[0].weather_iteration, 1);
        assert_eq!(rows[0].study_date.year(), 2001);
        assert_eq!(rows[365].weather_iteration, 2);
        assert_eq!(rows[365].study_date.year(), 2003);
        assert!(rows.iter().all(|r| r.weather_day_bin.is_none()));
        assert!(rows.iter().all(|r| r.study_date == r.study_calendar_date));
    }

    #[test]
    fn missing_day_fails_the_year() {
        let mut bins = year_bins(2001);
        bins.retain(|b| !(b.month == 2 && b.day_of_month == 14));
        let err = build_sync_iterations(&settings(None), &bins, &[]).unwrap_err();
        match err {
            RaError::IncompleteYear {
                year,
                series,
                missing,
            } => {
                assert_eq!(year, 2001);
                assert_eq!(series, "weather_bins");
                assert_eq!(missing, "2001-02-14");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn required_series_must_be_complete() {
        let bins = year_bins(2001);
        let mut store = HourlyStore::new();
        for date in dates_in_year(2001).unwrap() {
            for hour in 0..24 {
                if !(date.ordinal() == 40 && hour == 7) {
                    store.insert("load_a", date, hour, 1.0).unwrap();
                }
            }
        }
        let required = [RequiredSeries {
            name: "load_a",
            store: &store,
        }];
        let err = build_sync_iterations(&settings(Some(vec![2001])), &bins, &required).unwrap_err();
        match err {
            RaError::IncompleteYear {
                series, missing, ..
            } => {
                assert_eq!(series, "load_a");
                assert_eq!(missing, "2001-02-09 hours [7]");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
