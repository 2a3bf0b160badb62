//! Hydro iteration generator.
//!
//! For every iteration and every month it covers, picks one historical hydro
//! year consistent with the weather the iteration was drawn from and copies
//! that year-month's operating limits for each hydro project.
//!
//! **Algorithm:**
//! 1. Source year: the most frequent historical year among the month's
//!    study dates (a sync iteration's only year; earliest on ties).
//! 2. Look up the source `(year, month)` hydro bin.
//! 3. Per project, the candidates are the years whose `(year, month)` shares
//!    that bin and that have parameters for the project. The source year wins
//!    when it is a candidate; otherwise one candidate is drawn from the
//!    `(iteration, month)` stream, projects taken in name order.
//! 4. Every emitted triple must satisfy `min <= average <= max`.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use ra_core::{
    stream_rng, HydroMonthParams, HydroYearBin, IterationSet, RaError, RaResult,
    WeatherDrawSettings,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroIterationRow {
    pub project: String,
    pub weather_iteration: u32,
    pub month: u32,
    pub hydro_year: i32,
    pub hydro_bin: u32,
    pub average_power_fraction: f64,
    pub min_power_fraction: f64,
    pub max_power_fraction: f64,
}

fn check_bounds(row: &HydroIterationRow) -> RaResult<()> {
    let ordered = row.min_power_fraction <= row.average_power_fraction
        && row.average_power_fraction <= row.max_power_fraction;
    if ordered {
        Ok(())
    } else {
        Err(RaError::BoundsViolation {
            project: row.project.clone(),
            year: row.hydro_year,
            month: row.month,
            min: row.min_power_fraction,
            average: row.average_power_fraction,
            max: row.max_power_fraction,
        })
    }
}

pub fn generate_hydro_iterations(
    settings: &WeatherDrawSettings,
    iterations: &IterationSet,
    year_bins: &[HydroYearBin],
    params: &[HydroMonthParams],
) -> RaResult<Vec<HydroIterationRow>> {
    let bin_of: HashMap<(i32, u32), u32> = year_bins
        .iter()
        .map(|b| ((b.year, b.month), b.hydro_bin))
        .collect();
    let mut years_in_bin: BTreeMap<(u32, u32), Vec<i32>> = BTreeMap::new();
    for b in year_bins {
        years_in_bin
            .entry((b.month, b.hydro_bin))
            .or_default()
            .push(b.year);
    }
    for years in years_in_bin.values_mut() {
        years.sort_unstable();
    }
    let mut by_project: BTreeMap<&str, HashMap<(i32, u32), &HydroMonthParams>> = BTreeMap::new();
    for p in params {
        by_project
            .entry(p.project.as_str())
            .or_default()
            .insert((p.year, p.month), p);
    }

    let mut rows = Vec::new();
    for iteration in &iterations.iterations {
        for month in iteration.months() {
            let Some(source_year) = iteration.source_year(month) else {
                continue;
            };
            let hydro_bin =
                *bin_of
                    .get(&(source_year, month))
                    .ok_or_else(|| RaError::ClassificationGap {
                        key: format!("no hydro bin for year {source_year} month {month}"),
                    })?;
            let same_bin = years_in_bin
                .get(&(month, hydro_bin))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let mut rng = stream_rng(
                settings.seed,
                &[
                    settings.weather_bins_id as u64,
                    settings.weather_draws_id as u64,
                    iteration.weather_iteration as u64,
                    month as u64,
                ],
            );
            for (project, table) in &by_project {
                let candidates: Vec<i32> = same_bin
                    .iter()
                    .copied()
                    .filter(|y| table.contains_key(&(*y, month)))
                    .collect();
                let hydro_year = if candidates.contains(&source_year) {
                    source_year
                } else {
                    match candidates.len() {
                        0 => {
                            return Err(RaError::MissingData {
                                series: format!("hydro_params/{project}"),
                                key: format!("month {month} hydro_bin {hydro_bin}"),
                            })
                        }
                        1 => candidates[0],
                        n => candidates[rng.gen_range(0..n)],
                    }
                };
                let source = table.get(&(hydro_year, month)).ok_or_else(|| {
                    RaError::MissingData {
                        series: format!("hydro_params/{project}"),
                        key: format!("year {hydro_year} month {month}"),
                    }
                })?;
                let row = HydroIterationRow {
                    project: project.to_string(),
                    weather_iteration: iteration.weather_iteration,
                    month,
                    hydro_year,
                    hydro_bin,
                    average_power_fraction: source.average_power_fraction,
                    min_power_fraction: source.min_power_fraction,
                    max_power_fraction: source.max_power_fraction,
                };
                check_bounds(&row)?;
                rows.push(row);
            }
        }
    }
    tracing::info!(
        group = %settings.group_label(),
        rows = rows.len(),
        "generated hydro iterations"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ra_core::{IterationMode, WeatherIteration};

    fn settings() -> WeatherDrawSettings {
        WeatherDrawSettings {
            weather_bins_id: 1,
            weather_draws_id: 1,
            mode: IterationMode::MonteCarlo,
            seed: 5,
            iterations_seed: 6,
            n_iterations: 1,
            consider_day_types: true,
            study_year: Some(2030),
            bin_sequence: Default::default(),
            sync_years: None,
        }
    }

    fn day(draw: u32, study: (i32, u32, u32)) -> WeatherIteration {
        WeatherIteration {
            weather_bins_id: 1,
            weather_draws_id: 1,
            weather_iteration: 1,
            draw_number: draw,
            month: 1,
            day_type: 1,
            weather_day_bin: Some(1),
            study_calendar_date: NaiveDate::from_ymd_opt(2030, 1, draw).unwrap(),
            study_date: NaiveDate::from_ymd_opt(study.0, study.1, study.2).unwrap(),
        }
    }

    fn params(project: &str, year: i32, min: f64, avg: f64, max: f64) -> HydroMonthParams {
        HydroMonthParams {
            project: project.into(),
            year,
            month: 1,
            average_power_fraction: avg,
            min_power_fraction: min,
            max_power_fraction: max,
        }
    }

    fn bins() -> Vec<HydroYearBin> {
        vec![
            HydroYearBin {
                year: 2001,
                month: 1,
                hydro_bin: 1,
            },
            HydroYearBin {
                year: 2002,
                month: 1,
                hydro_bin: 2,
            },
            HydroYearBin {
                year: 2003,
                month: 1,
                hydro_bin: 2,
            },
        ]
    }

    #[test]
    fn modal_year_drives_the_lookup() {
        let set = IterationSet::from_rows(&[
            day(1, (2002, 1, 3)),
            day(2, (2002, 1, 9)),
            day(3, (2001, 1, 4)),
        ])
        .unwrap();
        let p = vec![
            params("dam", 2001, 0.1, 0.2, 0.3),
            params("dam", 2002, 0.2, 0.5, 0.8),
            params("dam", 2003, 0.3, 0.4, 0.9),
        ];
        let rows = generate_hydro_iterations(&settings(), &set, &bins(), &p).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hydro_year, 2002);
        assert_eq!(rows[0].hydro_bin, 2);
        assert_eq!(rows[0].average_power_fraction, 0.5);
    }

    #[test]
    fn missing_source_params_fall_back_to_same_bin_year() {
        let set = IterationSet::from_rows(&[day(1, (2002, 1, 3))]).unwrap();
        let p = vec![params("dam", 2003, 0.3, 0.4, 0.9)];
        let rows = generate_hydro_iterations(&settings(), &set, &bins(), &p).unwrap();
        assert_eq!(rows[0].hydro_year, 2003);
        assert_eq!(rows[0].hydro_bin, 2);
    }

    #[test]
    fn fallback_among_several_same_bin_years_is_seeded() {
        let wet: Vec<HydroYearBin> = (2001..=2004)
            .map(|year| HydroYearBin {
                year,
                month: 1,
                hydro_bin: 3,
            })
            .collect();
        let rows: Vec<WeatherIteration> = (1..=40)
            .map(|iteration| WeatherIteration {
                weather_iteration: iteration,
                ..day(1, (2001, 1, 3))
            })
            .collect();
        let set = IterationSet::from_rows(&rows).unwrap();
        let p = vec![
            params("dam", 2002, 0.1, 0.2, 0.3),
            params("dam", 2003, 0.2, 0.3, 0.4),
            params("dam", 2004, 0.3, 0.4, 0.5),
        ];

        let first = generate_hydro_iterations(&settings(), &set, &wet, &p).unwrap();
        let again = generate_hydro_iterations(&settings(), &set, &wet, &p).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.len(), 40);
        assert!(first
            .iter()
            .all(|r| r.hydro_bin == 3 && (2002..=2004).contains(&r.hydro_year)));
        let chosen: std::collections::BTreeSet<i32> =
            first.iter().map(|r| r.hydro_year).collect();
        assert!(chosen.len() > 1, "every iteration picked {chosen:?}");

        let mut reseeded = settings();
        reseeded.seed = 99;
        let other = generate_hydro_iterations(&reseeded, &set, &wet, &p).unwrap();
        assert_ne!(
            first.iter().map(|r| r.hydro_year).collect::<Vec<_>>(),
            other.iter().map(|r| r.hydro_year).collect::<Vec<_>>()
        );
    }

    #[test]
    fn broken_ordering_is_surfaced() {
        let set = IterationSet::from_rows(&[day(1, (2001, 1, 3))]).unwrap();
        let p = vec![params("dam", 2001, 0.5, 0.2, 0.9)];
        let err = generate_hydro_iterations(&settings(), &set, &bins(), &p).unwrap_err();
        assert!(matches!(err, RaError::BoundsViolation { year: 2001, .. }));
    }

    #[test]
    fn unbinned_source_year_is_a_gap() {
        let set = IterationSet::from_rows(&[day(1, (1999, 1, 3))]).unwrap();
        let p = vec![params("dam", 2001, 0.1, 0.2, 0.3)];
        let err = generate_hydro_iterations(&settings(), &set, &bins(), &p).unwrap_err();
        assert!(matches!(err, RaError::ClassificationGap { .. }));
    }
}
