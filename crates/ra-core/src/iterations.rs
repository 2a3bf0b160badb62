//! Grouped view of a realized iteration set.
//!
//! Downstream generators walk iterations day by day; [`IterationSet`]
//! regroups the flat [`WeatherIteration`] rows and checks that each
//! iteration's draw numbers form the contiguous sequence `1..=n`.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::calendar::HOURS_PER_DAY;
use crate::error::{RaError, RaResult};
use crate::records::WeatherIteration;

#[derive(Debug, Clone)]
pub struct Iteration {
    pub weather_iteration: u32,
    /// Days ordered by draw number.
    pub days: Vec<WeatherIteration>,
}

impl Iteration {
    pub fn hours(&self) -> usize {
        self.days.len() * HOURS_PER_DAY
    }

    /// Iteration-local 1-based timepoint of `hour` on the day at `day_index`.
    pub fn timepoint(day_index: usize, hour: usize) -> u32 {
        (day_index * HOURS_PER_DAY + hour + 1) as u32
    }

    /// Months in order of first appearance.
    pub fn months(&self) -> Vec<u32> {
        let mut months: Vec<u32> = Vec::new();
        for day in &self.days {
            if !months.contains(&day.month) {
                months.push(day.month);
            }
        }
        months
    }

    /// Most frequent historical year among the study dates of `month`,
    /// earliest year on ties.
    pub fn source_year(&self, month: u32) -> Option<i32> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for day in self.days.iter().filter(|d| d.month == month) {
            *counts.entry(day.study_date.year()).or_default() += 1;
        }
        let mut best: Option<(i32, usize)> = None;
        for (year, count) in counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((year, count)),
            }
        }
        best.map(|(year, _)| year)
    }

    pub fn study_date(&self, day_index: usize) -> NaiveDate {
        self.days[day_index].study_date
    }
}

#[derive(Debug, Clone, Default)]
pub struct IterationSet {
    pub iterations: Vec<Iteration>,
}

impl IterationSet {
    pub fn from_rows(rows: &[WeatherIteration]) -> RaResult<Self> {
        let mut grouped: BTreeMap<u32, Vec<WeatherIteration>> = BTreeMap::new();
        for row in rows {
            grouped
                .entry(row.weather_iteration)
                .or_default()
                .push(row.clone());
        }
        let mut iterations = Vec::with_capacity(grouped.len());
        for (weather_iteration, mut days) in grouped {
            days.sort_by_key(|d| d.draw_number);
            for (idx, day) in days.iter().enumerate() {
                if day.draw_number != idx as u32 + 1 {
                    return Err(RaError::Validation(format!(
                        "iteration {weather_iteration}: expected draw_number {} but found {}",
                        idx + 1,
                        day.draw_number
                    )));
                }
            }
            iterations.push(Iteration {
                weather_iteration,
                days,
            });
        }
        Ok(Self { iterations })
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}
