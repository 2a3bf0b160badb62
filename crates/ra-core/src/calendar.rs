//! Calendar helpers shared by the binners, draw engine and assembler.
//!
//! Historical records arrive as `(year, month, day_of_month)` triples; they
//! are turned into [`NaiveDate`] once, at the boundary, so that every
//! downstream lookup keys on a real calendar date.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{RaError, RaResult};

/// Day classification label (weekday/weekend/holiday regime).
pub type DayType = u8;

/// Monday through Friday under the default rule.
pub const WEEKDAY: DayType = 1;
/// Saturday and Sunday under the default rule.
pub const WEEKEND: DayType = 2;
/// Label used when day types are collapsed into a single stratum.
pub const ANY_DAY_TYPE: DayType = 0;

pub const HOURS_PER_DAY: usize = 24;

/// Default day-type rule applied when a record does not carry one.
pub fn weekday_rule(date: NaiveDate) -> DayType {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => WEEKEND,
        _ => WEEKDAY,
    }
}

/// Build a calendar date, rejecting impossible triples such as 2001-02-29.
pub fn date_from_parts(year: i32, month: u32, day_of_month: u32) -> RaResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day_of_month).ok_or_else(|| {
        RaError::Validation(format!(
            "invalid calendar date {year}-{month:02}-{day_of_month:02}"
        ))
    })
}

/// Every date of `year` in order.
pub fn dates_in_year(year: i32) -> RaResult<Vec<NaiveDate>> {
    let first = date_from_parts(year, 1, 1)?;
    let last = date_from_parts(year, 12, 31)?;
    Ok(first.iter_days().take_while(|d| *d <= last).collect())
}

/// Stratum key used by the draw engine: `(month, day_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stratum {
    pub month: u32,
    pub day_type: DayType,
}

impl Stratum {
    pub fn new(month: u32, day_type: DayType, consider_day_types: bool) -> Self {
        Self {
            month,
            day_type: if consider_day_types {
                day_type
            } else {
                ANY_DAY_TYPE
            },
        }
    }
}

impl std::fmt::Display for Stratum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "month={} day_type={}", self.month, self.day_type)
    }
}

/// One day of a synthetic study calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    /// 1-based position in the calendar (the draw number).
    pub position: u32,
    pub date: NaiveDate,
    pub month: u32,
    pub day_type: DayType,
}

/// Synthetic calendar for a study year, classified with [`weekday_rule`].
pub fn study_calendar(year: i32) -> RaResult<Vec<CalendarDay>> {
    Ok(dates_in_year(year)?
        .into_iter()
        .enumerate()
        .map(|(idx, date)| CalendarDay {
            position: idx as u32 + 1,
            date,
            month: date.month(),
            day_type: weekday_rule(date),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_rule_splits_weekends() {
        // 2024-06-15 is a Saturday
        let sat = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let mon = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        assert_eq!(weekday_rule(sat), WEEKEND);
        assert_eq!(weekday_rule(mon), WEEKDAY);
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(date_from_parts(2001, 2, 29).is_err());
        assert!(date_from_parts(2004, 2, 29).is_ok());
    }

    #[test]
    fn study_calendar_covers_leap_years() {
        assert_eq!(study_calendar(2030).unwrap().len(), 365);
        let leap = study_calendar(2028).unwrap();
        assert_eq!(leap.len(), 366);
        assert_eq!(leap[0].position, 1);
        assert_eq!(leap[365].month, 12);
    }

    #[test]
    fn collapsed_stratum_ignores_day_type() {
        assert_eq!(Stratum::new(7, WEEKEND, false), Stratum::new(7, WEEKDAY, false));
        assert_ne!(Stratum::new(7, WEEKEND, true), Stratum::new(7, WEEKDAY, true));
    }
}
