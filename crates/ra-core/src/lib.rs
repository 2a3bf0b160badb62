//! # ra-core: shared vocabulary of the iteration synthesizer
//!
//! Typed records for the historical reference tables and the derived
//! iteration table, the error taxonomy every generator reports through, and
//! the deterministic random-stream derivation that keeps parallel runs
//! reproducible.
//!
//! ## Data flow
//!
//! ```text
//! binners -> draw engine / sync builder -> materializer, hydro, availability -> temporal assembler
//! ```
//!
//! Raw tables ([`WeatherBin`], [`HydroYearBin`], [`HourlyValue`], ...) are
//! read-only inputs. [`WeatherIteration`] rows are created once per run by the
//! draw engine or the sync builder and consumed, never modified, downstream.
//!
//! ## Modules
//!
//! - [`calendar`] - dates, day types, strata, synthetic study calendars
//! - [`records`] - one struct per input/derived table
//! - [`profiles`] - `(series, date, hour)` indexed store for hourly tables
//! - [`iterations`] - grouped view of a realized iteration set
//! - [`rng`] - seeded per-worker random streams
//! - [`step`] - the pipeline step enumeration
//! - [`error`] - [`RaError`] and [`RaResult`]

pub mod calendar;
pub mod error;
pub mod iterations;
pub mod profiles;
pub mod records;
pub mod rng;
pub mod step;

pub use calendar::{
    date_from_parts, dates_in_year, study_calendar, weekday_rule, CalendarDay, DayType, Stratum,
    ANY_DAY_TYPE, HOURS_PER_DAY, WEEKDAY, WEEKEND,
};
pub use error::{RaError, RaResult};
pub use iterations::{Iteration, IterationSet};
pub use profiles::HourlyStore;
pub use records::{
    BinSequence, BinThreshold, DailyObservation, HourlyValue, HydroMonthParams, HydroObservation,
    HydroYearBin, IterationMode, LoadZoneUnit, OutageModelKind, UnitAvailabilityParams,
    UnitWeatherDerate, VarProjectUnit, WeatherBin, WeatherDrawSettings, WeatherIteration,
};
pub use rng::{stream_rng, stream_seed};
pub use step::PipelineStep;
