//! # ra-algo: iteration generators
//!
//! The statistical core of the synthesizer. Every generator is a pure
//! function of typed records and settings; none of them touches the
//! filesystem.
//!
//! | Stage | Entry point | Output |
//! |-------|-------------|--------|
//! | Weather binning | [`bin_weather_days`] | [`ra_core::WeatherBin`] |
//! | Hydro binning | [`bin_hydro_years`] | [`ra_core::HydroYearBin`] |
//! | Iterations | [`generate_iterations`] | [`ra_core::WeatherIteration`] |
//! | Hydro | [`generate_hydro_iterations`] | [`HydroIterationRow`] |
//! | Availability | [`generate_availability`] | [`AvailabilityRow`], [`AvailabilitySummaryRow`] |
//!
//! ## Reproducibility
//!
//! Randomness only enters through [`ra_core::stream_rng`]. The draw engine
//! uses one stream for the bin sequence and one for day selection; the hydro
//! generator one stream per `(iteration, month)`; the availability generator
//! one stream per unit instance. Parallel execution therefore never changes
//! the output.

pub mod availability;
pub mod binning;
pub mod draws;
pub mod hydro;
pub mod sync;

pub use availability::{
    generate_availability, AvailabilityOutput, AvailabilityRow, AvailabilitySummaryRow,
    OutageChain,
};
pub use binning::{bin_hydro_years, bin_weather_days, ClassificationScheme};
pub use draws::{generate_monte_carlo_iterations, BinIndex};
pub use hydro::{generate_hydro_iterations, HydroIterationRow};
pub use sync::{build_sync_iterations, RequiredSeries};

use ra_core::{IterationMode, RaResult, WeatherBin, WeatherDrawSettings, WeatherIteration};

/// Build the iteration set of one settings group in its configured mode.
///
/// `required` only matters in sync mode, where every listed series must
/// cover each candidate year in full.
pub fn generate_iterations(
    settings: &WeatherDrawSettings,
    bins: &[WeatherBin],
    required: &[RequiredSeries<'_>],
) -> RaResult<Vec<WeatherIteration>> {
    match settings.mode {
        IterationMode::MonteCarlo => generate_monte_carlo_iterations(settings, bins),
        IterationMode::Sync => build_sync_iterations(settings, bins, required),
    }
}
