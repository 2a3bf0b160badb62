//! Tabular I/O for the synthesizer: typed, validated CSV loaders for the raw
//! reference tables and staged writers for the derived ones.

pub mod loaders;
pub mod staged;
pub mod tables;

pub use loaders::{
    load_daily_weather, load_hourly_store, load_hydro_conditions, load_hydro_params,
    load_hydro_year_bins, load_load_zone_units, load_thresholds, load_unit_availability,
    load_unit_weather_derates, load_var_project_units, load_weather_bins,
    load_weather_iterations,
};
pub use staged::StagedOutput;
pub use tables::{read_table, write_table};
