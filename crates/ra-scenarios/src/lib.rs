//! Run settings and the temporal structure of a synthesized scenario.

pub mod settings;
pub mod temporal;

pub use settings::{
    load_settings_from_path, validate, HydroBinningSpec, InputPaths, RunSection, RunSettings,
    SchemeSpec, WeatherBinningSpec,
};
pub use temporal::{
    assemble_temporal_scenario, Boundary, HorizonRow, TemporalOutput, TemporalScenario,
    TemporalSettings, TimepointRow,
};
