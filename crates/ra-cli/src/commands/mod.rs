pub mod bins;
pub mod completions;
pub mod run;
pub mod runs;
pub mod settings;
pub mod telemetry;
pub mod util;
