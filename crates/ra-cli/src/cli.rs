use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weather and availability iteration synthesizer", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the selected pipeline steps for every settings group
    Run {
        /// Path to the run settings (TOML, YAML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        settings: PathBuf,
        /// Comma-separated steps overriding `run.steps`
        #[arg(long)]
        steps: Option<String>,
        /// Worker threads overriding `run.threads` (0 = one per core)
        #[arg(long)]
        threads: Option<usize>,
        /// Regenerate each group's iterations and compare fingerprints
        #[arg(long)]
        verify: bool,
    },
    /// Run settings utilities
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Classify historical observations into bins
    Bins {
        #[command(subcommand)]
        command: BinsCommands,
    },
    /// Inspect previous runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Load and validate run settings without reading any input table
    Validate {
        #[arg(long, value_hint = ValueHint::FilePath)]
        settings: PathBuf,
        /// Comma-separated steps to validate against instead of `run.steps`
        #[arg(long)]
        steps: Option<String>,
    },
    /// Print the step execution order and the steps reused from earlier runs
    Plan {
        #[arg(long, value_hint = ValueHint::FilePath)]
        settings: PathBuf,
        #[arg(long)]
        steps: Option<String>,
    },
}

/// How observations map to bins.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SchemeArgs {
    /// CSV of per-month `[lower, upper)` thresholds
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub thresholds: Option<PathBuf>,
    /// Number of per-month quantile bins
    #[arg(long)]
    pub quantiles: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum BinsCommands {
    /// Bin daily weather observations
    Weather {
        /// Daily observations CSV
        #[arg(long, value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long)]
        weather_bins_id: u32,
        #[command(flatten)]
        scheme: SchemeArgs,
        /// Output CSV path
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Bin monthly hydrological observations into hydro years
    Hydro {
        /// Monthly hydro conditions CSV
        #[arg(long, value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[command(flatten)]
        scheme: SchemeArgs,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum RunFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// Summarize a `run_manifest.json`
    Describe {
        /// Manifest path, or the run's output directory
        #[arg(value_hint = ValueHint::AnyPath)]
        target: PathBuf,
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
