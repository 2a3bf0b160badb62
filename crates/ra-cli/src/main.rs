use std::process::ExitCode;

use clap::Parser;
use ra_cli::cli::{Cli, Commands, RunsCommands, SettingsCommands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

use crate::commands::{bins, completions, run, runs, settings};

fn dispatch(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            settings,
            steps,
            threads,
            verify,
        } => run::handle(settings, steps.as_deref(), *threads, *verify),
        Commands::Settings { command } => match command {
            SettingsCommands::Validate { settings, steps } => {
                settings::handle_validate(settings, steps.as_deref())
            }
            SettingsCommands::Plan { settings, steps } => {
                settings::handle_plan(settings, steps.as_deref())
            }
        },
        Commands::Bins { command } => bins::handle(command),
        Commands::Runs { command } => match command {
            RunsCommands::Describe { target, format } => runs::handle_describe(target, *format),
        },
        Commands::Completions { shell, out } => completions::handle(*shell, out.as_deref()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match dispatch(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
