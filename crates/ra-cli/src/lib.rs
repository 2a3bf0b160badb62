pub mod cli;
pub mod manifest;

pub use cli::{
    build_cli_command, BinsCommands, Cli, Commands, RunFormat, RunsCommands, SchemeArgs,
    SettingsCommands,
};
