pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pitchwatch",
    about = "Pitchwatch operator CLI",
    long_about = "Inspect pitchwatch configuration, check readiness, and run a one-off \
                  availability check against the booking provider.",
    after_help = "Examples:\n  pitchwatch doctor --json\n  pitchwatch config\n  pitchwatch check"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, pitches and rules")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one reconciliation against the provider and print qualifying slots")]
    Check,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Check => commands::check::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
