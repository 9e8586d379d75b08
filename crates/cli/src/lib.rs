pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "routey",
    about = "Routey operator CLI",
    long_about = "Inspect configuration, check provider readiness, and route one-off queries.",
    after_help = "Examples:\n  routey config\n  routey doctor --json\n  routey route Place a hold on invoice INV-1001 for 120.50"
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
    #[command(about = "Route one query through the configured provider and print the response")]
    Route {
        #[arg(required = true, num_args = 1.., help = "Query text; words are joined with spaces")]
        query: Vec<String>,
    },
    #[command(about = "Validate config and completion provider readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Route { query } => commands::route::run(&query.join(" ")),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
