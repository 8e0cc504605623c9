pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vaulta",
    about = "Vaulta operator CLI",
    long_about = "Inspect Vaulta configuration and drive the dialogue orchestrator locally.",
    after_help = "Examples:\n  vaulta config\n  vaulta chat --session demo-1"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a vaulta.toml (defaults to ./vaulta.toml or ./config/vaulta.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Chat with the orchestrator against the in-memory demo bank")]
    Chat {
        #[arg(long, default_value = "cli-session", help = "Session id to use for every turn")]
        session: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(cli.config),
        Command::Chat { session } => commands::chat::run(session, cli.config),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
