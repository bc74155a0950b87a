use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod config;
mod error;
mod parser;
mod provider;
mod runner;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("triviagen=debug")
    } else {
        EnvFilter::new("triviagen=warn")
    };

    // stdout carries the generated JSON
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => cli::generate::execute(args).await,
        Commands::Prompt(args) => cli::prompt::execute(args),
        Commands::Schema => cli::schema::execute(),
    }
}
