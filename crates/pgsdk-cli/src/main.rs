use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; --verbose raises the default level
    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // Load .env file if present
    let _ = dotenvy::dotenv();

    let result = match &cli.command {
        Command::Generate(args) => commands::generate::run(args).await,
        Command::Introspect(args) => commands::introspect::run(args).await,
        Command::Graph(args) => commands::graph::run(args).await,
        Command::Pull(args) => commands::pull::run(args).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
