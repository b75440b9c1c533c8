use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("accord=info")))
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Demo(args) => commands::demo::run(args, cli.format),
        Commands::Inspect(args) => commands::inspect::run(args, cli.format),
    }
}
