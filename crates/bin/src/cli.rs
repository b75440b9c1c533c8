//! CLI argument definitions for the Accord binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Accord replication toolkit
#[derive(Parser, Debug)]
#[command(name = "accord")]
#[command(about = "Accord: collaborative CRDT documents with peer-to-peer sync")]
#[command(version)]
pub struct Cli {
    /// Log filter directive
    #[arg(long, global = true, default_value = "accord=info", env = "ACCORD_LOG")]
    pub log: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Edit two replicas concurrently and sync them until they converge
    Demo(DemoArgs),
    /// Show the content and history of a saved document
    Inspect(InspectArgs),
}

/// Arguments for the demo command
#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    /// Maximum number of sync rounds before giving up
    #[arg(short, long, default_value_t = 10, env = "ACCORD_ROUNDS")]
    pub rounds: usize,

    /// Save the converged document to this file
    #[arg(short, long)]
    pub save: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Saved document file
    pub file: PathBuf,

    /// Also list every change in the document's history
    #[arg(short, long)]
    pub changes: bool,
}
