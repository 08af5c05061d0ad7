//! CLI command definitions for task-forest
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod export;
pub mod import;

use clap::{Parser, Subcommand};
use export::ExportArgs;
use import::ImportArgs;

/// Task Forest server and CLI tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Host for the HTTP server (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port for the HTTP server (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,

    /// Export the database to a structured JSON snapshot
    Export(ExportArgs),

    /// Import a structured JSON snapshot into the database
    Import(ImportArgs),
}
