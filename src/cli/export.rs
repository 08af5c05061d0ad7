//! Export subcommand for the task-forest CLI
//!
//! Exports the database to a structured JSON snapshot that can be
//! version-controlled, diffed, and re-imported.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,

    /// Comma-separated list of tables to export
    ///
    /// Available tables: projects, tasks, blockers, provider_config
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub tables: Option<Vec<String>>,
}

impl ExportArgs {
    /// Determine if output should be compressed based on args and filename
    pub fn should_compress(&self) -> bool {
        // Explicit --gzip flag always wins
        if self.gzip {
            return true;
        }

        self.output
            .as_ref()
            .and_then(|path| path.extension())
            .is_some_and(|ext| ext == "gz")
    }
}
