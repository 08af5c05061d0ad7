//! Import subcommand for the task-forest CLI
//!
//! Imports a structured JSON snapshot back into the database.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the snapshot file to import
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Validate import without modifying the database
    ///
    /// Parses the file, validates schema compatibility, and reports
    /// what would be imported without making any changes.
    #[arg(long)]
    pub dry_run: bool,

    /// Overwrite existing data
    ///
    /// By default the import refuses to run unless every target table
    /// is empty. With --force, existing rows are deleted first.
    #[arg(long)]
    pub force: bool,
}

impl ImportArgs {
    /// Check if this is a gzipped file based on extension
    pub fn is_gzipped(&self) -> bool {
        self.file.extension().is_some_and(|ext| ext == "gz")
    }

    /// Describe the import mode for logging
    pub fn import_mode(&self) -> &'static str {
        if self.dry_run {
            "dry-run"
        } else if self.force {
            "replace"
        } else {
            "fresh"
        }
    }
}
