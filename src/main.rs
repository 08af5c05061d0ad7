//! task-forest server
//!
//! An HTTP backend for hierarchical task lists with AI-assisted
//! breakdown of tasks into subtasks.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use task_forest::ai::{AiClient, Provider};
use task_forest::cli::export::ExportArgs;
use task_forest::cli::import::ImportArgs;
use task_forest::cli::{Cli, Command};
use task_forest::config::Config;
use task_forest::db::Database;
use task_forest::db::import::ImportOptions;
use task_forest::server::{AppState, start_server};
use task_forest::snapshot::CURRENT_SCHEMA_VERSION;
use task_forest::snapshot::Snapshot;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    // Load configuration, then layer CLI overrides on top
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    if let Some(db_path) = &cli.database {
        config.paths.database = db_path.into();
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Handle subcommands
    match cli.command {
        Some(Command::Export(args)) => {
            run_export(&config, args)?;
        }
        Some(Command::Import(args)) => {
            run_import(&config, args)?;
        }
        Some(Command::Serve) | None => {
            run_server(config).await?;
        }
    }

    Ok(())
}

/// Run the HTTP server until interrupted.
async fn run_server(config: Config) -> Result<()> {
    config.ensure_db_dir()?;
    let db = Arc::new(Database::open(&config.paths.database)?);
    info!("Database: {}", config.paths.database.display());

    let default_provider = Provider::from_str(&config.ai.default_provider).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown default provider '{}' (expected gemini, openai, or anthropic)",
            config.ai.default_provider
        )
    })?;

    let ai = Arc::new(AiClient::new(Arc::clone(&db), config.ai.log_calls));
    let state = AppState::new(db, ai, default_provider);

    let handle = start_server(state, &config.server.host, config.server.port).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown();

    Ok(())
}

/// Run the export command
fn run_export(config: &Config, args: ExportArgs) -> Result<()> {
    let db = Database::open(&config.paths.database)?;

    let snapshot = db.export_snapshot(args.tables.as_deref())?;

    // Serialize to JSON
    let json_output = snapshot.to_json_pretty()?;
    let json_bytes = json_output.as_bytes();

    let should_compress = args.should_compress();

    // Write output
    if let Some(ref path) = args.output {
        if should_compress {
            use flate2::Compression;
            use flate2::write::GzEncoder;

            let file = std::fs::File::create(path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(json_bytes)?;
            encoder.finish()?;
            eprintln!("Exported to {} (gzipped)", path.display());
        } else {
            std::fs::write(path, &json_output)?;
            eprintln!("Exported to {}", path.display());
        }
    } else if should_compress {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let stdout = std::io::stdout();
        let mut encoder = GzEncoder::new(stdout.lock(), Compression::default());
        encoder.write_all(json_bytes)?;
        let _ = encoder.finish()?;
    } else {
        print!("{}", json_output);
    }

    Ok(())
}

/// Run the import command
fn run_import(config: &Config, args: ImportArgs) -> Result<()> {
    // Load snapshot from file
    let snapshot = Snapshot::from_file(&args.file)?;

    // Check schema compatibility
    if !snapshot.is_schema_compatible() {
        eprintln!(
            "Warning: Snapshot schema version {} differs from current version {}",
            snapshot.schema_version, CURRENT_SCHEMA_VERSION
        );
    }

    config.ensure_db_dir()?;
    let db = Database::open(&config.paths.database)?;

    let options = if args.force {
        ImportOptions::replace()
    } else {
        ImportOptions::fresh()
    };

    if args.dry_run {
        // Dry run - just validate and report
        let result = db.preview_import(&snapshot, &options);
        println!("Dry run results:");
        println!("  Mode: {:?}", result.mode);
        println!("  Database is empty: {}", result.database_is_empty);
        println!("  Would succeed: {}", result.would_succeed);
        if let Some(reason) = &result.failure_reason {
            println!("  Failure reason: {}", reason);
        }
        println!("  Would insert:");
        for (table, count) in &result.would_insert {
            println!("    {}: {}", table, count);
        }
        if !result.would_delete.is_empty() {
            println!("  Would delete:");
            for (table, count) in &result.would_delete {
                println!("    {}: {}", table, count);
            }
        }
        return Ok(());
    }

    // Fresh mode requires an empty database
    if !args.force {
        let preview = db.preview_import(&snapshot, &options);
        if !preview.database_is_empty {
            anyhow::bail!("Database contains existing data. Use --force to replace it.");
        }
    }

    // Perform import
    let result = db.import_snapshot(&snapshot, &options)?;

    println!("Import complete:");
    println!("  Mode: {:?}", options.mode);
    println!("  Rows imported:");
    for (table, count) in &result.rows_imported {
        println!("    {}: {}", table, count);
    }
    if !result.rows_deleted.is_empty() {
        println!("  Rows deleted:");
        for (table, count) in &result.rows_deleted {
            println!("    {}: {}", table, count);
        }
    }

    Ok(())
}
