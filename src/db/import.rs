//! Import functionality for the task database.
//!
//! Restores data from a JSON snapshot. Two modes:
//! - Fresh: import into an empty database (fails if data exists)
//! - Replace: clear existing project data and import (--force)
//!
//! The whole import runs in a single transaction with foreign keys
//! enforced throughout. Task rows may arrive in any order: they are
//! inserted by fixed-point iteration, deferring a row until its parent is
//! present, so snapshots need no depth pre-sort.

use crate::snapshot::{CURRENT_SCHEMA_VERSION, EXPORTED_TABLES, Snapshot};
use anyhow::{Context, Result, anyhow};
use rusqlite::params;
use serde_json::Value;
use std::collections::BTreeMap;

use super::projects::DEFAULT_PROJECT_COLOR;
use super::{Database, now_ms};

/// Ceiling on task insertion passes. Each pass inserts at least one row or
/// the import aborts, so this bounds tree depth rather than row count.
const MAX_IMPORT_PASSES: usize = 100;

/// Tables in the order they should be imported (respecting foreign key
/// constraints). Projects first since tasks reference them.
const IMPORT_ORDER: &[&str] = &["projects", "tasks", "blockers", "provider_config"];

/// Import mode determining how to handle existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Import into an empty database. Fails if any project data exists.
    #[default]
    Fresh,
    /// Clear all existing project data before importing.
    Replace,
}

/// Options for controlling import behavior.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Import mode (Fresh or Replace).
    pub mode: ImportMode,
}

impl ImportOptions {
    /// Options for fresh import (empty database required).
    pub fn fresh() -> Self {
        Self {
            mode: ImportMode::Fresh,
        }
    }

    /// Options for replace import (clear existing data).
    pub fn replace() -> Self {
        Self {
            mode: ImportMode::Replace,
        }
    }
}

/// Result of an import operation.
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// Number of rows imported per table.
    pub rows_imported: BTreeMap<String, usize>,
    /// Number of rows deleted per table (Replace mode).
    pub rows_deleted: BTreeMap<String, usize>,
}

impl ImportResult {
    fn new() -> Self {
        Self {
            rows_imported: BTreeMap::new(),
            rows_deleted: BTreeMap::new(),
        }
    }

    /// Total number of rows imported.
    pub fn total_rows(&self) -> usize {
        self.rows_imported.values().sum()
    }

    /// Total number of rows deleted.
    pub fn total_deleted(&self) -> usize {
        self.rows_deleted.values().sum()
    }
}

/// Preview of what an import would do, without making any changes.
#[derive(Debug, Clone)]
pub struct DryRunResult {
    /// Import mode that would be used.
    pub mode: ImportMode,
    /// Whether the database is empty (relevant for Fresh mode).
    pub database_is_empty: bool,
    /// Number of existing rows per table (before import).
    pub existing_rows: BTreeMap<String, usize>,
    /// Number of rows that would be deleted per table (Replace mode).
    pub would_delete: BTreeMap<String, usize>,
    /// Number of rows that would be inserted per table.
    pub would_insert: BTreeMap<String, usize>,
    /// Whether the import would succeed with the given mode.
    pub would_succeed: bool,
    /// Reason for failure if would_succeed is false.
    pub failure_reason: Option<String>,
}

impl DryRunResult {
    fn new(mode: ImportMode) -> Self {
        Self {
            mode,
            database_is_empty: true,
            existing_rows: BTreeMap::new(),
            would_delete: BTreeMap::new(),
            would_insert: BTreeMap::new(),
            would_succeed: true,
            failure_reason: None,
        }
    }

    /// Total number of rows that would be deleted.
    pub fn total_would_delete(&self) -> usize {
        self.would_delete.values().sum()
    }

    /// Total number of rows that would be inserted.
    pub fn total_would_insert(&self) -> usize {
        self.would_insert.values().sum()
    }
}

impl Database {
    /// Import data from a snapshot.
    ///
    /// Validates schema compatibility, applies the mode's pre-import step
    /// (emptiness check or clear), then inserts tables in dependency
    /// order, all within one transaction. Foreign keys stay on: the
    /// multi-pass task insert makes ordering safe without dropping
    /// enforcement, so a snapshot with dangling references rolls back
    /// cleanly instead of half-importing.
    pub fn import_snapshot(
        &self,
        snapshot: &Snapshot,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        if snapshot.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(anyhow!(
                "Schema version mismatch: snapshot is v{}, database is v{}. Migration required.",
                snapshot.schema_version,
                CURRENT_SCHEMA_VERSION
            ));
        }

        let mut result = ImportResult::new();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            match options.mode {
                ImportMode::Fresh => validate_empty(&tx)?,
                ImportMode::Replace => {
                    result.rows_deleted = clear_project_data(&tx)?;
                }
            }

            for table_name in IMPORT_ORDER {
                if let Some(rows) = snapshot.tables.get(*table_name) {
                    let imported = import_table(&tx, table_name, rows)?;
                    result
                        .rows_imported
                        .insert(table_name.to_string(), imported);
                }
            }

            tx.commit()?;
            Ok(())
        })?;

        Ok(result)
    }

    /// Preview what an import would do without making any changes.
    pub fn preview_import(&self, snapshot: &Snapshot, options: &ImportOptions) -> DryRunResult {
        let mut result = DryRunResult::new(options.mode);

        if snapshot.schema_version != CURRENT_SCHEMA_VERSION {
            result.would_succeed = false;
            result.failure_reason = Some(format!(
                "Schema version mismatch: snapshot is v{}, database is v{}. Migration required.",
                snapshot.schema_version, CURRENT_SCHEMA_VERSION
            ));
            return result;
        }

        let existing = match self.table_row_counts() {
            Ok(counts) => counts,
            Err(e) => {
                result.would_succeed = false;
                result.failure_reason = Some(format!("Failed to query database: {}", e));
                return result;
            }
        };
        result.existing_rows = existing.clone();
        result.database_is_empty = existing.values().all(|&count| count == 0);

        match options.mode {
            ImportMode::Fresh => {
                if !result.database_is_empty {
                    result.would_succeed = false;
                    let non_empty: Vec<_> = existing
                        .iter()
                        .filter(|&(_, count)| *count > 0)
                        .map(|(table, count)| format!("{}: {} rows", table, count))
                        .collect();
                    result.failure_reason = Some(format!(
                        "Database is not empty. Use --force to overwrite. Non-empty tables: {}",
                        non_empty.join(", ")
                    ));
                    return result;
                }
            }
            ImportMode::Replace => {
                for (table, count) in &existing {
                    if *count > 0 {
                        result.would_delete.insert(table.clone(), *count);
                    }
                }
            }
        }

        for table_name in IMPORT_ORDER {
            let count = snapshot.tables.get(*table_name).map_or(0, |v| v.len());
            result.would_insert.insert(table_name.to_string(), count);
        }

        result
    }

    fn table_row_counts(&self) -> Result<BTreeMap<String, usize>> {
        self.with_conn(|conn| {
            let mut counts = BTreeMap::new();
            for table in EXPORTED_TABLES {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                counts.insert(table.to_string(), count as usize);
            }
            Ok(counts)
        })
    }
}

/// Fail unless every imported table is empty.
fn validate_empty(conn: &rusqlite::Connection) -> Result<()> {
    for table in EXPORTED_TABLES {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        if count > 0 {
            return Err(anyhow!(
                "Database is not empty: table '{}' contains {} rows. Use --force to overwrite.",
                table,
                count
            ));
        }
    }
    Ok(())
}

/// Clear all project data tables, children before parents.
/// Returns a map of table names to number of rows deleted.
fn clear_project_data(conn: &rusqlite::Connection) -> Result<BTreeMap<String, usize>> {
    let mut deleted = BTreeMap::new();

    for table_name in IMPORT_ORDER.iter().rev() {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table_name),
            [],
            |row| row.get(0),
        )?;

        if count > 0 {
            conn.execute(&format!("DELETE FROM {}", table_name), [])?;
            deleted.insert(table_name.to_string(), count as usize);
        }
    }

    Ok(deleted)
}

/// Import rows into a specific table.
fn import_table(conn: &rusqlite::Connection, table_name: &str, rows: &[Value]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    match table_name {
        "projects" => import_projects(conn, rows),
        "tasks" => import_tasks(conn, rows),
        "blockers" => import_blockers(conn, rows),
        "provider_config" => import_provider_config(conn, rows),
        _ => Err(anyhow!("Unknown table: {}", table_name)),
    }
}

fn import_projects(conn: &rusqlite::Connection, rows: &[Value]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO projects (id, name, description, color, ai_context, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    for row in rows {
        let obj = row.as_object().context("Project row must be an object")?;
        stmt.execute(params![
            get_string(obj, "id")?,
            get_string(obj, "name")?,
            get_opt_string(obj, "description"),
            get_opt_string(obj, "color").unwrap_or_else(|| DEFAULT_PROJECT_COLOR.to_string()),
            get_opt_string(obj, "ai_context"),
            get_opt_i64(obj, "created_at").unwrap_or_else(now_ms),
            get_opt_i64(obj, "updated_at").unwrap_or_else(now_ms),
        ])?;
    }

    Ok(rows.len())
}

/// Insert task rows by fixed-point iteration.
///
/// A row whose parent is not yet present hits the foreign key check and is
/// deferred to the next pass. Iteration stops when everything is in, when a
/// pass makes no progress (dangling references), or at [`MAX_IMPORT_PASSES`].
fn import_tasks(conn: &rusqlite::Connection, rows: &[Value]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO tasks (id, project_id, parent_id, label, position, expanded,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    let mut pending: Vec<&Value> = rows.iter().collect();
    let mut passes = 0;

    while !pending.is_empty() {
        passes += 1;
        if passes > MAX_IMPORT_PASSES {
            return Err(anyhow!(
                "Task import did not converge after {} passes; {} rows still pending",
                MAX_IMPORT_PASSES,
                pending.len()
            ));
        }

        let mut deferred: Vec<&Value> = Vec::new();

        for &row in &pending {
            let obj = row.as_object().context("Task row must be an object")?;
            let inserted = stmt.execute(params![
                get_string(obj, "id")?,
                get_opt_string(obj, "project_id"),
                get_opt_string(obj, "parent_id"),
                get_string(obj, "label")?,
                get_opt_i64(obj, "position").unwrap_or(0),
                get_bool_or(obj, "expanded", true),
                get_opt_i64(obj, "created_at").unwrap_or_else(now_ms),
                get_opt_i64(obj, "updated_at").unwrap_or_else(now_ms),
            ]);

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                {
                    deferred.push(row);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if deferred.len() == pending.len() {
            let leftover: Vec<String> = deferred
                .iter()
                .take(5)
                .filter_map(|row| row.get("id").and_then(|v| v.as_str()).map(String::from))
                .collect();
            return Err(anyhow!(
                "{} task rows reference parents or projects missing from the snapshot: {}",
                deferred.len(),
                leftover.join(", ")
            ));
        }

        pending = deferred;
    }

    Ok(rows.len())
}

fn import_blockers(conn: &rusqlite::Connection, rows: &[Value]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO blockers (id, task_id, blocker_id, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for row in rows {
        let obj = row.as_object().context("Blocker row must be an object")?;
        // A missing id falls back to autoincrement.
        stmt.execute(params![
            get_opt_i64(obj, "id"),
            get_string(obj, "task_id")?,
            get_string(obj, "blocker_id")?,
            get_opt_string(obj, "note"),
            get_opt_i64(obj, "created_at").unwrap_or_else(now_ms),
        ])?;
    }

    Ok(rows.len())
}

fn import_provider_config(conn: &rusqlite::Connection, rows: &[Value]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO provider_config (provider, base_url, model, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    for row in rows {
        let obj = row
            .as_object()
            .context("Provider config row must be an object")?;
        stmt.execute(params![
            get_string(obj, "provider")?,
            get_opt_string(obj, "base_url"),
            get_opt_string(obj, "model"),
            get_opt_i64(obj, "updated_at").unwrap_or_else(now_ms),
        ])?;
    }

    Ok(rows.len())
}

/// Get a required string value from a JSON object.
fn get_string(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Missing or invalid string field: {}", key))
}

/// Get an optional string value from a JSON object.
fn get_opt_string(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| {
        if v.is_null() {
            None
        } else {
            v.as_str().map(|s| s.to_string())
        }
    })
}

/// Get an optional i64 value from a JSON object.
fn get_opt_i64(obj: &serde_json::Map<String, Value>, key: &str) -> Option<i64> {
    obj.get(key)
        .and_then(|v| if v.is_null() { None } else { v.as_i64() })
}

/// Get a bool that may be stored as JSON true/false or as 0/1.
fn get_bool_or(obj: &serde_json::Map<String, Value>, key: &str, default: bool) -> bool {
    obj.get(key)
        .and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        })
        .unwrap_or(default)
}
