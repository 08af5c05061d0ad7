//! Export functionality for the task database.
//!
//! Serializes project data tables into a [`Snapshot`]. Each table is
//! queried with deterministic ordering to produce stable, diffable
//! output.

use super::Database;
use super::projects::{PROJECT_COLUMNS, parse_project_row};
use super::providers::parse_provider_config_row;
use super::tasks::{TASK_COLUMNS, parse_task_row};
use crate::snapshot::{Snapshot, get_table_ordering};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

/// Raw blocker row as stored, without the label join used by the read API.
#[derive(Debug, Serialize)]
struct BlockerRow {
    id: i64,
    task_id: String,
    blocker_id: String,
    note: Option<String>,
    created_at: i64,
}

fn to_values<T: Serialize>(rows: Vec<T>) -> Result<Vec<Value>> {
    rows.into_iter()
        .map(|row| serde_json::to_value(row).map_err(Into::into))
        .collect()
}

impl Database {
    /// Export project data tables into a snapshot.
    ///
    /// `tables` limits the export to the named subset; None exports every
    /// project table. The ephemeral AI call log is never included.
    pub fn export_snapshot(&self, tables: Option<&[String]>) -> Result<Snapshot> {
        let should_export =
            |table: &str| -> bool { tables.is_none_or(|t| t.iter().any(|s| s == table)) };

        let mut snapshot = Snapshot::new();

        if should_export("projects") {
            snapshot
                .tables
                .insert("projects".to_string(), self.export_projects()?);
        }

        if should_export("tasks") {
            snapshot
                .tables
                .insert("tasks".to_string(), self.export_tasks()?);
        }

        if should_export("blockers") {
            snapshot
                .tables
                .insert("blockers".to_string(), self.export_blockers()?);
        }

        if should_export("provider_config") {
            snapshot
                .tables
                .insert("provider_config".to_string(), self.export_provider_config()?);
        }

        Ok(snapshot)
    }

    fn export_projects(&self) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM projects {}",
                PROJECT_COLUMNS,
                get_table_ordering("projects")
            );
            let mut stmt = conn.prepare(&sql)?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            to_values(projects)
        })
    }

    fn export_tasks(&self) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM tasks {}",
                TASK_COLUMNS,
                get_table_ordering("tasks")
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            to_values(tasks)
        })
    }

    fn export_blockers(&self) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, task_id, blocker_id, note, created_at FROM blockers {}",
                get_table_ordering("blockers")
            );
            let mut stmt = conn.prepare(&sql)?;
            let blockers = stmt
                .query_map([], |row| {
                    Ok(BlockerRow {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        blocker_id: row.get(2)?,
                        note: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            to_values(blockers)
        })
    }

    fn export_provider_config(&self) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT provider, base_url, model, updated_at FROM provider_config {}",
                get_table_ordering("provider_config")
            );
            let mut stmt = conn.prepare(&sql)?;
            let configs = stmt
                .query_map([], parse_provider_config_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            to_values(configs)
        })
    }
}
