//! Project operations.
//!
//! Projects own forests of root tasks. Deleting a project cascades to its
//! whole forest and every blocker relation inside it.

use anyhow::Result;
use rusqlite::{Row, params};

use super::{Database, new_id, now_ms};
use crate::error::ApiError;
use crate::types::Project;

/// Color assigned when a project is created without one.
pub const DEFAULT_PROJECT_COLOR: &str = "#6366f1";

/// Parse a project row in SELECT column order.
pub(crate) fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        ai_context: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) const PROJECT_COLUMNS: &str =
    "id, name, description, color, ai_context, created_at, updated_at";

impl Database {
    /// Create a project. Name must be non-empty.
    pub fn create_project(
        &self,
        name: &str,
        description: Option<String>,
        color: Option<String>,
        ai_context: Option<String>,
    ) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(ApiError::missing_field("name").into());
        }

        let project = Project {
            id: new_id(),
            name: name.trim().to_string(),
            description,
            color: color.unwrap_or_else(|| DEFAULT_PROJECT_COLOR.to_string()),
            ai_context,
            created_at: now_ms(),
            updated_at: now_ms(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, description, color, ai_context, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project.id,
                    project.name,
                    project.description,
                    project.color,
                    project.ai_context,
                    project.created_at,
                    project.updated_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(project)
    }

    /// Fetch a project by id.
    pub fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
            match conn.query_row(&sql, params![project_id], parse_project_row) {
                Ok(project) => Ok(Some(project)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// List all projects in creation order.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM projects ORDER BY created_at, id",
                PROJECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// Update a project with merge-patch semantics. `None` leaves a field
    /// unchanged; `Some(None)` clears a nullable field.
    pub fn update_project(
        &self,
        project_id: &str,
        name: Option<String>,
        description: Option<Option<String>>,
        color: Option<String>,
        ai_context: Option<Option<String>>,
    ) -> Result<Project> {
        if let Some(ref name) = name {
            if name.trim().is_empty() {
                return Err(ApiError::missing_field("name").into());
            }
        }

        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
            let existing = match conn.query_row(&sql, params![project_id], parse_project_row) {
                Ok(project) => project,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(ApiError::project_not_found(project_id).into());
                }
                Err(e) => return Err(e.into()),
            };

            let updated = Project {
                id: existing.id,
                name: name.map(|n| n.trim().to_string()).unwrap_or(existing.name),
                description: description.unwrap_or(existing.description),
                color: color.unwrap_or(existing.color),
                ai_context: ai_context.unwrap_or(existing.ai_context),
                created_at: existing.created_at,
                updated_at: now_ms(),
            };

            conn.execute(
                "UPDATE projects
                 SET name = ?2, description = ?3, color = ?4, ai_context = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    updated.id,
                    updated.name,
                    updated.description,
                    updated.color,
                    updated.ai_context,
                    updated.updated_at,
                ],
            )?;

            Ok(updated)
        })
    }

    /// Delete a project. The store cascades to the entire task forest and
    /// every blocker relation inside it.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            if affected == 0 {
                return Err(ApiError::project_not_found(project_id).into());
            }
            Ok(())
        })
    }
}
