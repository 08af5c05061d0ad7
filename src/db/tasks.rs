//! Task CRUD and tree retrieval.
//!
//! Tasks form a forest per project: root tasks reference the project
//! directly, every other task reaches it through its parent chain. Tree
//! retrieval is a single recursive query folded into nested structures in
//! memory; deletion relies on the store's cascade rules.

use super::{Database, new_id, now_ms};
use crate::error::ApiError;
use crate::types::{Task, TaskTree};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::HashMap;

pub(crate) const TASK_COLUMNS: &str =
    "id, project_id, parent_id, label, position, expanded, created_at, updated_at";

/// Parse a task row selected in [`TASK_COLUMNS`] order.
pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        parent_id: row.get(2)?,
        label: row.get(3)?,
        position: row.get(4)?,
        expanded: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    match conn.query_row(&sql, params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Get a single task by id.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Retrieve a project's full task forest as nested trees.
    ///
    /// One recursive query walks down from the project's root tasks,
    /// tagging each row with its depth. Rows come back ordered by depth,
    /// then position, then created_at, so the in-memory fold preserves
    /// sibling order without re-sorting. An unknown project id yields an
    /// empty forest, not an error.
    pub fn get_task_tree(&self, project_id: &str) -> Result<Vec<TaskTree>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH RECURSIVE subtree(id, project_id, parent_id, label, position, expanded,
                                        created_at, updated_at, depth) AS (
                     SELECT t.id, t.project_id, t.parent_id, t.label, t.position, t.expanded,
                            t.created_at, t.updated_at, 0
                     FROM tasks t
                     WHERE t.project_id = ?1 AND t.parent_id IS NULL
                     UNION ALL
                     SELECT t.id, t.project_id, t.parent_id, t.label, t.position, t.expanded,
                            t.created_at, t.updated_at, s.depth + 1
                     FROM tasks t
                     JOIN subtree s ON t.parent_id = s.id
                 )
                 SELECT id, project_id, parent_id, label, position, expanded,
                        created_at, updated_at, depth
                 FROM subtree
                 ORDER BY depth, position, created_at",
            )?;

            let rows = stmt
                .query_map(params![project_id], |row| {
                    Ok((parse_task_row(row)?, row.get::<_, i64>(8)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(build_forest(rows))
        })
    }

    /// Create a task.
    ///
    /// Root tasks (no parent) require a project id. Non-root tasks store a
    /// NULL project id: project membership is inherited through the parent
    /// chain, never duplicated down the tree. An unknown parent or project
    /// fails with NotFound. Position is one past the current maximum among
    /// exact siblings, 0 for the first. The read-then-insert runs in one
    /// transaction, but positions stay advisory: writers on separate
    /// handles may still produce duplicates, and created_at breaks the tie
    /// in tree order.
    pub fn create_task(
        &self,
        project_id: Option<String>,
        parent_id: Option<String>,
        label: &str,
    ) -> Result<Task> {
        if label.trim().is_empty() {
            return Err(ApiError::missing_field("label").into());
        }
        if parent_id.is_none() && project_id.is_none() {
            return Err(
                ApiError::invalid_argument("project_id is required for root tasks")
                    .with_field("project_id")
                    .into(),
            );
        }

        // Non-root tasks never carry a direct project reference.
        let project_id = if parent_id.is_some() { None } else { project_id };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(parent) = &parent_id {
                get_task_internal(&tx, parent)?.ok_or_else(|| ApiError::task_not_found(parent))?;
            } else if let Some(project) = &project_id {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
                    params![project],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(ApiError::project_not_found(project).into());
                }
            }

            let position: i64 = match &parent_id {
                Some(parent) => tx.query_row(
                    "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE parent_id = ?1",
                    params![parent],
                    |row| row.get(0),
                )?,
                None => tx.query_row(
                    "SELECT COALESCE(MAX(position) + 1, 0)
                     FROM tasks WHERE project_id = ?1 AND parent_id IS NULL",
                    params![project_id],
                    |row| row.get(0),
                )?,
            };

            let task = Task {
                id: new_id(),
                project_id: project_id.clone(),
                parent_id: parent_id.clone(),
                label: label.trim().to_string(),
                position,
                expanded: true,
                created_at: now_ms(),
                updated_at: now_ms(),
            };

            tx.execute(
                "INSERT INTO tasks (id, project_id, parent_id, label, position, expanded,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id,
                    task.project_id,
                    task.parent_id,
                    task.label,
                    task.position,
                    task.expanded,
                    task.created_at,
                    task.updated_at,
                ],
            )?;

            tx.commit()?;
            Ok(task)
        })
    }

    /// Update a task with merge-patch semantics: absent fields keep their
    /// stored values. Position writes are taken as-is; reordering is the
    /// caller's concern.
    pub fn update_task(
        &self,
        task_id: &str,
        label: Option<String>,
        position: Option<i64>,
        expanded: Option<bool>,
    ) -> Result<Task> {
        if let Some(ref label) = label {
            if label.trim().is_empty() {
                return Err(ApiError::missing_field("label").into());
            }
        }

        self.with_conn(|conn| {
            let existing = get_task_internal(conn, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            let updated = Task {
                label: label
                    .map(|l| l.trim().to_string())
                    .unwrap_or_else(|| existing.label.clone()),
                position: position.unwrap_or(existing.position),
                expanded: expanded.unwrap_or(existing.expanded),
                updated_at: now_ms(),
                ..existing
            };

            conn.execute(
                "UPDATE tasks SET label = ?2, position = ?3, expanded = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    updated.id,
                    updated.label,
                    updated.position,
                    updated.expanded,
                    updated.updated_at,
                ],
            )?;

            Ok(updated)
        })
    }

    /// Delete a task. ON DELETE CASCADE removes the whole descendant
    /// subtree and every blocker relation touching a removed task; there
    /// is no has-children guard.
    pub fn delete_task(&self, task_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            if affected == 0 {
                return Err(ApiError::task_not_found(task_id).into());
            }
            Ok(())
        })
    }
}

/// Fold a depth-ordered flat result set into nested trees.
///
/// Levels attach deepest-first so every parent is still in the map when
/// its children arrive; query order within a level keeps siblings in
/// position order.
fn build_forest(rows: Vec<(Task, i64)>) -> Vec<TaskTree> {
    let mut nodes: HashMap<String, TaskTree> = HashMap::with_capacity(rows.len());
    let mut levels: Vec<Vec<String>> = Vec::new();

    for (task, depth) in rows {
        let depth = depth as usize;
        if levels.len() <= depth {
            levels.resize_with(depth + 1, Vec::new);
        }
        levels[depth].push(task.id.clone());
        nodes.insert(task.id.clone(), TaskTree::leaf(task));
    }

    for level in levels.iter().skip(1).rev() {
        for id in level {
            let Some(node) = nodes.remove(id) else { continue };
            let Some(parent_id) = node.task.parent_id.clone() else {
                continue;
            };
            if let Some(parent) = nodes.get_mut(&parent_id) {
                parent.children.push(node);
            }
        }
    }

    levels
        .first()
        .map(|roots| roots.iter().filter_map(|id| nodes.remove(id)).collect())
        .unwrap_or_default()
}
