//! Blocker relations between tasks.
//!
//! A blocker row says "task_id is blocked by blocker_id". The relation is
//! non-owning: either endpoint's deletion removes the row via cascade.
//! Nothing here walks the graph, so blocker cycles (A blocked by B blocked
//! by A) can be recorded; callers that care must check before writing.

use super::tasks::get_task_internal;
use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::BlockerInfo;
use anyhow::Result;
use rusqlite::{Row, params};

fn parse_blocker_row(row: &Row) -> rusqlite::Result<BlockerInfo> {
    Ok(BlockerInfo {
        id: row.get(0)?,
        task_id: row.get(1)?,
        blocker_id: row.get(2)?,
        blocker_label: row.get(3)?,
        note: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    /// List every relation where `task_id` is the blocked side, joined with
    /// the blocking task's label, oldest first. Unknown tasks simply have no
    /// relations.
    pub fn list_blockers(&self, task_id: &str) -> Result<Vec<BlockerInfo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.id, b.task_id, b.blocker_id, t.label, b.note, b.created_at
                 FROM blockers b
                 JOIN tasks t ON t.id = b.blocker_id
                 WHERE b.task_id = ?1
                 ORDER BY b.created_at, b.id",
            )?;

            let blockers = stmt
                .query_map(params![task_id], parse_blocker_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(blockers)
        })
    }

    /// Record that `task_id` is blocked by `blocker_id`.
    ///
    /// Self-blocks are rejected before the write, unknown endpoints fail
    /// with NotFound, and a duplicate pair surfaces the store's unique
    /// violation as Conflict rather than leaking store errors.
    pub fn add_blocker(
        &self,
        task_id: &str,
        blocker_id: &str,
        note: Option<String>,
    ) -> Result<BlockerInfo> {
        if task_id == blocker_id {
            return Err(ApiError::self_block(task_id).into());
        }

        self.with_conn(|conn| {
            for id in [task_id, blocker_id] {
                if get_task_internal(conn, id)?.is_none() {
                    return Err(ApiError::task_not_found(id).into());
                }
            }

            let inserted = conn.execute(
                "INSERT INTO blockers (task_id, blocker_id, note, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, blocker_id, note, now_ms()],
            );

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return Err(ApiError::duplicate_blocker(task_id, blocker_id).into());
                }
                Err(e) => return Err(e.into()),
            }

            let id = conn.last_insert_rowid();
            let info = conn.query_row(
                "SELECT b.id, b.task_id, b.blocker_id, t.label, b.note, b.created_at
                 FROM blockers b
                 JOIN tasks t ON t.id = b.blocker_id
                 WHERE b.id = ?1",
                params![id],
                parse_blocker_row,
            )?;

            Ok(info)
        })
    }

    /// Remove a relation by (blocked, blocker) pair.
    pub fn remove_blocker(&self, task_id: &str, blocker_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM blockers WHERE task_id = ?1 AND blocker_id = ?2",
                params![task_id, blocker_id],
            )?;
            if affected == 0 {
                return Err(ApiError::blocker_not_found(task_id, blocker_id).into());
            }
            Ok(())
        })
    }
}
