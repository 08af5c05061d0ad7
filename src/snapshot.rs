//! Structured snapshots of the task database.
//!
//! Snapshots serve backup, migration between instances, and
//! human-readable diffs in git. The table payload is generic JSON so a
//! snapshot written by an older schema can still be inspected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema version of the current database.
/// This should be updated when the database schema changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Export format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

/// Tables that are exported (project data).
pub const EXPORTED_TABLES: &[&str] = &["projects", "tasks", "blockers", "provider_config"];

/// Tables excluded from export (ephemeral/runtime).
pub const EXCLUDED_TABLES: &[&str] = &["ai_call_log"];

/// A structured snapshot of the task database.
///
/// The `tables` field uses generic JSON values keyed by table name so any
/// export conforming to the shape can be loaded and inspected, even across
/// schema versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Database schema version at export time.
    pub schema_version: i32,

    /// Export format version (semver)
    pub export_version: String,

    /// ISO 8601 timestamp of export
    pub exported_at: String,

    /// Tool name and version that created this export
    pub exported_by: String,

    /// Table data, keyed by table name.
    /// Each table is an array of row objects with column names as keys.
    pub tables: BTreeMap<String, Vec<Value>>,
}

impl Snapshot {
    /// Create a new empty snapshot with current metadata.
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            export_version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            exported_by: format!("task-forest v{}", env!("CARGO_PKG_VERSION")),
            tables: BTreeMap::new(),
        }
    }

    /// Load a snapshot from JSON data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a snapshot from a file (supports both plain JSON and gzip).
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        use std::fs::File;
        use std::io::{BufReader, Read};

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        // Check for gzip magic bytes
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic)?;

        // Reset to start
        drop(reader);
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        if magic == [0x1f, 0x8b] {
            let decoder = flate2::read::GzDecoder::new(reader);
            let snapshot: Snapshot = serde_json::from_reader(decoder)?;
            Ok(snapshot)
        } else {
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            Ok(snapshot)
        }
    }

    /// Serialize to JSON with pretty formatting.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get rows for a specific table.
    pub fn get_table(&self, name: &str) -> Option<&Vec<Value>> {
        self.tables.get(name)
    }

    /// Check if this snapshot's schema matches the current version.
    pub fn is_schema_compatible(&self) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION
    }

    /// Get the list of tables present in this snapshot.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Row ordering specifications for each exported table.
/// These ensure deterministic ordering for git diffs.
pub fn get_table_ordering(table: &str) -> &'static str {
    match table {
        "projects" => "ORDER BY id",
        "tasks" => "ORDER BY id",
        "blockers" => "ORDER BY task_id, blocker_id",
        "provider_config" => "ORDER BY provider",
        _ => "ORDER BY rowid",
    }
}
