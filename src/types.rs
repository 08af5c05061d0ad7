//! Core types for the task-forest store and API.

use serde::{Deserialize, Serialize};

/// A project owning a forest of root tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Hex color used by clients when rendering the project.
    pub color: String,
    /// Free-text context prepended to AI breakdown prompts for this project.
    pub ai_context: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A single task row.
///
/// Root tasks carry `project_id` and a NULL `parent_id`; non-root tasks
/// carry `parent_id` and inherit project membership through the parent
/// chain (`project_id` stays NULL, never duplicated down the tree).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    pub label: String,
    /// Sibling ordering hint. Advisory: duplicates are tolerated and
    /// created_at breaks display ties.
    pub position: i64,
    /// Persisted UI hint: whether the node is shown expanded.
    pub expanded: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task with its children, as returned by tree retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskTree>,
}

/// A blocker relation joined with the blocking task's label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerInfo {
    pub id: i64,
    /// The blocked task.
    pub task_id: String,
    /// The blocking task.
    pub blocker_id: String,
    pub blocker_label: String,
    pub note: Option<String>,
    pub created_at: i64,
}

/// Stored per-provider overrides. Secrets are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub updated_at: i64,
}

impl TaskTree {
    /// Wrap a task as a leaf node.
    pub fn leaf(task: Task) -> Self {
        Self {
            task,
            children: Vec::new(),
        }
    }

    /// Total number of tasks in this subtree, including the root.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TaskTree::count).sum::<usize>()
    }
}
