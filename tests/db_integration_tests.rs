//! Integration tests for the database layer.
//!
//! These tests verify the core database operations using an in-memory SQLite database.
//! Tests are organized by module and functionality.

use task_forest::db::Database;
use task_forest::error::{ApiError, ErrorCode};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

/// Pull the typed error back out of an anyhow chain.
fn api_error(err: anyhow::Error) -> ApiError {
    err.downcast::<ApiError>().expect("expected an ApiError")
}

mod project_tests {
    use super::*;

    #[test]
    fn create_project_with_minimal_fields() {
        let db = setup_db();

        let project = db
            .create_project("Website", None, None, None)
            .expect("Failed to create project");

        assert_eq!(project.name, "Website");
        assert!(project.description.is_none());
        assert_eq!(project.color, "#6366f1"); // default
        assert!(project.ai_context.is_none());
        assert!(project.created_at > 0);
        assert_eq!(project.created_at, project.updated_at);
    }

    #[test]
    fn create_project_trims_name() {
        let db = setup_db();

        let project = db.create_project("  Website  ", None, None, None).unwrap();

        assert_eq!(project.name, "Website");
    }

    #[test]
    fn create_project_rejects_blank_name() {
        let db = setup_db();

        let err = api_error(db.create_project("   ", None, None, None).unwrap_err());

        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(err.field.as_deref(), Some("name"));
    }

    #[test]
    fn get_project_returns_none_for_unknown_id() {
        let db = setup_db();

        let result = db.get_project("no-such-project").unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn list_projects_orders_by_creation() {
        let db = setup_db();
        let first = db.create_project("First", None, None, None).unwrap();
        let second = db.create_project("Second", None, None, None).unwrap();

        let projects = db.list_projects().unwrap();

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].id, first.id);
        assert_eq!(projects[1].id, second.id);
    }

    #[test]
    fn update_project_merges_partial_fields() {
        let db = setup_db();
        let project = db
            .create_project("Website", Some("v1".to_string()), None, None)
            .unwrap();

        let updated = db
            .update_project(
                &project.id,
                Some("Website v2".to_string()),
                None,
                Some("#ff0000".to_string()),
                None,
            )
            .unwrap();

        assert_eq!(updated.name, "Website v2");
        assert_eq!(updated.color, "#ff0000");
        // Untouched fields keep their stored values
        assert_eq!(updated.description.as_deref(), Some("v1"));
    }

    #[test]
    fn update_project_clears_field_with_explicit_null() {
        let db = setup_db();
        let project = db
            .create_project("Website", Some("v1".to_string()), None, None)
            .unwrap();

        let updated = db
            .update_project(&project.id, None, Some(None), None, None)
            .unwrap();

        assert!(updated.description.is_none());
        assert_eq!(updated.name, "Website");
    }

    #[test]
    fn update_project_fails_for_unknown_id() {
        let db = setup_db();

        let err = api_error(
            db.update_project("no-such-project", Some("X".to_string()), None, None, None)
                .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn delete_project_removes_project() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();

        db.delete_project(&project.id).unwrap();

        assert!(db.get_project(&project.id).unwrap().is_none());
    }

    #[test]
    fn delete_project_fails_for_unknown_id() {
        let db = setup_db();

        let err = api_error(db.delete_project("no-such-project").unwrap_err());

        assert_eq!(err.code, ErrorCode::NotFound);
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn create_root_task_requires_project() {
        let db = setup_db();

        let err = api_error(db.create_task(None, None, "Orphan").unwrap_err());

        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(err.field.as_deref(), Some("project_id"));
    }

    #[test]
    fn create_root_task_starts_at_position_zero() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();

        let task = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();

        assert_eq!(task.project_id.as_deref(), Some(project.id.as_str()));
        assert!(task.parent_id.is_none());
        assert_eq!(task.position, 0);
        assert!(task.expanded); // default
    }

    #[test]
    fn sibling_positions_increment() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();

        let a = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let b = db
            .create_task(Some(project.id.clone()), None, "Build")
            .unwrap();
        let c = db
            .create_task(Some(project.id.clone()), None, "Ship")
            .unwrap();

        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);
        assert_eq!(c.position, 2);
    }

    #[test]
    fn child_positions_count_from_zero_per_parent() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let root = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();

        let sibling = db
            .create_task(Some(project.id.clone()), None, "Build")
            .unwrap();
        let child = db.create_task(None, Some(root.id.clone()), "Mockups").unwrap();

        // Children are a separate sibling group from roots
        assert_eq!(sibling.position, 1);
        assert_eq!(child.position, 0);
        assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
    }

    #[test]
    fn child_task_inherits_nothing_but_parentage() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let root = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();

        let child = db.create_task(None, Some(root.id.clone()), "Mockups").unwrap();

        // project_id lives only on roots; descendants reach it through the chain
        assert!(child.project_id.is_none());
    }

    #[test]
    fn create_task_fails_for_unknown_parent() {
        let db = setup_db();

        let err = api_error(
            db.create_task(None, Some("no-such-task".to_string()), "Child")
                .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn create_task_fails_for_unknown_project() {
        let db = setup_db();

        let err = api_error(
            db.create_task(Some("no-such-project".to_string()), None, "Root")
                .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn create_task_rejects_blank_label() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();

        let err = api_error(db.create_task(Some(project.id), None, "  ").unwrap_err());

        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(err.field.as_deref(), Some("label"));
    }

    #[test]
    fn update_task_merges_partial_fields() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let task = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();

        let updated = db
            .update_task(&task.id, None, None, Some(false))
            .unwrap();

        assert!(!updated.expanded);
        assert_eq!(updated.label, "Design");
        assert_eq!(updated.position, 0);
    }

    #[test]
    fn update_task_rewrites_position() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let task = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();

        let updated = db
            .update_task(&task.id, Some("Design pass".to_string()), Some(7), None)
            .unwrap();

        assert_eq!(updated.label, "Design pass");
        assert_eq!(updated.position, 7);
    }

    #[test]
    fn update_task_fails_for_unknown_id() {
        let db = setup_db();

        let err = api_error(
            db.update_task("no-such-task", Some("X".to_string()), None, None)
                .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn delete_task_removes_descendants() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let root = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let child = db.create_task(None, Some(root.id.clone()), "Mockups").unwrap();
        let grandchild = db
            .create_task(None, Some(child.id.clone()), "Wireframes")
            .unwrap();

        db.delete_task(&root.id).unwrap();

        assert!(db.get_task(&root.id).unwrap().is_none());
        assert!(db.get_task(&child.id).unwrap().is_none());
        assert!(db.get_task(&grandchild.id).unwrap().is_none());
    }

    #[test]
    fn delete_task_leaves_siblings_alone() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let doomed = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let survivor = db
            .create_task(Some(project.id.clone()), None, "Build")
            .unwrap();

        db.delete_task(&doomed.id).unwrap();

        let kept = db.get_task(&survivor.id).unwrap().unwrap();
        assert_eq!(kept.label, "Build");
        // Positions are not compacted after a delete
        assert_eq!(kept.position, 1);
    }

    #[test]
    fn delete_task_fails_for_unknown_id() {
        let db = setup_db();

        let err = api_error(db.delete_task("no-such-task").unwrap_err());

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn delete_project_cascades_to_tasks() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let root = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let child = db.create_task(None, Some(root.id.clone()), "Mockups").unwrap();

        db.delete_project(&project.id).unwrap();

        assert!(db.get_task(&root.id).unwrap().is_none());
        assert!(db.get_task(&child.id).unwrap().is_none());
    }
}

mod tree_tests {
    use super::*;

    #[test]
    fn tree_for_empty_project_is_empty() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();

        let tree = db.get_task_tree(&project.id).unwrap();

        assert!(tree.is_empty());
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let root = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let child = db.create_task(None, Some(root.id.clone()), "Mockups").unwrap();
        let grandchild = db
            .create_task(None, Some(child.id.clone()), "Wireframes")
            .unwrap();

        let tree = db.get_task_tree(&project.id).unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].task.id, root.id);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].task.id, child.id);
        assert_eq!(tree[0].children[0].children[0].task.id, grandchild.id);
    }

    #[test]
    fn tree_orders_siblings_by_position() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let a = db
            .create_task(Some(project.id.clone()), None, "First")
            .unwrap();
        let b = db
            .create_task(Some(project.id.clone()), None, "Second")
            .unwrap();

        // Swap the two by rewriting positions
        db.update_task(&a.id, None, Some(5), None).unwrap();
        db.update_task(&b.id, None, Some(1), None).unwrap();

        let tree = db.get_task_tree(&project.id).unwrap();

        assert_eq!(tree[0].task.id, b.id);
        assert_eq!(tree[1].task.id, a.id);
    }

    #[test]
    fn tree_is_scoped_to_one_project() {
        let db = setup_db();
        let website = db.create_project("Website", None, None, None).unwrap();
        let app = db.create_project("App", None, None, None).unwrap();
        db.create_task(Some(website.id.clone()), None, "Design")
            .unwrap();
        db.create_task(Some(app.id.clone()), None, "Prototype")
            .unwrap();

        let tree = db.get_task_tree(&website.id).unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].task.label, "Design");
    }

    #[test]
    fn tree_for_unknown_project_is_empty() {
        let db = setup_db();

        let tree = db.get_task_tree("no-such-project").unwrap();

        assert!(tree.is_empty());
    }
}

mod blocker_tests {
    use super::*;

    /// Two root tasks in a fresh project.
    fn setup_pair(db: &Database) -> (String, String) {
        let project = db.create_project("Website", None, None, None).unwrap();
        let blocked = db
            .create_task(Some(project.id.clone()), None, "Ship")
            .unwrap();
        let blocker = db
            .create_task(Some(project.id.clone()), None, "Review")
            .unwrap();
        (blocked.id, blocker.id)
    }

    #[test]
    fn add_blocker_links_two_tasks() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);

        let info = db
            .add_blocker(&blocked, &blocker, Some("needs signoff".to_string()))
            .unwrap();

        assert_eq!(info.task_id, blocked);
        assert_eq!(info.blocker_id, blocker);
        assert_eq!(info.blocker_label, "Review");
        assert_eq!(info.note.as_deref(), Some("needs signoff"));
    }

    #[test]
    fn list_blockers_returns_rows_with_labels() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let blocked = db
            .create_task(Some(project.id.clone()), None, "Ship")
            .unwrap();
        let first = db
            .create_task(Some(project.id.clone()), None, "Review")
            .unwrap();
        let second = db
            .create_task(Some(project.id.clone()), None, "QA")
            .unwrap();
        db.add_blocker(&blocked.id, &first.id, None).unwrap();
        db.add_blocker(&blocked.id, &second.id, None).unwrap();

        let blockers = db.list_blockers(&blocked.id).unwrap();

        assert_eq!(blockers.len(), 2);
        assert_eq!(blockers[0].blocker_label, "Review");
        assert_eq!(blockers[1].blocker_label, "QA");
    }

    #[test]
    fn list_blockers_is_directional() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);
        db.add_blocker(&blocked, &blocker, None).unwrap();

        // The blocking task itself is not blocked
        let reverse = db.list_blockers(&blocker).unwrap();

        assert!(reverse.is_empty());
    }

    #[test]
    fn self_block_is_rejected() {
        let db = setup_db();
        let (blocked, _) = setup_pair(&db);

        let err = api_error(db.add_blocker(&blocked, &blocked, None).unwrap_err());

        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn duplicate_blocker_is_a_conflict() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);
        db.add_blocker(&blocked, &blocker, None).unwrap();

        let err = api_error(db.add_blocker(&blocked, &blocker, None).unwrap_err());

        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[test]
    fn opposite_direction_is_not_a_duplicate() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);
        db.add_blocker(&blocked, &blocker, None).unwrap();

        // A mutual block is two distinct rows
        let reverse = db.add_blocker(&blocker, &blocked, None).unwrap();

        assert_eq!(reverse.task_id, blocker);
    }

    #[test]
    fn add_blocker_fails_for_unknown_endpoint() {
        let db = setup_db();
        let (blocked, _) = setup_pair(&db);

        let err = api_error(db.add_blocker(&blocked, "no-such-task", None).unwrap_err());

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn remove_blocker_deletes_the_relation() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);
        db.add_blocker(&blocked, &blocker, None).unwrap();

        db.remove_blocker(&blocked, &blocker).unwrap();

        assert!(db.list_blockers(&blocked).unwrap().is_empty());
    }

    #[test]
    fn remove_blocker_fails_when_no_relation_exists() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);

        let err = api_error(db.remove_blocker(&blocked, &blocker).unwrap_err());

        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn deleting_either_endpoint_removes_the_relation() {
        let db = setup_db();
        let (blocked, blocker) = setup_pair(&db);
        db.add_blocker(&blocked, &blocker, None).unwrap();

        db.delete_task(&blocker).unwrap();

        assert!(db.list_blockers(&blocked).unwrap().is_empty());
    }

    #[test]
    fn cascade_delete_sweeps_descendant_blockers() {
        let db = setup_db();
        let project = db.create_project("Website", None, None, None).unwrap();
        let root = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let child = db.create_task(None, Some(root.id.clone()), "Mockups").unwrap();
        let outsider = db
            .create_task(Some(project.id.clone()), None, "Ship")
            .unwrap();
        db.add_blocker(&outsider.id, &child.id, None).unwrap();

        // Deleting the root removes the child, and with it the relation
        db.delete_task(&root.id).unwrap();

        assert!(db.list_blockers(&outsider.id).unwrap().is_empty());
    }
}

mod provider_config_tests {
    use super::*;

    #[test]
    fn get_returns_none_when_nothing_stored() {
        let db = setup_db();

        let config = db.get_provider_config("gemini").unwrap();

        assert!(config.is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let db = setup_db();

        db.put_provider_config(
            "openai",
            Some("https://proxy.internal/v1".to_string()),
            Some("gpt-4.1".to_string()),
        )
        .unwrap();

        let config = db.get_provider_config("openai").unwrap().unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.base_url.as_deref(), Some("https://proxy.internal/v1"));
        assert_eq!(config.model.as_deref(), Some("gpt-4.1"));
    }

    #[test]
    fn put_replaces_both_fields() {
        let db = setup_db();
        db.put_provider_config(
            "openai",
            Some("https://proxy.internal/v1".to_string()),
            Some("gpt-4.1".to_string()),
        )
        .unwrap();

        // A second put with None clears the previously stored value
        db.put_provider_config("openai", None, Some("o3-mini".to_string()))
            .unwrap();

        let config = db.get_provider_config("openai").unwrap().unwrap();
        assert!(config.base_url.is_none());
        assert_eq!(config.model.as_deref(), Some("o3-mini"));
    }

    #[test]
    fn providers_are_stored_independently() {
        let db = setup_db();
        db.put_provider_config("openai", None, Some("gpt-4.1".to_string()))
            .unwrap();

        assert!(db.get_provider_config("gemini").unwrap().is_none());
    }

    #[test]
    fn ai_call_log_accepts_rows() {
        let db = setup_db();

        db.log_ai_call(
            "gemini",
            "gemini-2.0-flash",
            "breakdown",
            "Break down: Ship v1",
            Some("[\"a\", \"b\"]"),
            None,
            123,
        )
        .unwrap();
        db.log_ai_call(
            "openai",
            "gpt-4.1",
            "pricing",
            "Extract prices",
            None,
            Some("upstream returned 500"),
            45,
        )
        .unwrap();
    }
}

mod scenario_tests {
    use super::*;

    /// End-to-end walk through a realistic planning session.
    #[test]
    fn plan_a_release_from_scratch() {
        let db = setup_db();

        let project = db
            .create_project(
                "Launch",
                Some("Q3 release".to_string()),
                None,
                Some("A small consumer web app".to_string()),
            )
            .unwrap();

        let design = db
            .create_task(Some(project.id.clone()), None, "Design")
            .unwrap();
        let build = db
            .create_task(Some(project.id.clone()), None, "Build")
            .unwrap();
        let ship = db
            .create_task(Some(project.id.clone()), None, "Ship v1")
            .unwrap();

        // Break "Build" into subtasks the way the AI endpoint would
        for label in ["Backend", "Frontend", "Tests"] {
            db.create_task(None, Some(build.id.clone()), label).unwrap();
        }

        db.add_blocker(&ship.id, &build.id, Some("code complete".to_string()))
            .unwrap();
        db.add_blocker(&ship.id, &design.id, None).unwrap();

        let tree = db.get_task_tree(&project.id).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[1].task.label, "Build");
        assert_eq!(tree[1].children.len(), 3);
        assert_eq!(tree[1].children[2].task.label, "Tests");

        let blockers = db.list_blockers(&ship.id).unwrap();
        assert_eq!(blockers.len(), 2);

        // Design wraps up; Ship is still gated on Build
        db.delete_task(&design.id).unwrap();
        let blockers = db.list_blockers(&ship.id).unwrap();
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].blocker_label, "Build");

        // Tear the whole project down
        db.delete_project(&project.id).unwrap();
        assert!(db.get_task_tree(&project.id).unwrap().is_empty());
        assert!(db.get_task(&ship.id).unwrap().is_none());
    }
}
