//! Model Scope and Datastore Tests
//!
//! Tests for datastore invariants:
//! - A model selector applies to exactly one call
//! - `_id` is unique across every model of the collection
//! - Rejected writes leave documents and indexes unchanged
//! - Configuration files drive tree fields and startup indexes

use std::io::Write;

use cursordb::{
    Datastore, Document, IndexOptions, Query, StoreConfig, StoreError, TreeOptions,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

// =============================================================================
// Helper Functions
// =============================================================================

fn patch(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// =============================================================================
// Model Selector
// =============================================================================

/// Inserted documents carry the selected model.
#[test]
fn test_insert_tags_model() {
    let db = Datastore::new();
    let doc = db.model("User").insert(json!({"name": "Ann"})).unwrap();

    assert_eq!(doc["_model"], json!("User"));
    assert!(doc["_id"].is_string());
}

/// Reads through the selector only see the selected model.
#[test]
fn test_reads_are_scoped() {
    let db = Datastore::new();
    db.model("User").insert(json!({"name": "Ann"})).unwrap();
    db.model("Group").insert(json!({"name": "Ann"})).unwrap();

    assert_eq!(db.count(&Query::eq("name", "Ann")).unwrap(), 2);
    assert_eq!(db.model("User").count(&Query::eq("name", "Ann")).unwrap(), 1);

    let found = db.model("Group").find_one(&Query::all()).unwrap().unwrap();
    assert_eq!(found["_model"], json!("Group"));

    let rows = db.model("User").find(Query::all()).exec().unwrap();
    assert_eq!(rows.column("_model"), vec![json!("User")]);
}

/// Selection does not leak into the next call on the datastore.
#[test]
fn test_selection_is_one_shot() {
    let db = Datastore::new();
    db.model("User").insert(json!({"name": "Ann"})).unwrap();
    let plain = db.insert(json!({"name": "Bob"})).unwrap();

    assert!(plain.get("_model").is_none());
    assert_eq!(db.find(Query::all()).exec().unwrap().len(), 2);
}

/// Updates can not move a document to another model.
#[test]
fn test_update_keeps_model() {
    let db = Datastore::new();
    db.model("User").insert(json!({"name": "Ann"})).unwrap();

    let changed = db
        .model("User")
        .update(
            &Query::eq("name", "Ann"),
            &patch(json!({"name": "Anna", "_model": "Group"})),
            false,
        )
        .unwrap();
    assert_eq!(changed, 1);

    let doc = db.find_one(&Query::eq("name", "Anna")).unwrap().unwrap();
    assert_eq!(doc["_model"], json!("User"));
}

/// Removal through the selector spares other models.
#[test]
fn test_remove_is_scoped() {
    let db = Datastore::new();
    db.model("User").insert(json!({"name": "Ann"})).unwrap();
    db.model("Group").insert(json!({"name": "Ann"})).unwrap();

    let removed = db.model("User").remove(&Query::all(), true).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(db.count(&Query::all()).unwrap(), 1);
}

/// An unscoped `_model` filter binds the cursor to that model.
#[test]
fn test_unscoped_find_on_model_field() {
    let db = Datastore::new();
    db.model("User")
        .insert_many(vec![json!({"name": "Ann"}), json!({"name": "Bob"})])
        .unwrap();
    db.model("Group").insert(json!({"name": "Admins"})).unwrap();

    let query = Query::from_json(&json!({"_model": "User"})).unwrap();
    let result = db.find(query.clone()).exec().unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.len(), db.count(&query).unwrap());
    assert!(result.rows.iter().all(|r| r.get("_model") == Some(&json!("User"))));
}

/// The bound model serves as the join home of an unscoped cursor.
#[test]
fn test_unscoped_model_filter_enables_joins() {
    let db = Datastore::new();
    let group = db.model("Group").insert(json!({"name": "Admins"})).unwrap();
    db.model("User")
        .insert(json!({"name": "Ann", "fkGroupId": group["_id"].clone()}))
        .unwrap();

    let result = db
        .find(Query::eq("_model", "Group"))
        .left_join("_id", "User:fkGroupId")
        .exec()
        .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.rows[0].get("Group:name"), Some(&json!("Admins")));
    assert_eq!(result.rows[0].get("User:name"), Some(&json!("Ann")));
}

// =============================================================================
// Unique Constraints
// =============================================================================

/// `_id` collisions are rejected across models.
#[test]
fn test_id_unique_across_models() {
    let db = Datastore::new();
    db.model("User").insert(json!({"_id": "x1", "name": "Ann"})).unwrap();

    let err = db
        .model("Group")
        .insert(json!({"_id": "x1", "name": "Admins"}))
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueConstraintViolation { .. }));
    assert_eq!(db.count(&Query::all()).unwrap(), 1);
    assert_eq!(db.metrics().unique_violations, 1);
}

/// A batch with one conflict stores nothing.
#[test]
fn test_insert_many_is_atomic() {
    let db = Datastore::new();
    db.ensure_index(IndexOptions::unique("email")).unwrap();
    db.insert(json!({"email": "a@x"})).unwrap();

    let err = db
        .insert_many(vec![json!({"email": "b@x"}), json!({"email": "a@x"})])
        .unwrap_err();
    assert_eq!(err.code(), "CURSORDB_UNIQUE_CONSTRAINT_VIOLATION");
    assert_eq!(db.count(&Query::all()).unwrap(), 1);

    // The rolled back value is free again
    db.insert(json!({"email": "b@x"})).unwrap();
}

/// Unique indexes can not be built over duplicated data.
#[test]
fn test_unique_index_setup_fails_on_duplicates() {
    let db = Datastore::new();
    db.insert_many(vec![json!({"email": "a@x"}), json!({"email": "a@x"})])
        .unwrap();

    let err = db.ensure_index(IndexOptions::unique("email")).unwrap_err();
    assert!(matches!(err, StoreError::UniqueConstraintSetup { .. }));
    assert!(!db.indexed_fields().unwrap().contains(&"email".to_string()));
}

/// Documents without the field are not constrained.
#[test]
fn test_missing_field_not_constrained() {
    let db = Datastore::new();
    db.ensure_index(IndexOptions::unique("email")).unwrap();
    db.insert(json!({"name": "a"})).unwrap();
    db.insert(json!({"name": "b"})).unwrap();
    assert_eq!(db.count(&Query::all()).unwrap(), 2);
}

/// A conflicting update leaves every document as it was.
#[test]
fn test_conflicting_update_rolls_back() {
    let db = Datastore::new();
    db.ensure_index(IndexOptions::unique("email")).unwrap();
    db.insert_many(vec![
        json!({"name": "a", "email": "a@x"}),
        json!({"name": "b", "email": "b@x"}),
    ])
    .unwrap();

    let err = db
        .update(&Query::all(), &patch(json!({"email": "same@x"})), true)
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueConstraintViolation { .. }));

    assert_eq!(db.count(&Query::eq("email", "a@x")).unwrap(), 1);
    assert_eq!(db.count(&Query::eq("email", "b@x")).unwrap(), 1);
    assert_eq!(db.count(&Query::eq("email", "same@x")).unwrap(), 0);
}

// =============================================================================
// Candidate Selection
// =============================================================================

/// Indexed model scopes avoid full scans.
#[test]
fn test_model_index_used_for_candidates() {
    let db = Datastore::new();
    db.ensure_index(IndexOptions::new("_model")).unwrap();
    db.model("User").insert(json!({"name": "Ann"})).unwrap();
    db.model("Group").insert(json!({"name": "Admins"})).unwrap();

    let result = db.model("User").find(Query::all()).exec().unwrap();
    assert_eq!(result.candidates_scanned, 1);

    let metrics = db.metrics();
    assert_eq!(metrics.index_lookups, 1);
    assert_eq!(metrics.full_scans, 0);
}

/// Cursor rows are copies; metadata never reaches the store.
#[test]
fn test_rows_do_not_alias_store() {
    let db = Datastore::new();
    db.model("Tree").insert(json!({"id": 1, "name": "Root"})).unwrap();

    let result = db
        .model("Tree")
        .find(Query::all())
        .as_tree(TreeOptions::new())
        .exec()
        .unwrap();
    assert_eq!(result.rows[0].meta.level, Some(0));

    let stored = db.find_one(&Query::all()).unwrap().unwrap();
    assert!(stored.get("__meta").is_none());
}

// =============================================================================
// Configuration
// =============================================================================

/// Configured tree fields become the cursor defaults.
#[test]
fn test_open_with_config_file() {
    let file = config_file(
        r#"{
            "tree_id_field": "key",
            "tree_parent_field": "parent",
            "indexes": [{"field_name": "_model"}, {"field_name": "code", "unique": true}]
        }"#,
    );
    let db = Datastore::open(file.path()).unwrap();
    assert_eq!(
        db.indexed_fields().unwrap(),
        vec!["_id".to_string(), "_model".to_string(), "code".to_string()]
    );

    db.model("Node")
        .insert_many(vec![
            json!({"key": "r", "name": "Root", "code": 1}),
            json!({"key": "c", "name": "Child", "parent": "r", "code": 2}),
        ])
        .unwrap();

    let result = db
        .model("Node")
        .find(Query::all())
        .as_tree(TreeOptions::new().open(["r"]))
        .exec()
        .unwrap();
    assert_eq!(result.column("name"), vec![json!("Root"), json!("Child")]);
    assert_eq!(result.rows[0].meta.child_count, Some(1));

    let err = db.insert(json!({"code": 1})).unwrap_err();
    assert!(matches!(err, StoreError::UniqueConstraintViolation { .. }));
}

/// Invalid configuration is rejected before the datastore opens.
#[test]
fn test_open_rejects_invalid_config() {
    let file = config_file(r#"{"tree_id_field": "x", "tree_parent_field": "x"}"#);
    let err = Datastore::open(file.path()).unwrap_err();
    assert_eq!(err.code(), "CURSORDB_CONFIG");

    let err = Datastore::with_config(StoreConfig {
        indexes: vec![IndexOptions::new("a"), IndexOptions::new("a")],
        ..StoreConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}
