use std::collections::HashMap;

use chrono::Utc;
use memovault::slug;
use memovault::storage::models::{FileRecord, FileStatus};
use memovault::storage::{Database, RegistryError, MAX_BULK_FILE_IDS};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(id: &str, owner_id: &str, name: &str, status: FileStatus) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        slug: slug::slug_for(name, id),
        file_name: name.to_string(),
        file_extension: ".txt".to_string(),
        file_type: "text/plain".to_string(),
        file_size: 1024,
        file_path: format!("uploads/{owner_id}/{id}"),
        file_url: None,
        file_hash: "d2a84f4b8b650937ec8f73cd8be2c74a".to_string(),
        file_status: status,
        file_metadata: HashMap::new(),
        file_tags: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Slug derivation
// ============================================================================

#[test]
fn test_slugify() {
    assert_eq!(slug::slugify("Quarterly Report.pdf"), "quarterly-report-pdf");
    assert_eq!(slug::slugify("  spaced   out  "), "spaced-out");
    assert_eq!(slug::slugify("___"), "untitled");
    assert_eq!(slug::slugify("MiXeD-Case_Name"), "mixed-case-name");
}

#[test]
fn test_slug_for_appends_id_suffix() {
    let slug = slug::slug_for("notes.txt", "a81bc81b-dead-4e5d-abff-90865d1e13b1");
    assert_eq!(slug, "notes-txt-a81bc81b");
}

#[test]
fn test_identical_names_get_distinct_slugs() {
    let ids: Vec<String> = (0..5).map(|_| new_id()).collect();
    let slugs: Vec<String> = ids.iter().map(|id| slug::slug_for("notes.txt", id)).collect();

    for (i, a) in slugs.iter().enumerate() {
        for b in slugs.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
}

// ============================================================================
// File CRUD
// ============================================================================

#[test]
fn test_put_and_get_file() {
    let (_dir, db) = test_db();
    let id = new_id();
    let file = sample_file(&id, "owner-1", "report.txt", FileStatus::Draft);

    db.put_file(&file).unwrap();

    let retrieved = db.get_file(&id).unwrap().expect("file should exist");
    assert_eq!(retrieved.id, id);
    assert_eq!(retrieved.owner_id, "owner-1");
    assert_eq!(retrieved.file_name, "report.txt");
    assert_eq!(retrieved.file_status, FileStatus::Draft);
    assert_eq!(retrieved.slug, file.slug);
}

#[test]
fn test_get_file_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_file("nonexistent").unwrap().is_none());
}

#[test]
fn test_get_file_by_slug() {
    let (_dir, db) = test_db();
    let id = new_id();
    let file = sample_file(&id, "owner-1", "summary.txt", FileStatus::Draft);
    db.put_file(&file).unwrap();

    let retrieved = db
        .get_file_by_slug(&file.slug)
        .unwrap()
        .expect("file should resolve by slug");
    assert_eq!(retrieved.id, id);

    assert!(db.get_file_by_slug("no-such-slug").unwrap().is_none());
}

#[test]
fn test_put_file_rejects_duplicate_slug() {
    let (_dir, db) = test_db();
    let id_a = new_id();
    let mut a = sample_file(&id_a, "owner-1", "dup.txt", FileStatus::Draft);
    a.slug = "fixed-slug".to_string();
    db.put_file(&a).unwrap();

    let id_b = new_id();
    let mut b = sample_file(&id_b, "owner-1", "dup.txt", FileStatus::Draft);
    b.slug = "fixed-slug".to_string();

    let result = db.put_file(&b);
    assert!(matches!(result.unwrap_err(), RegistryError::Validation(_)));
    assert!(db.get_file(&id_b).unwrap().is_none());

    assert!(db.file_slug_exists("fixed-slug").unwrap());
    assert!(!db.file_slug_exists("unused-slug").unwrap());
}

#[test]
fn test_list_files_by_owner_and_status() {
    let (_dir, db) = test_db();
    let a = new_id();
    let b = new_id();
    let c = new_id();
    db.put_file(&sample_file(&a, "owner-1", "a.txt", FileStatus::Draft))
        .unwrap();
    db.put_file(&sample_file(&b, "owner-1", "b.txt", FileStatus::Processed))
        .unwrap();
    db.put_file(&sample_file(&c, "owner-2", "c.txt", FileStatus::Draft))
        .unwrap();

    let all = db.list_files("owner-1", None).unwrap();
    assert_eq!(all.len(), 2);

    let drafts = db.list_files("owner-1", Some(FileStatus::Draft)).unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, a);

    assert!(db.list_files("owner-3", None).unwrap().is_empty());
}

// ============================================================================
// Metadata updates
// ============================================================================

#[test]
fn test_update_file_metadata_partial() {
    let (_dir, db) = test_db();
    let id = new_id();
    db.put_file(&sample_file(&id, "owner-1", "old.txt", FileStatus::Draft))
        .unwrap();

    let mut metadata = HashMap::new();
    metadata.insert("topic".to_string(), serde_json::json!("biology"));

    let updated = db
        .update_file_metadata(&id, Some("new.txt"), Some(&metadata), None)
        .unwrap();
    assert_eq!(updated.file_name, "new.txt");
    assert_eq!(
        updated.file_metadata.get("topic").unwrap(),
        &serde_json::json!("biology")
    );
    assert!(updated.file_tags.is_empty());

    // Tags update leaves name and metadata untouched
    let tags = vec!["paper".to_string(), "draft".to_string()];
    let updated = db.update_file_metadata(&id, None, None, Some(&tags)).unwrap();
    assert_eq!(updated.file_name, "new.txt");
    assert_eq!(updated.file_tags, tags);
    assert_eq!(
        updated.file_metadata.get("topic").unwrap(),
        &serde_json::json!("biology")
    );
}

#[test]
fn test_update_file_metadata_keeps_slug() {
    let (_dir, db) = test_db();
    let id = new_id();
    let file = sample_file(&id, "owner-1", "before.txt", FileStatus::Draft);
    db.put_file(&file).unwrap();

    let updated = db
        .update_file_metadata(&id, Some("after.txt"), None, None)
        .unwrap();
    assert_eq!(updated.slug, file.slug);
}

#[test]
fn test_update_file_metadata_name_too_long() {
    let (_dir, db) = test_db();
    let id = new_id();
    db.put_file(&sample_file(&id, "owner-1", "short.txt", FileStatus::Draft))
        .unwrap();

    let long_name = "x".repeat(256);
    let result = db.update_file_metadata(&id, Some(&long_name), None, None);
    assert!(matches!(result.unwrap_err(), RegistryError::Validation(_)));

    assert_eq!(db.get_file(&id).unwrap().unwrap().file_name, "short.txt");
}

#[test]
fn test_update_file_metadata_not_found() {
    let (_dir, db) = test_db();
    let result = db.update_file_metadata("nonexistent", Some("x.txt"), None, None);
    assert!(matches!(result.unwrap_err(), RegistryError::NotFound(_)));
}

// ============================================================================
// Status transitions
// ============================================================================

#[test]
fn test_file_status_transition_grid() {
    use FileStatus::*;
    let statuses = [Draft, Pending, Processed, Failed];
    let legal = [
        (Draft, Pending),
        (Draft, Processed),
        (Pending, Processed),
        (Processed, Draft),
    ];

    let (_dir, db) = test_db();
    for &from in &statuses {
        for &to in &statuses {
            let id = new_id();
            db.put_file(&sample_file(&id, "owner-1", "grid.txt", from))
                .unwrap();

            let result = db.set_file_status(&id, to);
            let current = db.get_file(&id).unwrap().unwrap().file_status;

            if legal.contains(&(from, to)) {
                assert_eq!(result.unwrap().file_status, to, "{from:?} -> {to:?}");
                assert_eq!(current, to);
            } else {
                assert!(
                    matches!(
                        result.unwrap_err(),
                        RegistryError::InvalidTransition { .. }
                    ),
                    "{from:?} -> {to:?} should be rejected"
                );
                assert_eq!(current, from, "{from:?} must be unchanged");
            }
        }
    }
}

#[test]
fn test_set_file_status_not_found() {
    let (_dir, db) = test_db();
    let result = db.set_file_status("nonexistent", FileStatus::Pending);
    assert!(matches!(result.unwrap_err(), RegistryError::NotFound(_)));
}

// ============================================================================
// Bulk status updates
// ============================================================================

#[test]
fn test_bulk_set_file_status() {
    let (_dir, db) = test_db();
    let ids: Vec<String> = (0..3).map(|_| new_id()).collect();
    for id in &ids {
        db.put_file(&sample_file(id, "owner-1", "bulk.txt", FileStatus::Draft))
            .unwrap();
    }

    let updated = db
        .bulk_set_file_status("owner-1", &ids, FileStatus::Pending)
        .unwrap();
    assert_eq!(updated, 3);

    for id in &ids {
        assert_eq!(
            db.get_file(id).unwrap().unwrap().file_status,
            FileStatus::Pending
        );
    }
}

#[test]
fn test_bulk_set_file_status_count_mismatch() {
    let (_dir, db) = test_db();
    let id = new_id();
    db.put_file(&sample_file(&id, "owner-1", "one.txt", FileStatus::Draft))
        .unwrap();

    let ids = vec![id.clone(), "missing-id".to_string()];
    let result = db.bulk_set_file_status("owner-1", &ids, FileStatus::Processed);
    assert!(matches!(result.unwrap_err(), RegistryError::Validation(_)));

    // The whole batch fails before any write
    assert_eq!(
        db.get_file(&id).unwrap().unwrap().file_status,
        FileStatus::Draft
    );
}

#[test]
fn test_bulk_set_file_status_foreign_file_counts_as_unresolved() {
    let (_dir, db) = test_db();
    let mine = new_id();
    let theirs = new_id();
    db.put_file(&sample_file(&mine, "owner-1", "mine.txt", FileStatus::Draft))
        .unwrap();
    db.put_file(&sample_file(&theirs, "owner-2", "theirs.txt", FileStatus::Draft))
        .unwrap();

    let ids = vec![mine.clone(), theirs.clone()];
    let result = db.bulk_set_file_status("owner-1", &ids, FileStatus::Processed);
    assert!(matches!(result.unwrap_err(), RegistryError::Validation(_)));

    assert_eq!(
        db.get_file(&theirs).unwrap().unwrap().file_status,
        FileStatus::Draft
    );
}

#[test]
fn test_bulk_set_file_status_skips_transition_table() {
    let (_dir, db) = test_db();
    let stuck = new_id();
    let failed = new_id();
    db.put_file(&sample_file(&stuck, "owner-1", "stuck.txt", FileStatus::Processed))
        .unwrap();
    db.put_file(&sample_file(&failed, "owner-1", "failed.txt", FileStatus::Failed))
        .unwrap();

    // processed -> pending and failed -> draft are both illegal on the
    // single-file path, but the bulk path applies them anyway.
    db.bulk_set_file_status("owner-1", &[stuck.clone()], FileStatus::Pending)
        .unwrap();
    db.bulk_set_file_status("owner-1", &[failed.clone()], FileStatus::Draft)
        .unwrap();

    assert_eq!(
        db.get_file(&stuck).unwrap().unwrap().file_status,
        FileStatus::Pending
    );
    assert_eq!(
        db.get_file(&failed).unwrap().unwrap().file_status,
        FileStatus::Draft
    );
}

#[test]
fn test_bulk_set_file_status_batch_limit() {
    let (_dir, db) = test_db();
    let ids: Vec<String> = (0..MAX_BULK_FILE_IDS + 1).map(|i| format!("id-{i}")).collect();

    let result = db.bulk_set_file_status("owner-1", &ids, FileStatus::Draft);
    assert!(matches!(result.unwrap_err(), RegistryError::Validation(_)));
}

// ============================================================================
// Users
// ============================================================================

#[test]
fn test_get_or_create_user_by_email() {
    let (_dir, db) = test_db();

    let first = db
        .get_or_create_user_by_email("ada@example.com", Some("ada"))
        .unwrap();
    assert_eq!(first.email, "ada@example.com");
    assert_eq!(first.username.as_deref(), Some("ada"));

    // Second login resolves the same record
    let second = db
        .get_or_create_user_by_email("ada@example.com", None)
        .unwrap();
    assert_eq!(second.id, first.id);

    let by_email = db.get_user_by_email("ada@example.com").unwrap().unwrap();
    assert_eq!(by_email.id, first.id);
}

#[test]
fn test_put_user_rejects_duplicate_email() {
    let (_dir, db) = test_db();

    let first = db.get_or_create_user_by_email("b@example.com", None).unwrap();

    let mut clone = first.clone();
    clone.id = new_id();
    let result = db.put_user(&clone);
    assert!(matches!(result.unwrap_err(), RegistryError::Validation(_)));
}

// ============================================================================
// Purge
// ============================================================================

#[test]
fn test_purge_all() {
    let (_dir, db) = test_db();
    let id = new_id();
    db.put_file(&sample_file(&id, "owner-1", "p.txt", FileStatus::Draft))
        .unwrap();
    db.get_or_create_user_by_email("p@example.com", None).unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.users, 1);

    assert!(db.get_file(&id).unwrap().is_none());
    assert!(db.get_user_by_email("p@example.com").unwrap().is_none());
    assert!(db.list_files("owner-1", None).unwrap().is_empty());
}
