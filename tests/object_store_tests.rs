use bytes::Bytes;
use memovault::object_store::{content_hash, LocalStore, ObjectStore};

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let data = Bytes::from("hello world");
    store.put("test-key", data.clone()).await.unwrap();

    let retrieved = store.get("test-key").await.unwrap();
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_local_store_namespaced_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    // Upload keys are owner-namespaced paths; directories appear on demand.
    let key = "uploads/user-1/file-1";
    let data = Bytes::from("nested payload");
    store.put(key, data.clone()).await.unwrap();

    let retrieved = store.get(key).await.unwrap();
    assert_eq!(retrieved.len(), data.len());
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    assert!(!store.exists("missing").await.unwrap());

    store.put("present", Bytes::from("data")).await.unwrap();
    assert!(store.exists("present").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("to-delete", Bytes::from("data")).await.unwrap();
    assert!(store.exists("to-delete").await.unwrap());

    store.delete("to-delete").await.unwrap();
    assert!(!store.exists("to-delete").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    // Deleting a nonexistent key should not error
    store.delete("nonexistent").await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("missing").await;
    assert!(result.is_err());
    assert!(matches!(
        result.unwrap_err(),
        memovault::object_store::ObjectStoreError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("key", Bytes::from("first")).await.unwrap();
    store.put("key", Bytes::from("second")).await.unwrap();

    let data = store.get("key").await.unwrap();
    assert_eq!(data, Bytes::from("second"));
}

#[tokio::test]
async fn test_local_store_has_no_retrieve_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    // Local mode streams downloads through the service instead.
    assert_eq!(store.retrieve_url("uploads/u/f"), None);
}

#[test]
fn test_content_hash() {
    // SHA-256 of an empty input is a fixed vector.
    assert_eq!(
        content_hash(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );

    let a = content_hash(b"research notes");
    let b = content_hash(b"research notes");
    let c = content_hash(b"other notes");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}
