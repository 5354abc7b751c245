use std::sync::Arc;

use super::*;
use crate::core::identity::Identity;
use crate::core::message::Message;
use crate::core::session::Session;

async fn test_db() -> (SqliteStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&tmp.path().join("data").join("parley.db"))
        .await
        .unwrap();
    (store, tmp)
}

#[tokio::test]
async fn test_sqlite_kv_crud() {
    let (db, _tmp) = test_db().await;

    assert_eq!(db.get("missing").await.unwrap(), None);

    db.set("a", "1").await.unwrap();
    assert_eq!(db.get("a").await.unwrap().as_deref(), Some("1"));

    // Overwrite
    db.set("a", "2").await.unwrap();
    assert_eq!(db.get("a").await.unwrap().as_deref(), Some("2"));

    db.remove("a").await.unwrap();
    assert_eq!(db.get("a").await.unwrap(), None);

    // Removing a missing key is fine
    db.remove("a").await.unwrap();
}

#[tokio::test]
async fn test_sqlite_reopen_keeps_data() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("parley.db");
    {
        let db = SqliteStore::open(&path).await.unwrap();
        db.set("k", "v").await.unwrap();
    }
    let db = SqliteStore::open(&path).await.unwrap();
    assert_eq!(db.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn test_memory_kv_crud() {
    let store = MemoryStore::new();
    store.set("x", "y").await.unwrap();
    assert_eq!(store.get("x").await.unwrap().as_deref(), Some("y"));
    store.remove("x").await.unwrap();
    assert_eq!(store.get("x").await.unwrap(), None);
}

#[tokio::test]
async fn test_session_list_round_trip() {
    let (db, _tmp) = test_db().await;
    let repo = SessionRepo::new(Arc::new(db), "user_1");

    assert!(repo.load().await.unwrap().is_none());

    let mut first = Session::new();
    first.push(Message::new_user("hello".into()));
    first.push(Message::new_error("failed".into()));
    first.derive_title();
    let second = Session::new();
    let sessions = vec![second, first];

    repo.save(&sessions).await.unwrap();
    let loaded = repo.load().await.unwrap().unwrap();
    assert_eq!(loaded, sessions);
    assert!(loaded[1].messages[1].is_error);
}

#[tokio::test]
async fn test_sessions_namespaced_by_user() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let alice = SessionRepo::new(store.clone(), "user_a");
    let bob = SessionRepo::new(store.clone(), "user_b");

    alice.save(&[Session::new()]).await.unwrap();
    alice.save_current(Some("session_x")).await.unwrap();

    assert!(bob.load().await.unwrap().is_none());
    assert!(bob.load_current().await.unwrap().is_none());
    assert_eq!(alice.load().await.unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn test_corrupt_session_blob_reads_as_absent() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    store
        .set(&keys::sessions("user_1"), "{not json")
        .await
        .unwrap();
    let repo = SessionRepo::new(store, "user_1");
    assert!(repo.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_current_selection_cleared() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let repo = SessionRepo::new(store, "user_1");
    repo.save_current(Some("session_1")).await.unwrap();
    assert_eq!(repo.load_current().await.unwrap().as_deref(), Some("session_1"));
    repo.save_current(None).await.unwrap();
    assert!(repo.load_current().await.unwrap().is_none());
}

#[tokio::test]
async fn test_identity_repo() {
    let (db, _tmp) = test_db().await;
    let store: Arc<dyn KvStore> = Arc::new(db);
    let repo = IdentityRepo::new(store.clone());

    assert!(repo.load().await.unwrap().is_none());

    let identity = Identity::new("ana@example.com".into(), Some("ana".into()));
    repo.save(&identity).await.unwrap();
    assert_eq!(repo.load().await.unwrap(), Some(identity));

    repo.clear().await.unwrap();
    assert!(repo.load().await.unwrap().is_none());

    store.set(keys::USER, "garbage").await.unwrap();
    assert!(repo.load().await.unwrap().is_none());
}
