//! Database tests

use super::*;
use crate::error::AppError;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_identity_create_and_find() {
    let (db, _temp_dir) = create_test_db().await;

    let identity = Identity::create("user@example.com", "secret1").unwrap();
    db.create_identity(&identity).await.unwrap();

    let by_id = db.find_identity(&identity.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "user@example.com");
    assert_eq!(by_id.password_hash, identity.password_hash);
    assert_eq!(by_id.password_salt, identity.password_salt);
    assert_eq!(by_id.session_salt, identity.session_salt);

    let by_email = db
        .find_identity_by_email("user@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, identity.id);

    assert!(db.find_identity("01ARZ3NDEKTSV4RRFFQ69G5FAV").await.unwrap().is_none());
    assert!(
        db.find_identity_by_email("other@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_duplicate_email_maps_to_registered() {
    let (db, _temp_dir) = create_test_db().await;

    let first = Identity::create("dup@example.com", "secret1").unwrap();
    db.create_identity(&first).await.unwrap();

    let second = Identity::create("dup@example.com", "secret2").unwrap();
    let error = db.create_identity(&second).await.unwrap_err();
    assert!(matches!(error, AppError::EmailRegistered));
}

#[tokio::test]
async fn test_update_identity_persists_new_salts() {
    let (db, _temp_dir) = create_test_db().await;

    let mut identity = Identity::create("user@example.com", "secret1").unwrap();
    db.create_identity(&identity).await.unwrap();

    identity.refresh_session_salt().unwrap();
    identity.set_password("secret2").unwrap();
    db.update_identity(&identity).await.unwrap();

    let stored = db.find_identity(&identity.id).await.unwrap().unwrap();
    assert_eq!(stored.session_salt, identity.session_salt);
    assert_eq!(stored.password_hash, identity.password_hash);
    assert!(stored.compare_password("secret2"));
    assert!(!stored.compare_password("secret1"));
}

#[tokio::test]
async fn test_update_unknown_identity_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    let identity = Identity::create("ghost@example.com", "secret1").unwrap();
    let error = db.update_identity(&identity).await.unwrap_err();
    assert!(matches!(error, AppError::IdentityNotFound));
}

#[tokio::test]
async fn test_vendor_link_upsert_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;

    let identity = Identity::create("user@example.com", "secret1").unwrap();
    db.create_identity(&identity).await.unwrap();

    db.bind_vendor(&identity.id, "facebook", "fb-100").await.unwrap();
    let link = db
        .find_vendor_link(&identity.id, "facebook")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.vendor_user_id, "fb-100");

    // Rebinding with a different vendor user id updates in place.
    db.bind_vendor(&identity.id, "facebook", "fb-200").await.unwrap();
    let link = db
        .find_vendor_link(&identity.id, "facebook")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.vendor_user_id, "fb-200");
    assert_eq!(db.count_vendor_links(&identity.id).await.unwrap(), 1);

    // A second vendor is a second row.
    db.bind_vendor(&identity.id, "github", "gh-1").await.unwrap();
    assert_eq!(db.count_vendor_links(&identity.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_find_identity_id_by_vendor() {
    let (db, _temp_dir) = create_test_db().await;

    let identity = Identity::create("user@example.com", "secret1").unwrap();
    db.create_identity(&identity).await.unwrap();
    db.bind_vendor(&identity.id, "facebook", "fb-100").await.unwrap();

    let found = db
        .find_identity_id_by_vendor("facebook", "fb-100")
        .await
        .unwrap();
    assert_eq!(found.as_deref(), Some(identity.id.as_str()));

    assert!(
        db.find_identity_id_by_vendor("facebook", "fb-999")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_transaction_rolls_back_create_and_bind_together() {
    let (db, _temp_dir) = create_test_db().await;

    let identity = Identity::create("txuser@example.com", "secret1").unwrap();

    let mut tx = db.begin().await.unwrap();
    Database::create_identity_in(&mut *tx, &identity).await.unwrap();
    Database::bind_vendor_in(&mut *tx, &identity.id, "facebook", "fb-1")
        .await
        .unwrap();
    drop(tx); // rollback

    assert!(db.find_identity(&identity.id).await.unwrap().is_none());
    assert!(
        db.find_identity_id_by_vendor("facebook", "fb-1")
            .await
            .unwrap()
            .is_none()
    );

    // And commit persists both.
    let mut tx = db.begin().await.unwrap();
    Database::create_identity_in(&mut *tx, &identity).await.unwrap();
    Database::bind_vendor_in(&mut *tx, &identity.id, "facebook", "fb-1")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(db.find_identity(&identity.id).await.unwrap().is_some());
    assert_eq!(
        db.find_identity_id_by_vendor("facebook", "fb-1")
            .await
            .unwrap()
            .as_deref(),
        Some(identity.id.as_str())
    );
}
