use super::test_db;
use crate::db::ArtifactResultParams;

#[tokio::test]
async fn finds_successful_artifact_for_exact_triple() {
    let (db, _f) = test_db().await;
    let url_id = db
        .upsert_archived_url("item-a", "https://example.org/x", None)
        .await
        .unwrap();
    db.insert_artifact_result(ArtifactResultParams {
        archived_url_id: url_id,
        archiver: "monolith",
        success: true,
        exit_code: Some(0),
        saved_path: Some("/data/item-a/monolith/output.html"),
        size_bytes: Some(9),
        task_id: None,
    })
    .await
    .unwrap();

    let found = db
        .find_successful_artifact("item-a", "https://example.org/x", "monolith")
        .await
        .unwrap();
    assert!(found.is_some());
    assert_eq!(
        found.unwrap().saved_path.as_deref(),
        Some("/data/item-a/monolith/output.html")
    );

    assert!(
        db.is_already_saved("item-a", "https://example.org/x", "monolith")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn mismatched_keys_do_not_match() {
    let (db, _f) = test_db().await;
    let url_id = db
        .upsert_archived_url("item-a", "https://example.org/x", None)
        .await
        .unwrap();
    db.insert_artifact_result(ArtifactResultParams {
        archived_url_id: url_id,
        archiver: "monolith",
        success: true,
        exit_code: Some(0),
        saved_path: Some("/p"),
        size_bytes: Some(9),
        task_id: None,
    })
    .await
    .unwrap();

    // Different archiver
    assert!(
        !db.is_already_saved("item-a", "https://example.org/x", "pdf")
            .await
            .unwrap()
    );
    // Different url
    assert!(
        !db.is_already_saved("item-a", "https://example.org/y", "monolith")
            .await
            .unwrap()
    );
    // Different item
    assert!(
        !db.is_already_saved("item-b", "https://example.org/x", "monolith")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn failed_rows_never_satisfy_dedup() {
    let (db, _f) = test_db().await;
    let url_id = db
        .upsert_archived_url("item-a", "https://example.org/gone", None)
        .await
        .unwrap();

    // A 404 pre-flight failure row
    db.insert_artifact_result(ArtifactResultParams {
        archived_url_id: url_id,
        archiver: "monolith",
        success: false,
        exit_code: Some(404),
        saved_path: None,
        size_bytes: None,
        task_id: None,
    })
    .await
    .unwrap();

    assert!(
        !db.is_already_saved("item-a", "https://example.org/gone", "monolith")
            .await
            .unwrap(),
        "a recorded 404 is a terminal failure, not a reusable artifact"
    );
}

#[tokio::test]
async fn unreachable_lookup_matches_recorded_404_rows_only() {
    let (db, _f) = test_db().await;
    let url_id = db
        .upsert_archived_url("item-a", "https://example.org/gone", None)
        .await
        .unwrap();

    // A 404 pre-flight row matches
    db.insert_artifact_result(ArtifactResultParams {
        archived_url_id: url_id,
        archiver: "monolith",
        success: false,
        exit_code: Some(404),
        saved_path: None,
        size_bytes: None,
        task_id: None,
    })
    .await
    .unwrap();
    assert!(
        db.find_unreachable_artifact("item-a", "https://example.org/gone", "monolith")
            .await
            .unwrap()
            .is_some()
    );

    // Other failure codes do not
    db.insert_artifact_result(ArtifactResultParams {
        archived_url_id: url_id,
        archiver: "pdf",
        success: false,
        exit_code: Some(1),
        saved_path: None,
        size_bytes: None,
        task_id: None,
    })
    .await
    .unwrap();
    assert!(
        db.find_unreachable_artifact("item-a", "https://example.org/gone", "pdf")
            .await
            .unwrap()
            .is_none()
    );

    // Neither does a different archiver or url
    assert!(
        db.find_unreachable_artifact("item-a", "https://example.org/gone", "screenshot")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        db.find_unreachable_artifact("item-a", "https://example.org/other", "monolith")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn requeue_clears_the_unreachable_record() {
    let (db, _f) = test_db().await;
    let url_id = db
        .upsert_archived_url("item-a", "https://example.org/gone", None)
        .await
        .unwrap();
    db.insert_artifact_result(ArtifactResultParams {
        archived_url_id: url_id,
        archiver: "monolith",
        success: false,
        exit_code: Some(404),
        saved_path: None,
        size_bytes: None,
        task_id: None,
    })
    .await
    .unwrap();

    // Requeue resets the row to pending, wiping the exit code
    db.insert_pending_artifact(url_id, "monolith", Some("task-retry"))
        .await
        .unwrap();

    assert!(
        db.find_unreachable_artifact("item-a", "https://example.org/gone", "monolith")
            .await
            .unwrap()
            .is_none(),
        "a requeued triple gets a fresh probe"
    );
}

#[tokio::test]
async fn pending_rows_never_satisfy_dedup() {
    let (db, _f) = test_db().await;
    let url_id = db
        .upsert_archived_url("item-a", "https://example.org/x", None)
        .await
        .unwrap();
    db.insert_pending_artifact(url_id, "monolith", Some("task-1"))
        .await
        .unwrap();

    assert!(
        !db.is_already_saved("item-a", "https://example.org/x", "monolith")
            .await
            .unwrap()
    );
}
