use super::test_helpers::{
    simple_harness, test_archiver_with, StubArchiver, TimeoutArchiver,
};
use crate::archivers::Archiver;
use crate::storage::test_support::MemoryProvider;
use crate::types::{ArchiveStatus, ArchiveRetrieveRequest, BatchSaveItem, SaveRequest, SummarizeRequest};
use crate::Error;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// Poll the task status until it leaves pending (or the deadline passes)
pub(crate) async fn wait_for_task(
    archiver: &super::PageArchiver,
    task_id: &str,
) -> crate::types::TaskStatusResponse {
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(status) = archiver.task_status(task_id).await {
            if status.status != ArchiveStatus::Pending {
                return status;
            }
        }
        assert!(
            std::time::Instant::now() < deadline,
            "task {task_id} did not resolve within the deadline"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Mock server that answers 200 on `/ok` and 404 on `/gone`
pub(crate) async fn probe_server() -> MockServer {
    let server = MockServer::start().await;
    for m in ["HEAD", "GET"] {
        Mock::given(method(m))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method(m))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }
    server
}

// ---------------------------------------------------------------------------
// Scenario: single-URL synchronous archive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_url_archive_records_success() {
    let (harness, stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    let response = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.exit_code, Some(0));
    assert_eq!(response.id, "a");
    let saved_path = response.saved_path.expect("success must carry a path");
    assert!(
        saved_path.ends_with("a/monolith/output.html"),
        "artifact lands at the well-known path, got {saved_path}"
    );
    assert!(std::path::Path::new(&saved_path).exists());

    let artifact = harness
        .archiver
        .db
        .get_artifact("a", "monolith")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(artifact.archive_status(), ArchiveStatus::Success);
    assert_eq!(stubs[0].invocation_count(), 1);

    // The artifact also fanned out to the configured provider
    assert_eq!(harness.providers[0].object_count(), 1);
    assert!(artifact.all_uploads_succeeded);
}

#[tokio::test]
async fn sync_archive_rejects_blank_ids() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;

    let result = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "   ".into(),
                url: "https://example.org/x".into(),
                name: None,
            },
        )
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let result = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "...".into(),
                url: "https://example.org/x".into(),
                name: None,
            },
        )
        .await;
    assert!(
        matches!(result, Err(Error::Validation(_))),
        "ids that sanitize to nothing are rejected"
    );
}

#[tokio::test]
async fn sync_archive_unknown_archiver_is_an_error() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;

    let result = harness
        .archiver
        .archive_now(
            "webp",
            SaveRequest {
                id: "a".into(),
                url: "https://example.org/x".into(),
                name: None,
            },
        )
        .await;
    assert!(matches!(result, Err(Error::UnknownArchiver(_))));
}

#[tokio::test]
async fn sync_archive_records_404_preflight() {
    let (harness, stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    let response = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "gone".into(),
                url: format!("{}/gone", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.exit_code, Some(404));
    assert_eq!(
        stubs[0].invocation_count(),
        0,
        "a 404 pre-flight short-circuits the archiver"
    );

    let artifact = harness
        .archiver
        .db
        .get_artifact("gone", "monolith")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(artifact.archive_status(), ArchiveStatus::Failed);
    assert_eq!(artifact.exit_code, Some(404));
}

#[tokio::test]
async fn recorded_404_is_terminal_by_default() {
    let (harness, stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = MockServer::start().await;
    for m in ["HEAD", "GET"] {
        Mock::given(method(m))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }
    let request = SaveRequest {
        id: "a".into(),
        url: format!("{}/flaky", server.uri()),
        name: None,
    };

    let first = harness
        .archiver
        .archive_now("monolith", request.clone())
        .await
        .unwrap();
    assert_eq!(first.exit_code, Some(404));

    // The URL comes back to life, but the recorded 404 is trusted
    server.reset().await;
    for m in ["HEAD", "GET"] {
        Mock::given(method(m))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }

    let second = harness
        .archiver
        .archive_now("monolith", request)
        .await
        .unwrap();
    assert!(!second.ok);
    assert_eq!(second.exit_code, Some(404));
    assert_eq!(
        stubs[0].invocation_count(),
        0,
        "with retry_unreachable off, the recorded failure is reused without a fresh probe"
    );
}

#[tokio::test]
async fn retry_unreachable_probes_afresh_on_resubmission() {
    let stub = Arc::new(StubArchiver::ok("monolith", "html"));
    let harness = test_archiver_with(
        vec![stub.clone() as Arc<dyn Archiver>],
        vec![Arc::new(MemoryProvider::new("local"))],
        |config| config.dedup.retry_unreachable = true,
    )
    .await;
    stub.set_data_dir(harness.data_dir.path().to_path_buf());

    let server = MockServer::start().await;
    for m in ["HEAD", "GET"] {
        Mock::given(method(m))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }
    let request = SaveRequest {
        id: "a".into(),
        url: format!("{}/flaky", server.uri()),
        name: None,
    };

    let first = harness
        .archiver
        .archive_now("monolith", request.clone())
        .await
        .unwrap();
    assert_eq!(first.exit_code, Some(404));

    server.reset().await;
    for m in ["HEAD", "GET"] {
        Mock::given(method(m))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }

    let second = harness
        .archiver
        .archive_now("monolith", request)
        .await
        .unwrap();
    assert!(second.ok, "the knob re-probes and archives a revived URL");
    assert_eq!(stub.invocation_count(), 1);
}

// ---------------------------------------------------------------------------
// Scenario: dedup skip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dedup_skip_reuses_the_artifact_without_rearchiving() {
    let (harness, stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;
    let request = SaveRequest {
        id: "a".into(),
        url: format!("{}/ok", server.uri()),
        name: None,
    };

    let first = harness
        .archiver
        .archive_now("monolith", request.clone())
        .await
        .unwrap();
    assert!(first.ok);
    let executions_after_first = harness.archiver.db.count_executions().await.unwrap();

    let second = harness
        .archiver
        .archive_now("monolith", request)
        .await
        .unwrap();

    assert!(second.ok);
    assert_eq!(
        second.saved_path, first.saved_path,
        "resubmission returns the same artifact path"
    );
    assert_eq!(
        stubs[0].invocation_count(),
        1,
        "the archiver must not run a second time"
    );
    assert_eq!(
        harness.archiver.db.count_executions().await.unwrap(),
        executions_after_first,
        "no new subprocess executions on a dedup hit"
    );
}

#[tokio::test]
async fn dedup_disabled_rearchives() {
    let stub = Arc::new(StubArchiver::ok("monolith", "html"));
    let harness = test_archiver_with(
        vec![stub.clone() as Arc<dyn Archiver>],
        vec![Arc::new(MemoryProvider::new("local"))],
        |config| config.dedup.skip_existing_saves = false,
    )
    .await;
    stub.set_data_dir(harness.data_dir.path().to_path_buf());
    let server = probe_server().await;

    let request = SaveRequest {
        id: "a".into(),
        url: format!("{}/ok", server.uri()),
        name: None,
    };
    harness
        .archiver
        .archive_now("monolith", request.clone())
        .await
        .unwrap();
    harness
        .archiver
        .archive_now("monolith", request)
        .await
        .unwrap();

    assert_eq!(stub.invocation_count(), 2, "dedup off means every run archives");
}

// ---------------------------------------------------------------------------
// Scenario: timeout with cleanup hook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timed_out_archiver_cleans_up_and_fails_the_artifact() {
    // Build the harness first so the TimeoutArchiver can share its runner
    let harness = test_archiver_with(
        Vec::new(),
        vec![Arc::new(MemoryProvider::new("local"))],
        |_| {},
    )
    .await;
    let timeout_archiver: Arc<dyn Archiver> =
        Arc::new(TimeoutArchiver::new(harness.archiver.command_runner.clone()));
    let mut archiver = harness.archiver.clone();
    archiver.registry = Arc::new(crate::archivers::ArchiverRegistry::from_archivers(vec![
        timeout_archiver,
    ]));

    let server = probe_server().await;
    let response = archiver
        .archive_now(
            "screenshot",
            SaveRequest {
                id: "slow".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    assert!(!response.ok);
    assert!(response.exit_code.is_none(), "timeout leaves no exit code");

    let artifact = archiver
        .db
        .get_artifact("slow", "screenshot")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(artifact.archive_status(), ArchiveStatus::Failed);

    // Two executions: the timed-out sleep and the recorded cleanup hook
    assert_eq!(archiver.db.count_executions().await.unwrap(), 2);
    let cleanup_exec = archiver.db.get_execution(2).await.unwrap().unwrap();
    assert!(
        cleanup_exec.command.contains("__CLEANUP__"),
        "the post-timeout cleanup must be observable in the execution log"
    );
    let timed_out_exec = archiver.db.get_execution(1).await.unwrap().unwrap();
    assert!(timed_out_exec.timed_out);
    assert!(timed_out_exec.exit_code.is_none());
}

// ---------------------------------------------------------------------------
// Worker exception boundary and summarization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_archiver_error_finalizes_with_exit_1() {
    let stub = Arc::new(StubArchiver::erroring("monolith", "html"));
    let harness = test_archiver_with(
        vec![stub.clone() as Arc<dyn Archiver>],
        vec![Arc::new(MemoryProvider::new("local"))],
        |_| {},
    )
    .await;
    let server = probe_server().await;

    let response = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.exit_code, Some(1), "internal failures record exit 1");

    let artifact = harness
        .archiver
        .db
        .get_artifact("a", "monolith")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(artifact.archive_status(), ArchiveStatus::Failed);
    assert_eq!(artifact.exit_code, Some(1));
}

#[tokio::test]
async fn readability_success_notifies_summarization() {
    let (harness, _stubs) = simple_harness(&[("readability", "html")]).await;
    let server = probe_server().await;

    harness
        .archiver
        .archive_now(
            "readability",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    let calls = harness.notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 1, "readability success triggers one notification");
    assert_eq!(calls[0].2, "api-readability");
}

#[tokio::test]
async fn non_readability_success_does_not_notify() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    assert!(harness.notifier.calls.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Admin surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_listing_probes_files_and_infers_archivers() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: Some("Example".into()),
            },
        )
        .await
        .unwrap();

    let rows = harness.archiver.list_saves_admin(10, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.id, "a");
    assert!(row.file_exists);
    assert_eq!(row.archiver.as_deref(), Some("monolith"));
    assert_eq!(
        row.relative_path.as_deref(),
        Some("a/monolith/output.html"),
        "paths under the data dir are reported relative to it"
    );
    assert_eq!(row.name.as_deref(), Some("Example"));
}

#[tokio::test]
async fn admin_delete_removes_rows_and_files() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    let response = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();
    let saved_path = std::path::PathBuf::from(response.saved_path.unwrap());
    assert!(saved_path.exists());

    let deleted = harness
        .archiver
        .delete_saves_by_item("a", true)
        .await
        .unwrap();
    assert_eq!(deleted.deleted_count, 1);
    assert_eq!(deleted.removed_files.len(), 1);
    assert!(deleted.errors.is_empty());

    assert!(!saved_path.exists(), "the artifact file is removed");
    assert!(
        !saved_path.parent().unwrap().exists(),
        "empty parent directories are pruned"
    );
    assert!(harness.data_dir.path().exists(), "the data dir itself survives");

    assert!(
        harness
            .archiver
            .db
            .get_saves_by_item_id("a")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn admin_delete_without_files_keeps_them() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    let response = harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();
    let saved_path = std::path::PathBuf::from(response.saved_path.unwrap());

    let deleted = harness
        .archiver
        .delete_save(
            harness
                .archiver
                .db
                .get_saves_by_url(&format!("{}/ok", server.uri()))
                .await
                .unwrap()[0]
                .id,
            false,
        )
        .await
        .unwrap();
    assert_eq!(deleted.deleted_count, 1);
    assert!(deleted.removed_files.is_empty());
    assert!(saved_path.exists(), "files survive a catalog-only delete");
}

#[tokio::test]
async fn admin_delete_missing_rows_is_not_found() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;

    assert!(matches!(
        harness.archiver.delete_save(999, false).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        harness.archiver.delete_saves_by_item("ghost", false).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        harness
            .archiver
            .delete_saves_by_url("https://example.org/none", false)
            .await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn admin_summarize_resolves_rowid_item_and_url() {
    let (harness, _stubs) = simple_harness(&[("readability", "html")]).await;
    let server = probe_server().await;

    harness
        .archiver
        .archive_now(
            "readability",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();
    harness.notifier.calls.lock().unwrap().clear();

    let by_item = harness
        .archiver
        .summarize(SummarizeRequest {
            item_id: Some("a".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(by_item.ok);
    assert!(by_item.summary_created);

    let by_url = harness
        .archiver
        .summarize(SummarizeRequest {
            url: Some(format!("{}/ok", server.uri())),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(by_url.ok);

    let calls = harness.notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.2 == "admin-api"));

    drop(calls);
    let missing = harness
        .archiver
        .summarize(SummarizeRequest {
            item_id: Some("ghost".into()),
            ..Default::default()
        })
        .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Requeue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requeue_rearchives_a_terminal_artifact() {
    let (harness, stubs) = simple_harness(&[("monolith", "html")]).await;
    let server = probe_server().await;

    harness
        .archiver
        .archive_now(
            "monolith",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();
    let rowid = harness
        .archiver
        .db
        .get_artifact("a", "monolith")
        .await
        .unwrap()
        .unwrap()
        .id;

    // Requeue resets the row and schedules a fresh run
    let accepted = harness.archiver.requeue_save(rowid).await.unwrap();
    let status = wait_for_task(&harness.archiver, &accepted.task_id).await;

    assert_eq!(status.status, ArchiveStatus::Success);
    assert_eq!(
        stubs[0].invocation_count(),
        2,
        "requeue re-runs the archiver even though dedup is enabled"
    );
}

// ---------------------------------------------------------------------------
// Size stats and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn size_stats_aggregate_successful_artifacts() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html"), ("pdf", "pdf")]).await;
    let server = probe_server().await;

    harness
        .archiver
        .archive_now(
            "all",
            SaveRequest {
                id: "a".into(),
                url: format!("{}/ok", server.uri()),
                name: None,
            },
        )
        .await
        .unwrap();

    let url = harness
        .archiver
        .db
        .get_archived_url_by_item_id("a")
        .await
        .unwrap()
        .unwrap();
    let stats = harness.archiver.size_stats(url.id).await.unwrap();

    assert_eq!(stats.artifacts.len(), 2);
    let sum: i64 = stats.artifacts.iter().filter_map(|a| a.size_bytes).sum();
    assert_eq!(
        stats.total_size_bytes, sum,
        "total must equal the artifact sum"
    );
    assert!(stats.total_size_bytes > 0);

    assert!(matches!(
        harness.archiver.size_stats(999_999).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn shutdown_rejects_new_submissions() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;

    harness.archiver.shutdown().await.unwrap();

    let result = harness
        .archiver
        .enqueue(
            "monolith",
            vec![BatchSaveItem {
                id: "a".into(),
                url: "https://example.org/x".into(),
                name: None,
            }],
        )
        .await;
    assert!(matches!(result, Err(Error::ShuttingDown)));
}

// ---------------------------------------------------------------------------
// Retrieve validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieve_requires_id_or_url() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;

    let result = harness
        .archiver
        .retrieve(ArchiveRetrieveRequest::default())
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

/// Read every entry name out of a gzip tarball
pub(crate) fn tar_entry_names(bytes: &[u8]) -> Vec<String> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    let mut names = Vec::new();
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        names.push(entry.path().unwrap().display().to_string());
    }
    names.sort();
    names
}

/// Read one entry's content out of a gzip tarball
pub(crate) fn tar_entry_content(bytes: &[u8], name: &str) -> Option<String> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.path().unwrap().display().to_string() == name {
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            return Some(content);
        }
    }
    None
}
