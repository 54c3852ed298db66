use super::*;
use crate::orchestrator::test_helpers::simple_harness;
use crate::types::ArchiveStatus;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt; // for oneshot

/// Build a router over a stub-backed archiver; keeps the harness alive
async fn test_app(
    names: &[(&'static str, &'static str)],
) -> (
    Router,
    crate::orchestrator::test_helpers::TestHarness,
    Vec<std::sync::Arc<crate::orchestrator::test_helpers::StubArchiver>>,
) {
    let (harness, stubs) = simple_harness(names).await;
    let archiver = Arc::new(harness.archiver.clone());
    let config = archiver.get_config();
    let app = create_router(archiver, config);
    (app, harness, stubs)
}

/// Mock server answering 200 on /ok and 404 on /gone
async fn probe_server() -> wiremock::MockServer {
    crate::orchestrator::tests::probe_server().await
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoints_respond_ok() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;

    for uri in ["/health", "/healthz"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri} must be 200");
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn cors_headers_are_present_when_enabled() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn archive_endpoint_runs_the_archiver() {
    let (app, _harness, stubs) = test_app(&[("monolith", "html")]).await;
    let server = probe_server().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/archive/monolith",
            json!({"id": "a", "url": format!("{}/ok", server.uri())}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["exit_code"], 0);
    assert_eq!(body["id"], "a");
    assert!(
        body["saved_path"]
            .as_str()
            .unwrap()
            .ends_with("a/monolith/output.html"),
        "saved_path must follow the layout convention: {body}"
    );
    assert!(body["db_rowid"].as_i64().unwrap() > 0);
    assert_eq!(stubs[0].invocation_count(), 1);
}

#[tokio::test]
async fn archive_endpoint_unknown_archiver_is_404() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/archive/webp",
            json!({"id": "a", "url": "https://example.org/x"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "unknown_archiver");
}

#[tokio::test]
async fn archive_endpoint_blank_id_is_400() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/archive/monolith",
            json!({"id": "  ", "url": "https://example.org/x"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn save_batch_enqueues_and_task_status_resolves() {
    let (app, harness, _stubs) = test_app(&[("monolith", "html")]).await;
    let server = probe_server().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/save/batch",
            json!({"items": [
                {"id": "a", "url": format!("{}/ok", server.uri())},
                {"id": "b", "url": format!("{}/gone", server.uri())},
            ]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let status =
        crate::orchestrator::tests::wait_for_task(&harness.archiver, &task_id).await;
    assert_eq!(status.status, ArchiveStatus::Failed);

    // And the HTTP view agrees
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/tasks/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let gone = items.iter().find(|i| i["id"] == "b").unwrap();
    assert_eq!(gone["status"], "failed");
    assert_eq!(gone["exit_code"], 404);
    let ok = items.iter().find(|i| i["id"] == "a").unwrap();
    assert_eq!(ok["status"], "success");
}

#[tokio::test]
async fn unknown_task_is_404() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/tasks/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retrieve_bundle_streams_a_tarball() {
    let (app, _harness, _stubs) =
        test_app(&[("monolith", "html"), ("readability", "html")]).await;
    let server = probe_server().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/archive/all",
            json!({"id": "a", "url": format!("{}/ok", server.uri())}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "POST",
            "/archive/retrieve",
            json!({"id": "a", "archiver": "all"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/gzip"
    );
    assert!(
        response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("a-artifacts.tar.gz")
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let names = crate::orchestrator::tests::tar_entry_names(&bytes);
    assert_eq!(
        names,
        vec![
            "monolith/output.html".to_string(),
            "readability/output.html".to_string(),
        ]
    );
}

#[tokio::test]
async fn retrieve_single_artifact_streams_the_file() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;
    let server = probe_server().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/archive/monolith",
            json!({"id": "a", "url": format!("{}/ok", server.uri())}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/archive/retrieve",
            json!({"id": "a", "archiver": "monolith"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/html");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<html>ok</html>");
}

#[tokio::test]
async fn size_endpoint_reports_totals() {
    let (app, harness, _stubs) = test_app(&[("monolith", "html")]).await;
    let server = probe_server().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/archive/monolith",
            json!({"id": "a", "url": format!("{}/ok", server.uri())}),
        ))
        .await
        .unwrap();

    let url_id = harness
        .archiver
        .db
        .get_archived_url_by_item_id("a")
        .await
        .unwrap()
        .unwrap()
        .id;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/archive/{url_id}/size"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["total_size_bytes"].as_i64().unwrap() > 0);
    assert_eq!(body["artifacts"].as_array().unwrap().len(), 1);
    assert_eq!(body["artifacts"][0]["archiver"], "monolith");
}

#[tokio::test]
async fn admin_listing_and_delete_flow() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;
    let server = probe_server().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/archive/monolith",
            json!({"id": "a", "url": format!("{}/ok", server.uri())}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/saves?limit=10&offset=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rows = body_json(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["file_exists"], true);
    assert_eq!(rows[0]["archiver"], "monolith");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/admin/saves/by-item/a?remove_files=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted_count"], 1);
    assert_eq!(body["removed_files"].as_array().unwrap().len(), 1);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/saves?limit=10&offset=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let rows = body_json(response).await;
    assert!(rows.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_archivers_lists_registered_names() {
    let (app, _harness, _stubs) =
        test_app(&[("monolith", "html"), ("pdf", "pdf")]).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/archivers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!(["monolith", "pdf"]));
}

#[tokio::test]
async fn api_key_guards_routes_but_leaves_probes_open() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;
    let archiver = Arc::new(harness.archiver.clone());
    let mut config = (*archiver.get_config()).clone();
    config.server.api.api_key = Some("secret".into());
    let app = create_router(archiver, Arc::new(config));

    // Liveness probes never require credentials
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Everything else does
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/saves")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/saves")
                .header("X-Api-Key", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let (app, _harness, _stubs) = test_app(&[("monolith", "html")]).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"].is_object());
}

#[tokio::test]
async fn api_server_binds_and_serves() {
    let (harness, _stubs) = simple_harness(&[("monolith", "html")]).await;
    let archiver = Arc::new(harness.archiver.clone());
    let mut config = (*archiver.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let handle = tokio::spawn({
        let archiver = archiver.clone();
        let config = config.clone();
        async move { start_api_server(archiver, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();
}
