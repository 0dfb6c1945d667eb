//! HTTP routes exercised in-process through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use issue_preview_core::Fingerprint;
use issue_preview_server::{router, AppState, DocumentStore, SessionRegistry};

const PAGE: &str = "<!DOCTYPE html>\n<html><body><p>preview</p></body></html>\n";

fn state() -> AppState {
    AppState {
        documents: DocumentStore::new(),
        sessions: SessionRegistry::new(),
    }
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, headers, String::from_utf8(bytes.to_vec()).expect("utf-8 body"))
}

#[tokio::test]
async fn index_serves_current_document_with_reload_client() {
    let state = state();
    state
        .documents
        .publish_preview(PAGE.to_string(), Fingerprint::of(b"form"))
        .await;

    let (status, headers, body) = get(&state, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-preview-version"], "1");
    assert!(headers["content-type"]
        .to_str()
        .expect("content type")
        .starts_with("text/html"));
    assert!(body.contains("<p>preview</p>"));
    assert!(body.contains("new EventSource(\"/events\")"));
    assert!(body.find("<script>").expect("script") < body.find("</body>").expect("body end"));
}

#[tokio::test]
async fn version_tracks_publishes() {
    let state = state();
    let (_, _, body) = get(&state, "/version").await;
    assert_eq!(body, "0");

    state
        .documents
        .publish_preview(PAGE.to_string(), Fingerprint::of(b"one"))
        .await;
    state
        .documents
        .publish_error("<p>bad</p>".to_string(), None, "boom".to_string())
        .await;
    let (_, _, body) = get(&state, "/version").await;
    assert_eq!(body, "2");
}

#[tokio::test]
async fn last_good_is_404_until_a_preview_exists() {
    let state = state();
    let (status, _, _) = get(&state, "/last-good").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    state
        .documents
        .publish_preview(PAGE.to_string(), Fingerprint::of(b"one"))
        .await;
    state
        .documents
        .publish_error("<p>bad</p>".to_string(), None, "boom".to_string())
        .await;

    let (status, headers, body) = get(&state, "/last-good").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-preview-version"], "1");
    assert_eq!(body, PAGE, "last good preview is served untouched");
}

#[tokio::test]
async fn status_reports_kind_and_versions() {
    let state = state();
    state
        .documents
        .publish_preview(PAGE.to_string(), Fingerprint::of(b"one"))
        .await;
    state
        .documents
        .publish_error("<p>bad</p>".to_string(), None, "boom".to_string())
        .await;

    let (status, _, body) = get(&state, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["version"], 2);
    assert_eq!(json["kind"], "error");
    assert_eq!(json["message"], "boom");
    assert_eq!(json["last_good_version"], 1);
    assert_eq!(json["sessions"], 0);
}

#[tokio::test]
async fn healthz_answers_ok() {
    let (status, _, body) = get(&state(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn events_endpoint_opens_a_session() {
    let state = state();
    let response = router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/events")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(state.sessions.len(), 1);

    drop(response);
    assert!(state.sessions.is_empty(), "closing the stream removes the session");
}
