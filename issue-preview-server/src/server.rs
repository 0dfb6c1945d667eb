//! HTTP surface of the reload server (axum).

use std::convert::Infallible;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use issue_preview_core::Fingerprint;

use crate::document::{DocumentKind, DocumentStore};
use crate::session::SessionRegistry;

pub const VERSION_HEADER: &str = "x-preview-version";

const RELOAD_CLIENT: &str = r#"<script>
(function () {
  var version = __PREVIEW_VERSION__;
  function check(latest) {
    if (Number(latest) > version) { window.location.reload(); }
  }
  var source = new EventSource("/events");
  source.addEventListener("reload", function (event) { check(event.data); });
  source.addEventListener("open", function () {
    fetch("/version", { cache: "no-store" })
      .then(function (res) { return res.text(); })
      .then(check)
      .catch(function () {});
  });
})();
</script>
"#;

#[derive(Debug, Clone)]
pub struct AppState {
    pub documents: DocumentStore,
    pub sessions: SessionRegistry,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/events", get(events))
        .route("/version", get(version))
        .route("/last-good", get(last_good))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Response {
    let document = state.documents.current().await;
    let body = inject_reload_client(&document.html, document.version);

    let mut response = Html(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(VERSION_HEADER, HeaderValue::from(document.version));
    response
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state
        .documents
        .register_session(&state.sessions)
        .await
        .map(|version| Ok(Event::default().event("reload").data(version.to_string())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn version(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        state.documents.version().await.to_string(),
    )
}

async fn last_good(State(state): State<AppState>) -> Response {
    match state.documents.last_good().await {
        Some(document) => {
            let mut response = Html(document.html.clone()).into_response();
            response
                .headers_mut()
                .insert(VERSION_HEADER, HeaderValue::from(document.version));
            response
        }
        None => (StatusCode::NOT_FOUND, "no successful render yet").into_response(),
    }
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    version: u64,
    #[serde(flatten)]
    kind: DocumentKind,
    fingerprint: Option<Fingerprint>,
    rendered_at: DateTime<Utc>,
    last_good_version: Option<u64>,
    sessions: usize,
}

async fn status(State(state): State<AppState>) -> Json<StatusPayload> {
    let document = state.documents.current().await;
    let last_good_version = state.documents.last_good().await.map(|d| d.version);
    Json(StatusPayload {
        version: document.version,
        kind: document.kind.clone(),
        fingerprint: document.fingerprint.clone(),
        rendered_at: document.rendered_at,
        last_good_version,
        sessions: state.sessions.len(),
    })
}

async fn healthz() -> &'static str {
    "ok"
}

/// Insert the reload client before the last `</body>`, or append it when the
/// document has none.
pub fn inject_reload_client(html: &str, version: u64) -> String {
    const PATTERN: &[u8] = b"</body>";

    let script = RELOAD_CLIENT.replace("__PREVIEW_VERSION__", &version.to_string());
    let mut out = String::with_capacity(html.len() + script.len());
    match html
        .as_bytes()
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(&script);
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(html);
            out.push_str(&script);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_goes_before_closing_body() {
        let html = inject_reload_client("<html><body><p>x</p></BODY></html>", 7);
        let script_at = html.find("<script>").unwrap();
        let body_end = html.find("</BODY>").unwrap();
        assert!(script_at < body_end);
        assert!(html.contains("var version = 7;"));
        assert!(html.starts_with("<html><body><p>x</p>"));
    }

    #[test]
    fn script_appended_without_body_tag() {
        let html = inject_reload_client("<p>fragment</p>", 1);
        assert!(html.starts_with("<p>fragment</p><script>"));
    }
}
