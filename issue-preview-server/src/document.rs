//! The current rendered document and the last good preview.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use issue_preview_core::Fingerprint;

use crate::session::{SessionRegistry, SessionStream};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentKind {
    Preview,
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub version: u64,
    /// Fingerprint of the source the document was built from; `None` when
    /// the source could not be read.
    pub fingerprint: Option<Fingerprint>,
    pub kind: DocumentKind,
    pub rendered_at: DateTime<Utc>,
}

impl RenderedDocument {
    pub fn is_preview(&self) -> bool {
        matches!(self.kind, DocumentKind::Preview)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            DocumentKind::Preview => None,
            DocumentKind::Error { message } => Some(message),
        }
    }
}

const PENDING_HTML: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Issue preview</title></head>\n<body>\n<p>Waiting for the first render…</p>\n</body>\n</html>\n";

#[derive(Debug)]
struct StoreState {
    current: Arc<RenderedDocument>,
    last_good: Option<Arc<RenderedDocument>>,
}

/// Shared holder of the current [`RenderedDocument`].
///
/// Single writer (the orchestrator), many readers (HTTP handlers). Versions
/// only increase; a publish either fully replaces the document or does not
/// happen.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    inner: Arc<RwLock<StoreState>>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// A store holding a version-0 placeholder.
    pub fn new() -> Self {
        let placeholder = RenderedDocument {
            html: PENDING_HTML.to_string(),
            version: 0,
            fingerprint: None,
            kind: DocumentKind::Error {
                message: "not rendered yet".to_string(),
            },
            rendered_at: Utc::now(),
        };
        DocumentStore {
            inner: Arc::new(RwLock::new(StoreState {
                current: Arc::new(placeholder),
                last_good: None,
            })),
        }
    }

    pub async fn current(&self) -> Arc<RenderedDocument> {
        Arc::clone(&self.inner.read().await.current)
    }

    pub async fn version(&self) -> u64 {
        self.inner.read().await.current.version
    }

    /// Open a reload session that has seen the current version.
    ///
    /// The read guard is held across registration so no publish can land
    /// between the two; any later publish is followed by a broadcast that
    /// reaches the new session.
    pub async fn register_session(&self, sessions: &SessionRegistry) -> SessionStream {
        let state = self.inner.read().await;
        sessions.register(state.current.version)
    }

    /// The most recent successful preview, kept across error documents.
    pub async fn last_good(&self) -> Option<Arc<RenderedDocument>> {
        self.inner.read().await.last_good.clone()
    }

    pub async fn publish_preview(
        &self,
        html: String,
        fingerprint: Fingerprint,
    ) -> Arc<RenderedDocument> {
        let mut state = self.inner.write().await;
        let document = Arc::new(RenderedDocument {
            html,
            version: state.current.version + 1,
            fingerprint: Some(fingerprint),
            kind: DocumentKind::Preview,
            rendered_at: Utc::now(),
        });
        state.current = Arc::clone(&document);
        state.last_good = Some(Arc::clone(&document));
        document
    }

    /// Replace the current document with an error page; `last_good` is kept.
    pub async fn publish_error(
        &self,
        html: String,
        fingerprint: Option<Fingerprint>,
        message: String,
    ) -> Arc<RenderedDocument> {
        let mut state = self.inner.write().await;
        let document = Arc::new(RenderedDocument {
            html,
            version: state.current.version + 1,
            fingerprint,
            kind: DocumentKind::Error { message },
            rendered_at: Utc::now(),
        });
        state.current = Arc::clone(&document);
        document
    }
}
