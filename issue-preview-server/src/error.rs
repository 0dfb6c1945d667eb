use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watcher, reload server, and orchestrator.
///
/// Template problems are not errors at this level: they become error
/// documents and the pipeline keeps running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not bind preview server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("renderer error: {0}")]
    Render(#[from] issue_preview_renderer::RenderError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{0}")]
    Join(String),
}

impl ServerError {
    /// True when the listener could not be bound (port in use, permission).
    pub fn is_bind_failure(&self) -> bool {
        matches!(self, ServerError::Bind { .. })
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServerError {
    ServerError::Io {
        path: path.into(),
        source,
    }
}
