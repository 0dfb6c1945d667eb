//! Live preview runtime: change watcher + orchestrator + reload server.

pub mod config;
pub mod document;
mod error;
mod runtime;
pub mod server;
pub mod session;
pub mod source;
pub mod watcher;

pub use config::{PreviewConfig, ReadPolicy, WatchConfig};
pub use document::{DocumentKind, DocumentStore, RenderedDocument};
pub use error::ServerError;
pub use runtime::{run, run_with_shutdown, start_blocking, Orchestrator, PipelineState};
pub use server::{router, AppState};
pub use session::{SessionRegistry, SessionStream};
pub use watcher::{FileWatcher, Observation, WatchEvent};
