use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use issue_preview_core::{parse, Fingerprint, ParseError};
use issue_preview_renderer::{ErrorPage, RenderError, Renderer};

use crate::config::{PreviewConfig, ReadPolicy, EVENT_QUEUE_CAPACITY};
use crate::document::{DocumentStore, RenderedDocument};
use crate::error::{io_err, ServerError};
use crate::server::{router, AppState};
use crate::session::SessionRegistry;
use crate::source::{read_with_retry, ReadFailure};
use crate::watcher::{observe, FileWatcher, WatchEvent};

/// Where the orchestrator is in its render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Rendering,
    Broadcasting,
}

/// Why a render attempt produced an error document instead of a preview.
#[derive(Debug)]
enum Failure {
    Read(ReadFailure),
    Parse(ParseError),
    Render(RenderError),
}

impl Failure {
    fn heading(&self) -> &'static str {
        match self {
            Failure::Read(_) => "Source file unavailable",
            Failure::Parse(ParseError::Syntax { .. }) => "YAML syntax error",
            Failure::Parse(ParseError::Schema { .. }) => "Invalid issue form",
            Failure::Render(_) => "Rendering failed",
        }
    }

    fn location(&self) -> Option<String> {
        match self {
            Failure::Parse(err) => Some(err.location()),
            Failure::Read(_) | Failure::Render(_) => None,
        }
    }

    fn message(&self) -> String {
        match self {
            Failure::Read(err) => err.to_string(),
            Failure::Parse(err) => err.to_string(),
            Failure::Render(err) => err.to_string(),
        }
    }
}

/// Result of one render attempt, not yet published.
#[derive(Debug)]
enum Outcome {
    Unchanged,
    Preview {
        html: String,
        fingerprint: Fingerprint,
    },
    Failed {
        fingerprint: Option<Fingerprint>,
        failure: Failure,
    },
}

fn render_source(renderer: &Renderer, bytes: &[u8]) -> Result<String, Failure> {
    let template = parse(bytes).map_err(Failure::Parse)?;
    renderer.render(&template).map_err(Failure::Render)
}

/// Drives render → publish → broadcast for one source document.
///
/// The only writer of the [`DocumentStore`]. At most one render is in
/// flight; changes that arrive during a render supersede it.
pub struct Orchestrator {
    source: PathBuf,
    read_policy: ReadPolicy,
    renderer: Arc<Renderer>,
    documents: DocumentStore,
    sessions: SessionRegistry,
    state: PipelineState,
}

impl Orchestrator {
    pub fn new(
        source: impl Into<PathBuf>,
        read_policy: ReadPolicy,
        renderer: Arc<Renderer>,
        documents: DocumentStore,
        sessions: SessionRegistry,
    ) -> Self {
        Orchestrator {
            source: source.into(),
            read_policy,
            renderer,
            documents,
            sessions,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Render the source once, outside the event loop.
    pub async fn render_now(&mut self) -> Result<Option<u64>, ServerError> {
        self.transition(PipelineState::Rendering);
        let outcome = self.prepare().await?;
        self.commit(outcome).await
    }

    /// Handle one watch event, coalescing with anything queued behind it.
    ///
    /// Returns the version that was published, or `None` when the source
    /// matched the current document.
    pub async fn handle_event(
        &mut self,
        event: WatchEvent,
        queue: &mut mpsc::Receiver<WatchEvent>,
    ) -> Result<Option<u64>, ServerError> {
        let mut latest = event;
        loop {
            tracing::debug!(
                path = %latest.path.display(),
                observation = ?latest.observation,
                "source change",
            );
            self.transition(PipelineState::Rendering);
            let outcome = self.prepare().await?;

            let mut superseded = 0usize;
            while let Ok(newer) = queue.try_recv() {
                latest = newer;
                superseded += 1;
            }
            if superseded > 0 {
                tracing::debug!(superseded, "newer changes arrived during render, discarding result");
                continue;
            }
            return self.commit(outcome).await;
        }
    }

    /// Consume watch events until shutdown or until the watcher goes away.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<WatchEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        loop {
            let event = tokio::select! {
                _ = shutdown_rx.recv() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle_event(event, &mut events).await?;
        }
        Ok(())
    }

    async fn prepare(&self) -> Result<Outcome, ServerError> {
        let bytes = match read_with_retry(&self.source, &self.read_policy).await {
            Ok(bytes) => bytes,
            Err(failure) => {
                let current = self.documents.current().await;
                let message = failure.to_string();
                if current.fingerprint.is_none() && current.error_message() == Some(&message) {
                    return Ok(Outcome::Unchanged);
                }
                return Ok(Outcome::Failed {
                    fingerprint: None,
                    failure: Failure::Read(failure),
                });
            }
        };

        let fingerprint = Fingerprint::of(&bytes);
        if self.documents.current().await.fingerprint.as_ref() == Some(&fingerprint) {
            return Ok(Outcome::Unchanged);
        }

        let renderer = Arc::clone(&self.renderer);
        let rendered = tokio::task::spawn_blocking(move || render_source(&renderer, &bytes))
            .await
            .map_err(|err| ServerError::Join(format!("render task join error: {err}")))?;

        Ok(match rendered {
            Ok(html) => Outcome::Preview { html, fingerprint },
            Err(failure) => Outcome::Failed {
                fingerprint: Some(fingerprint),
                failure,
            },
        })
    }

    async fn commit(&mut self, outcome: Outcome) -> Result<Option<u64>, ServerError> {
        let document = match outcome {
            Outcome::Unchanged => {
                tracing::debug!("source unchanged, nothing to publish");
                self.transition(PipelineState::Idle);
                return Ok(None);
            }
            Outcome::Preview { html, fingerprint } => {
                self.documents.publish_preview(html, fingerprint).await
            }
            Outcome::Failed {
                fingerprint,
                failure,
            } => self.publish_failure(fingerprint, failure).await,
        };

        log_published(&document);

        self.transition(PipelineState::Broadcasting);
        // Dispatch whatever is current now, not the version captured above.
        let version = self.documents.version().await;
        let report = self.sessions.broadcast(version).await;
        tracing::info!(
            version,
            delivered = report.delivered,
            evicted = report.evicted,
            "reload broadcast",
        );
        self.transition(PipelineState::Idle);
        Ok(Some(document.version))
    }

    async fn publish_failure(
        &self,
        fingerprint: Option<Fingerprint>,
        failure: Failure,
    ) -> Arc<RenderedDocument> {
        let last_good_version = self.documents.last_good().await.map(|d| d.version);
        let message = failure.message();
        let page = ErrorPage {
            heading: failure.heading().to_string(),
            source: self.source.display().to_string(),
            message: message.clone(),
            location: failure.location(),
            last_good_version,
        };
        let html = self.renderer.render_error(&page);
        self.documents.publish_error(html, fingerprint, message).await
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            tracing::trace!(from = ?self.state, to = ?next, "pipeline state");
            self.state = next;
        }
    }
}

fn log_published(document: &RenderedDocument) {
    let fingerprint = document
        .fingerprint
        .as_ref()
        .map(|fp| fp.to_string())
        .unwrap_or_else(|| "-".to_string());
    match document.error_message() {
        None => tracing::info!(version = document.version, %fingerprint, "preview rendered"),
        Some(message) => tracing::warn!(
            version = document.version,
            %fingerprint,
            error = %message,
            "published error document",
        ),
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Start the preview runtime and block the current thread until it exits.
///
/// `on_ready` runs once the listener is bound and the first render is
/// published.
pub fn start_blocking<F>(config: PreviewConfig, on_ready: F) -> Result<(), ServerError>
where
    F: FnOnce(SocketAddr),
{
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, on_ready))
}

/// Run the preview runtime until Ctrl-C is received or one of its tasks stops.
pub async fn run<F>(config: PreviewConfig, on_ready: F) -> Result<(), ServerError>
where
    F: FnOnce(SocketAddr),
{
    run_with_shutdown(config, on_ready, ctrl_c()).await
}

/// Run watcher, orchestrator and HTTP server until `shutdown` resolves or
/// one of them stops.
///
/// On shutdown the watcher stops, every event stream ends and the listener
/// is released before this returns.
pub async fn run_with_shutdown<F, S>(
    config: PreviewConfig,
    on_ready: F,
    shutdown: S,
) -> Result<(), ServerError>
where
    F: FnOnce(SocketAddr),
    S: Future<Output = ()> + Send + 'static,
{
    let renderer = Arc::new(match &config.templates {
        Some(dir) => Renderer::with_overrides(dir)?,
        None => Renderer::new()?,
    });

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr().map_err(|e| io_err("listener", e))?;

    let documents = DocumentStore::new();
    let sessions = SessionRegistry::new();

    let baseline = observe(&config.source, &config.watch.read_policy).await;
    let mut orchestrator = Orchestrator::new(
        config.source.clone(),
        config.watch.read_policy,
        renderer,
        documents.clone(),
        sessions.clone(),
    );
    orchestrator.render_now().await?;

    tracing::info!(%local_addr, source = %config.source.display(), "preview server listening");
    on_ready(local_addr);

    let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(EVENT_QUEUE_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let watcher = FileWatcher::new(&config.source, config.watch).with_baseline(baseline);
        tokio::spawn(async move {
            let result = watcher.run(event_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let orchestrator_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = orchestrator.run(event_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let http_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let app = router(AppState {
            documents,
            sessions: sessions.clone(),
        });
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    // Open event streams would otherwise hold graceful shutdown forever.
                    sessions.close_all();
                })
                .await
                .map_err(|e| io_err(local_addr.to_string(), e));
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let trigger = shutdown_tx.clone();
        let mut shutdown_rx = trigger.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                () = shutdown => {
                    tracing::info!("shutdown requested, stopping preview server");
                    let _ = trigger.send(());
                }
            }
            Ok::<(), ServerError>(())
        })
    };

    let (watcher_result, orchestrator_result, http_result, signal_result) = tokio::join!(
        watcher_handle,
        orchestrator_handle,
        http_handle,
        signal_handle
    );

    handle_join("watcher", watcher_result)?;
    handle_join("orchestrator", orchestrator_result)?;
    handle_join("http_server", http_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c"),
        Err(err) => {
            tracing::warn!(error = %err, "ctrl-c handler unavailable, running until a task stops");
            std::future::pending::<()>().await;
        }
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(ServerError::Join(format!("{task} task join failure: {err}"))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
