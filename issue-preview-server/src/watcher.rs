//! Change watcher: polls the source document, fingerprints it, and emits a
//! debounced [`WatchEvent`] whenever the observed state changes.
//!
//! Native filesystem events (via `notify`) only wake the poller early. The
//! fingerprint comparison is the single source of truth, so a missed or
//! spurious native event never produces a wrong result.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use issue_preview_core::Fingerprint;

use crate::config::{ReadPolicy, WatchConfig};
use crate::error::ServerError;
use crate::source::read_with_retry;

/// What one poll saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Content(Fingerprint),
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub observation: Observation,
    pub observed_at: DateTime<Utc>,
}

/// Read `path` under `policy` and reduce the result to an [`Observation`].
pub async fn observe(path: &Path, policy: &ReadPolicy) -> Observation {
    match read_with_retry(path, policy).await {
        Ok(bytes) => Observation::Content(Fingerprint::of(&bytes)),
        Err(failure) => Observation::Unreadable {
            reason: failure.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Pending {
    observation: Observation,
    changed_at: Instant,
}

/// Trailing-edge debounce over observations.
///
/// A change is emitted once it has been stable for `window`; changes closer
/// together than `window` collapse into one carrying the final observation.
/// An observation equal to the last emitted one is never re-emitted.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_emitted: Option<Observation>,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(window: Duration, baseline: Option<Observation>) -> Self {
        Debouncer {
            window,
            last_emitted: baseline,
            pending: None,
        }
    }

    /// Feed one observation taken at `now`; returns the observation to emit,
    /// if any.
    pub fn observe(&mut self, observation: Observation, now: Instant) -> Option<Observation> {
        if self.last_emitted.as_ref() == Some(&observation) {
            self.pending = None;
            return None;
        }
        match &self.pending {
            Some(pending) if pending.observation == observation => {}
            _ => {
                self.pending = Some(Pending {
                    observation,
                    changed_at: now,
                })
            }
        }
        self.flush(now)
    }

    /// Emit the pending observation if it has settled for the full window.
    pub fn flush(&mut self, now: Instant) -> Option<Observation> {
        let settled = self
            .pending
            .as_ref()
            .is_some_and(|p| now.duration_since(p.changed_at) >= self.window);
        if !settled {
            return None;
        }
        let pending = self.pending.take()?;
        self.last_emitted = Some(pending.observation.clone());
        Some(pending.observation)
    }

    pub fn last_emitted(&self) -> Option<&Observation> {
        self.last_emitted.as_ref()
    }
}

// ---------------------------------------------------------------------------
// FileWatcher
// ---------------------------------------------------------------------------

pub struct FileWatcher {
    path: PathBuf,
    config: WatchConfig,
    baseline: Option<Observation>,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>, config: WatchConfig) -> Self {
        FileWatcher {
            path: path.into(),
            config,
            baseline: None,
        }
    }

    /// Start from a known observation so the current state is not re-emitted.
    pub fn with_baseline(mut self, baseline: Observation) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Poll until shutdown, sending each settled change to `events`.
    ///
    /// Read failures never end the loop; they surface as
    /// [`Observation::Unreadable`] events.
    pub async fn run(
        self,
        events: mpsc::Sender<WatchEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let (nudge_tx, mut nudge_rx) = mpsc::unbounded_channel::<()>();
        let _native = match native_watcher(&self.path, nudge_tx) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "native file events unavailable, polling only",
                );
                None
            }
        };

        let mut debouncer = Debouncer::new(self.config.debounce, self.baseline);
        // interval() panics on a zero period.
        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            path = %self.path.display(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            debounce_ms = self.config.debounce.as_millis() as u64,
            "watching source document",
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {}
                Some(()) = nudge_rx.recv() => {}
            }

            let observation = observe(&self.path, &self.config.read_policy).await;
            let Some(observation) = debouncer.observe(observation, Instant::now()) else {
                continue;
            };

            if let Observation::Unreadable { reason } = &observation {
                tracing::warn!(path = %self.path.display(), %reason, "source unreadable");
            }
            let event = WatchEvent {
                path: self.path.clone(),
                observation,
                observed_at: Utc::now(),
            };
            if events.send(event).await.is_err() {
                tracing::debug!("watch event receiver dropped, stopping watcher");
                break;
            }
        }

        Ok(())
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

// Watches the parent directory: editors that save by rename-replace would
// otherwise leave a watch on a dead inode.
fn native_watcher(
    path: &Path,
    nudge: mpsc::UnboundedSender<()>,
) -> Result<RecommendedWatcher, ServerError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());

    let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
        let Ok(event) = event else { return };
        if !is_relevant_event_kind(&event.kind) {
            return;
        }
        let touches_source = event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
        if touches_source {
            let _ = nudge.send(());
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn content(s: &str) -> Observation {
        Observation::Content(Fingerprint::of(s.as_bytes()))
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_writes() {
        let window = Duration::from_millis(200);
        let mut debouncer = Debouncer::new(window, Some(content("v0")));
        let mut emitted = Vec::new();

        for version in ["v1", "v2", "v3"] {
            emitted.extend(debouncer.observe(content(version), Instant::now()));
            advance(Duration::from_millis(50)).await;
        }
        // Polls keep seeing the final state until it settles.
        for _ in 0..10 {
            emitted.extend(debouncer.observe(content("v3"), Instant::now()));
            advance(Duration::from_millis(50)).await;
        }

        assert_eq!(emitted, vec![content("v3")], "three writes collapse to one event");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn baseline_is_not_re_emitted() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100), Some(content("v0")));
        for _ in 0..5 {
            assert_eq!(debouncer.observe(content("v0"), Instant::now()), None);
            advance(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn revert_before_settling_emits_nothing() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100), Some(content("v0")));
        assert_eq!(debouncer.observe(content("v1"), Instant::now()), None);
        advance(Duration::from_millis(20)).await;
        assert_eq!(debouncer.observe(content("v0"), Instant::now()), None);
        advance(Duration::from_millis(500)).await;
        assert_eq!(debouncer.flush(Instant::now()), None);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn persistent_unreadable_reported_once_then_recovery() {
        let gone = Observation::Unreadable {
            reason: "source file not found (tried 5 times)".to_string(),
        };
        let mut debouncer = Debouncer::new(Duration::ZERO, Some(content("v0")));
        let mut emitted = Vec::new();
        for _ in 0..4 {
            emitted.extend(debouncer.observe(gone.clone(), Instant::now()));
            advance(Duration::from_millis(250)).await;
        }
        emitted.extend(debouncer.observe(content("v1"), Instant::now()));

        assert_eq!(emitted, vec![gone, content("v1")]);
        assert_eq!(debouncer.last_emitted(), Some(&content("v1")));
    }

    #[test]
    fn relevant_event_kinds() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind};
        assert!(is_relevant_event_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event_kind(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_relevant_event_kind(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_relevant_event_kind(&EventKind::Access(
            notify::event::AccessKind::Any
        )));
    }
}
