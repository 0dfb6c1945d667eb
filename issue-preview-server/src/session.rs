//! Reload sessions: one per open event stream.
//!
//! Each session owns a bounded queue of versions. [`SessionRegistry::broadcast`]
//! pushes the current version into every session that has not seen it yet;
//! sessions whose queue is closed, or still full after the retry budget, are
//! evicted. The stream side collapses queued versions so a browser only ever
//! reacts to the newest one.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{ready, Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::{DELIVERY_ATTEMPTS, DELIVERY_BACKOFF, SESSION_QUEUE_CAPACITY};

pub type SessionId = u64;

#[derive(Debug)]
struct SessionEntry {
    last_delivered: u64,
    tx: mpsc::Sender<u64>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: SessionId,
    closed: bool,
    sessions: BTreeMap<SessionId, SessionEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a session that has already seen `current_version`.
    ///
    /// After [`close_all`](Self::close_all) the returned stream ends
    /// immediately.
    pub fn register(&self, current_version: u64) -> SessionStream {
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        if !state.closed {
            state.sessions.insert(
                id,
                SessionEntry {
                    last_delivered: current_version,
                    tx,
                },
            );
            tracing::debug!(session = id, version = current_version, "session opened");
        }
        SessionStream {
            id,
            rx,
            registry: self.clone(),
        }
    }

    /// Deliver `version` to every session that is behind it.
    ///
    /// The lock is released while backing off between delivery attempts.
    pub async fn broadcast(&self, version: u64) -> BroadcastReport {
        let mut pending: Vec<(SessionId, mpsc::Sender<u64>)> = self
            .lock()
            .sessions
            .iter()
            .filter(|(_, entry)| entry.last_delivered < version)
            .map(|(id, entry)| (*id, entry.tx.clone()))
            .collect();

        let mut delivered = Vec::with_capacity(pending.len());
        let mut evicted = Vec::new();

        for attempt in 1..=DELIVERY_ATTEMPTS {
            pending.retain(|(id, tx)| match tx.try_send(version) {
                Ok(()) => {
                    delivered.push(*id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    evicted.push(*id);
                    false
                }
                Err(TrySendError::Full(_)) => true,
            });
            if pending.is_empty() {
                break;
            }
            if attempt < DELIVERY_ATTEMPTS {
                tokio::time::sleep(DELIVERY_BACKOFF * attempt).await;
            }
        }
        evicted.extend(pending.into_iter().map(|(id, _)| id));

        let mut state = self.lock();
        for id in &delivered {
            if let Some(entry) = state.sessions.get_mut(id) {
                entry.last_delivered = entry.last_delivered.max(version);
            }
        }
        for id in &evicted {
            if state.sessions.remove(id).is_some() {
                tracing::debug!(session = id, version, "session evicted");
            }
        }

        BroadcastReport {
            delivered: delivered.len(),
            evicted: evicted.len(),
        }
    }

    /// Drop every session and refuse new ones; open streams end.
    pub fn close_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        let closed = state.sessions.len();
        state.sessions.clear();
        tracing::debug!(sessions = closed, "all sessions closed");
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_delivered(&self, id: SessionId) -> Option<u64> {
        self.lock().sessions.get(&id).map(|e| e.last_delivered)
    }

    fn remove(&self, id: SessionId) {
        if self.lock().sessions.remove(&id).is_some() {
            tracing::debug!(session = id, "session disconnected");
        }
    }
}

/// Receiving half of a session. Yields reload versions, newest first wins.
///
/// Dropping the stream removes the session from its registry.
#[derive(Debug)]
pub struct SessionStream {
    id: SessionId,
    rx: mpsc::Receiver<u64>,
    registry: SessionRegistry,
}

impl SessionStream {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Stream for SessionStream {
    type Item = u64;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u64>> {
        let this = self.get_mut();
        let Some(mut newest) = ready!(this.rx.poll_recv(cx)) else {
            return Poll::Ready(None);
        };
        while let Ok(version) = this.rx.try_recv() {
            newest = newest.max(version);
        }
        Poll::Ready(Some(newest))
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
