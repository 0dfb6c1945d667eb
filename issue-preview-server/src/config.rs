//! Runtime configuration and defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

pub const READ_ATTEMPTS: u32 = 5;
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Per-session notification queue depth.
pub const SESSION_QUEUE_CAPACITY: usize = 8;
pub const DELIVERY_ATTEMPTS: u32 = 3;
pub const DELIVERY_BACKOFF: Duration = Duration::from_millis(10);

/// Watcher → orchestrator queue depth.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// How hard to try before declaring the source unreadable.
///
/// An absent or empty file is treated as transient (editors often truncate
/// or rename-replace on save) and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        ReadPolicy {
            attempts: READ_ATTEMPTS,
            retry_delay: READ_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub read_policy: ReadPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
            read_policy: ReadPolicy::default(),
        }
    }
}

/// Everything [`crate::run`] needs to serve one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    pub source: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub watch: WatchConfig,
    /// Directory of template overrides for the renderer.
    pub templates: Option<PathBuf>,
}

impl PreviewConfig {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        PreviewConfig {
            source: source.into(),
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            watch: WatchConfig::default(),
            templates: None,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PreviewConfig::new("bug.yml");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8000");
        assert_eq!(config.watch.poll_interval, Duration::from_millis(250));
        assert_eq!(config.watch.debounce, Duration::from_millis(200));
        assert_eq!(config.watch.read_policy.attempts, 5);
        assert!(config.templates.is_none());
    }
}
