//! Connectivity observation: a de-duplicated stream of network states.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use doric_core::ConnectivityStatus;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ConfigError;

/// Something that can report network state changes.
pub trait ConnectivityObserver: Send + Sync {
    fn observe(&self) -> ConnectivityStream;
}

/// Receiving end of a connectivity source.
///
/// Never yields the same status twice in a row, even when the source
/// flaps faster than the reader.
pub struct ConnectivityStream {
    rx: watch::Receiver<ConnectivityStatus>,
    last: ConnectivityStatus,
}

impl ConnectivityStream {
    fn new(mut rx: watch::Receiver<ConnectivityStatus>) -> Self {
        let last = *rx.borrow_and_update();
        Self { rx, last }
    }

    #[must_use]
    pub fn current(&self) -> ConnectivityStatus {
        *self.rx.borrow()
    }

    /// Waits for the next distinct status. `None` once the source is gone.
    pub async fn changed(&mut self) -> Option<ConnectivityStatus> {
        loop {
            self.rx.changed().await.ok()?;
            let status = *self.rx.borrow_and_update();
            if status != self.last {
                self.last = status;
                return Some(status);
            }
        }
    }
}

//
// ─── MANUAL SOURCE ─────────────────────────────────────────────────────────────
//

/// Source driven by the host: platform network callbacks call [`set`](Self::set).
#[derive(Clone)]
pub struct ManualConnectivity {
    tx: Arc<watch::Sender<ConnectivityStatus>>,
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(ConnectivityStatus::default())
    }
}

impl ManualConnectivity {
    #[must_use]
    pub fn new(initial: ConnectivityStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Records a status. Repeating the current status notifies nobody.
    pub fn set(&self, status: ConnectivityStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    #[must_use]
    pub fn current(&self) -> ConnectivityStatus {
        *self.tx.borrow()
    }
}

impl ConnectivityObserver for ManualConnectivity {
    fn observe(&self) -> ConnectivityStream {
        ConnectivityStream::new(self.tx.subscribe())
    }
}

//
// ─── PROBE SOURCE ──────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub addr: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            addr: "8.8.8.8:53".into(),
            interval: Duration::from_secs(5),
            timeout: Duration::from_millis(5000),
        }
    }
}

impl ProbeConfig {
    /// Reads `DORIC_PROBE_ADDR`, `DORIC_PROBE_INTERVAL_SECS`, and
    /// `DORIC_PROBE_TIMEOUT_MS`, falling back to defaults for unset values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` for a non-numeric duration.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(addr) = env::var("DORIC_PROBE_ADDR") {
            if !addr.trim().is_empty() {
                config.addr = addr.trim().to_string();
            }
        }
        if let Some(secs) = parse_env_u64("DORIC_PROBE_INTERVAL_SECS")? {
            config.interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = parse_env_u64("DORIC_PROBE_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

fn parse_env_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, raw }),
        Err(_) => Ok(None),
    }
}

/// One reachability check. A timeout counts as unreachable.
pub async fn probe_reachable(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            tracing::debug!(addr, error = %err, "connectivity probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(addr, "connectivity probe timed out");
            false
        }
    }
}

/// Maps a probe result onto the status model. Losing a previously
/// available network reads as `Lost`; never having had one reads as `Unavailable`.
#[must_use]
pub fn status_after_probe(previous: ConnectivityStatus, reachable: bool) -> ConnectivityStatus {
    match (reachable, previous) {
        (true, _) => ConnectivityStatus::Available,
        (false, ConnectivityStatus::Available | ConnectivityStatus::Losing) => {
            ConnectivityStatus::Lost
        }
        (false, ConnectivityStatus::Lost) => ConnectivityStatus::Lost,
        (false, ConnectivityStatus::Unavailable) => ConnectivityStatus::Unavailable,
    }
}

/// Source that polls a TCP endpoint in the background.
///
/// Starts `Unavailable` until the first probe answers. The task stops when
/// this value is dropped.
pub struct ProbeConnectivity {
    source: ManualConnectivity,
    task: JoinHandle<()>,
}

impl ProbeConnectivity {
    /// Spawns the probe loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(config: ProbeConfig) -> Self {
        let source = ManualConnectivity::default();
        let writer = source.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe_reachable(&config.addr, config.timeout).await;
                let next = status_after_probe(writer.current(), reachable);
                if next != writer.current() {
                    tracing::info!(status = %next, "connectivity changed");
                }
                writer.set(next);
            }
        });
        Self { source, task }
    }

    #[must_use]
    pub fn current(&self) -> ConnectivityStatus {
        self.source.current()
    }
}

impl ConnectivityObserver for ProbeConnectivity {
    fn observe(&self) -> ConnectivityStream {
        self.source.observe()
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.task.abort();
    }
}
