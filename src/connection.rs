//! Process-wide online/offline state with change notification.
//!
//! The host application decides what "online" means (NetworkManager,
//! a reachability probe, a manual toggle) and publishes transitions
//! here. The scheduler reads the flag synchronously before a scan and
//! subscribes to transitions to re-trigger a scan that was skipped
//! while offline.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared connectivity flag backed by a watch channel.
///
/// Cloning is cheap; all clones observe the same state. Synchronous
/// reads via [`is_online`](ConnectionState::is_online), transitions
/// via [`subscribe`](ConnectionState::subscribe).
#[derive(Debug, Clone)]
pub struct ConnectionState {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectionState {
    /// Creates a new connection state with the given initial value.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Current online/offline flag.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Publishes a connectivity transition.
    ///
    /// Subscribers are only woken when the value actually changes.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online = online, "Connectivity changed");
        }
    }

    /// Returns a receiver that observes connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(true)
    }
}
