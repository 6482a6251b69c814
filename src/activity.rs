//! Observability seam for long-running task activity.
//!
//! Tasks signal `activity_started` / `activity_finished` around their
//! work so a host UI can show a busy indicator. Purely informational:
//! nothing in the scheduler ever branches on these calls.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle returned by [`ActivityMonitor::activity_started`] and
/// passed back to [`ActivityMonitor::activity_finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityToken(pub u64);

/// Receiver for task activity signals.
///
/// Implementations must be cheap and non-blocking; these hooks run on
/// worker tasks, bracketing network I/O.
pub trait ActivityMonitor: Send + Sync {
    /// Signals that a unit of work with the given label has started.
    fn activity_started(&self, label: &str) -> ActivityToken;

    /// Signals that the unit of work identified by `token` has finished.
    fn activity_finished(&self, token: ActivityToken);
}

/// Monitor that ignores all signals.
#[derive(Debug, Default)]
pub struct NullActivityMonitor;

impl ActivityMonitor for NullActivityMonitor {
    fn activity_started(&self, _label: &str) -> ActivityToken {
        ActivityToken(0)
    }

    fn activity_finished(&self, _token: ActivityToken) {}
}

/// Monitor that logs activity spans through `tracing`.
#[derive(Debug, Default)]
pub struct LogActivityMonitor {
    next_token: AtomicU64,
}

impl ActivityMonitor for LogActivityMonitor {
    fn activity_started(&self, label: &str) -> ActivityToken {
        let token = ActivityToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(token = token.0, label = %label, "Activity started");
        token
    }

    fn activity_finished(&self, token: ActivityToken) {
        tracing::debug!(token = token.0, "Activity finished");
    }
}
