use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::settings::Settings;
use crate::tree::Feed;

/// A remotely published collection of feed references.
///
/// Identity is the source URL. Membership is re-fetched periodically
/// and reconciled against the local state; the member vector is only
/// ever mutated on the delta-applier actor, so readers see either the
/// old or the new membership, never a partial edit.
#[derive(Debug)]
pub struct ReadingList {
    url: String,
    title: Mutex<String>,
    members: Mutex<Vec<Arc<Feed>>>,
    updating: AtomicBool,
    missing: AtomicBool,
    last_poll: Mutex<Option<DateTime<Utc>>>,
    interval_override: Option<chrono::Duration>,
}

impl ReadingList {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: Mutex::new(url.clone()),
            url,
            members: Mutex::new(Vec::new()),
            updating: AtomicBool::new(false),
            missing: AtomicBool::new(false),
            last_poll: Mutex::new(None),
            interval_override: None,
        }
    }

    /// Overrides the global reading-list re-fetch interval.
    pub fn with_interval(mut self, interval: chrono::Duration) -> Self {
        self.interval_override = Some(interval);
        self
    }

    /// The source URL, which is also the list's identity.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> String {
        self.title.lock().unwrap().clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock().unwrap() = title.into();
    }

    /// Snapshot of the current membership, in order.
    pub fn members(&self) -> Vec<Arc<Feed>> {
        self.members.lock().unwrap().clone()
    }

    /// Replaces the entire membership. Host-side setup only; periodic
    /// reconciliation goes through the delta applier instead.
    pub fn replace_members(&self, members: Vec<Arc<Feed>>) {
        *self.members.lock().unwrap() = members;
    }

    /// Applies a reconciliation delta: drops `to_remove` (by identity),
    /// appends `to_add` in document order.
    pub(crate) fn apply_delta(&self, to_add: &[Arc<Feed>], to_remove: &[Arc<Feed>]) {
        let mut members = self.members.lock().unwrap();
        members.retain(|m| !to_remove.iter().any(|r| r.id() == m.id()));
        members.extend(to_add.iter().cloned());
    }

    // ------------------------------------------------------------------
    // Lifecycle flags
    // ------------------------------------------------------------------

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Atomically claims the list for one in-flight reconciliation.
    pub(crate) fn try_claim(&self) -> bool {
        self.updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.updating.store(false, Ordering::Release);
    }

    pub fn is_missing(&self) -> bool {
        self.missing.load(Ordering::Acquire)
    }

    pub fn set_missing(&self, missing: bool) {
        self.missing.store(missing, Ordering::Release);
    }

    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        *self.last_poll.lock().unwrap()
    }

    pub fn set_last_poll(&self, at: DateTime<Utc>) {
        *self.last_poll.lock().unwrap() = Some(at);
    }

    /// Whether the list's re-fetch interval has elapsed.
    pub fn is_due(&self, settings: &Settings, now: DateTime<Utc>) -> bool {
        let interval = match self.interval_override.or_else(|| settings.list_interval()) {
            Some(interval) => interval,
            None => return false,
        };
        match self.last_poll() {
            None => true,
            Some(last) => now - last >= interval,
        }
    }
}
