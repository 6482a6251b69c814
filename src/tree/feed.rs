use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::settings::Settings;

/// Monotonic source for feed identities. Identities are stable for the
/// lifetime of the process, which is the lifetime of the tree.
static NEXT_FEED_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a feed, independent of its URL.
///
/// A feed keeps its identity when its URL changes through a redirect,
/// which is exactly what the reconciliation pass preserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedId(u64);

// ============================================================================
// Refresh collaborator
// ============================================================================

/// Errors a feed refresh collaborator can report back to the scheduler.
///
/// The variants map onto feed lifecycle flags: `NotFound` marks the feed
/// missing, `Parse` marks it invalid, anything else is logged and
/// retried on a later scan.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The feed no longer exists at its origin.
    #[error("feed not found at origin")]
    NotFound,
    /// The fetched content could not be parsed as a feed.
    #[error("feed content could not be parsed: {0}")]
    Parse(String),
    /// Network-level failure (DNS, connection, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),
}

/// The external collaborator that actually fetches and stores a feed's
/// content. The scheduler owns *when* a refresh happens and the
/// lifecycle flags around it; the collaborator owns everything else.
#[async_trait]
pub trait FeedRefresher: Send + Sync {
    async fn refresh(&self, feed: &Feed) -> Result<(), RefreshError>;
}

// ============================================================================
// Feed
// ============================================================================

/// A pollable content source.
///
/// Shared via `Arc` between the tree, in-flight tasks, and reading-list
/// membership. Lifecycle flags are atomics so the UI thread can read
/// them while a worker mutates them; `last_poll` sits behind a mutex
/// because it is a compound value.
#[derive(Debug)]
pub struct Feed {
    id: FeedId,
    url: String,
    title: String,
    visible: bool,
    interval_override: Option<chrono::Duration>,
    processing: AtomicBool,
    invalid: AtomicBool,
    missing: AtomicBool,
    last_poll: Mutex<Option<DateTime<Utc>>>,
}

impl Feed {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: FeedId(NEXT_FEED_ID.fetch_add(1, Ordering::Relaxed)),
            url: url.into(),
            title: title.into(),
            visible: true,
            interval_override: None,
            processing: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            missing: AtomicBool::new(false),
            last_poll: Mutex::new(None),
        }
    }

    /// Marks the feed hidden from normal scans. Hidden feeds are only
    /// refreshed when the caller passes `allow_invisible`.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Overrides the global auto-refresh interval for this feed.
    pub fn with_interval(mut self, interval: chrono::Duration) -> Self {
        self.interval_override = Some(interval);
        self
    }

    pub fn id(&self) -> FeedId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    // ------------------------------------------------------------------
    // Lifecycle flags
    // ------------------------------------------------------------------

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Atomically claims the feed for one in-flight update.
    ///
    /// Check-and-mark is a single compare-and-set: two concurrent
    /// callers (a manual trigger racing the periodic scan) cannot both
    /// succeed. Returns `false` when an update is already in flight.
    pub(crate) fn try_claim(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the in-flight claim. Paired with every successful
    /// [`try_claim`](Feed::try_claim), on all exit paths.
    pub(crate) fn release(&self) {
        self.processing.store(false, Ordering::Release);
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    pub fn set_invalid(&self, invalid: bool) {
        self.invalid.store(invalid, Ordering::Release);
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

    // ------------------------------------------------------------------
    // Eligibility
    // ------------------------------------------------------------------

    /// Whether the feed may be refreshed right now.
    ///
    /// Manual requests bypass the interval and validity checks but are
    /// gated by the global `allow_manual_feed_updates` toggle. Automatic
    /// requests additionally require the feed to be valid and due.
    /// A feed with an update already in flight is never updatable.
    pub fn is_updatable(
        &self,
        manual: bool,
        allow_invisible: bool,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_processing() {
            return false;
        }
        if !self.visible && !allow_invisible {
            return false;
        }
        if manual {
            return settings.allow_manual_feed_updates;
        }
        if self.is_invalid() {
            return false;
        }
        self.is_due(settings, now)
    }

    /// The automatic-scan eligibility predicate: visible, valid, due.
    pub fn wants_automatic_update(&self, settings: &Settings, now: DateTime<Utc>) -> bool {
        self.is_updatable(false, false, settings, now)
    }

    fn is_due(&self, settings: &Settings, now: DateTime<Utc>) -> bool {
        let interval = match self.interval_override.or_else(|| settings.feed_interval()) {
            Some(interval) => interval,
            // Auto-refresh disabled globally and no per-feed override
            None => return false,
        };
        match self.last_poll() {
            None => true,
            Some(last) => now - last >= interval,
        }
    }
}
