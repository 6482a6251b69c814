use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::activity::{ActivityMonitor, ActivityToken};
use crate::poll::PollContext;
use crate::sync::{ImportError, ListDocument};
use crate::tree::{Feed, ReadingList, RefreshError};
use crate::util::{resolve_entry_url, validate_url};

/// One unit of scheduled work. Ephemeral: created at enqueue time,
/// consumed by a worker, discarded after run.
#[derive(Debug, Clone)]
pub enum Task {
    FeedUpdate(Arc<Feed>),
    ReadingListUpdate(Arc<ReadingList>),
}

impl Task {
    pub(crate) fn is_list_task(&self) -> bool {
        matches!(self, Task::ReadingListUpdate(_))
    }

    /// Human-readable label for logs and activity reporting.
    pub fn label(&self) -> String {
        match self {
            Task::FeedUpdate(feed) => format!("feed update: {}", feed.url()),
            Task::ReadingListUpdate(list) => format!("reading-list update: {}", list.url()),
        }
    }

    /// Runs the task to completion. Never returns an error: every
    /// failure is caught here, logged, and reflected in source flags.
    pub(crate) async fn run(self, ctx: &PollContext) {
        match self {
            Task::FeedUpdate(feed) => run_feed_update(ctx, feed).await,
            Task::ReadingListUpdate(list) => run_list_update(ctx, list).await,
        }
    }
}

// ============================================================================
// Finalization guards
// ============================================================================

// The in-progress flags must be cleared on every exit path, including
// unwinding out of a panicking collaborator. Drop is the finally block.

struct FeedClaimGuard(Arc<Feed>);

impl Drop for FeedClaimGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

struct ListClaimGuard(Arc<ReadingList>);

impl Drop for ListClaimGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

struct ActivityGuard<'a> {
    monitor: &'a dyn ActivityMonitor,
    token: ActivityToken,
}

impl<'a> ActivityGuard<'a> {
    fn start(monitor: &'a dyn ActivityMonitor, label: &str) -> Self {
        let token = monitor.activity_started(label);
        Self { monitor, token }
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.monitor.activity_finished(self.token);
    }
}

// ============================================================================
// Feed update
// ============================================================================

async fn run_feed_update(ctx: &PollContext, feed: Arc<Feed>) {
    let _claim = FeedClaimGuard(feed.clone());

    // The tree may have been swapped or the feed unsubscribed between
    // enqueue and run. Skip silently; the guard still finalizes.
    if !ctx.current_tree().contains_feed(feed.id()) {
        tracing::debug!(feed = %feed.url(), "Feed detached from tree, skipping refresh");
        return;
    }

    let _activity = ActivityGuard::start(&*ctx.activity, feed.title());

    match ctx.refresher.refresh(&feed).await {
        Ok(()) => {
            feed.set_invalid(false);
            feed.set_missing(false);
            feed.set_last_poll(Utc::now());
            tracing::debug!(feed = %feed.url(), "Feed refreshed");
        }
        Err(RefreshError::NotFound) => {
            feed.set_missing(true);
            tracing::info!(feed = %feed.url(), "Feed not found at origin");
        }
        Err(RefreshError::Parse(msg)) => {
            feed.set_invalid(true);
            tracing::warn!(feed = %feed.url(), error = %msg, "Feed content invalid");
        }
        Err(RefreshError::Network(msg)) => {
            tracing::warn!(
                feed = %feed.url(),
                error = %msg,
                "Feed refresh failed, will retry on next scan"
            );
        }
    }
}

// ============================================================================
// Reading-list update
// ============================================================================

async fn run_list_update(ctx: &PollContext, list: Arc<ReadingList>) {
    let _claim = ListClaimGuard(list.clone());
    let _activity = ActivityGuard::start(&*ctx.activity, &list.title());

    // Fetching
    let doc = match ctx.importer.import_list(list.url()).await {
        Ok(doc) => {
            list.set_missing(false);
            doc
        }
        Err(ImportError::NotFound) => {
            list.set_missing(true);
            tracing::info!(list = %list.url(), "Reading list not found at origin");
            return;
        }
        Err(e) => {
            // last_poll stays unset so the list is retried sooner
            tracing::warn!(
                list = %list.url(),
                error = %e,
                "Reading list fetch failed, will retry on next scan"
            );
            return;
        }
    };

    if let Some(title) = &doc.title {
        list.set_title(title.clone());
    }

    // Diffing
    let (to_add, to_remove) = diff_membership(ctx, &list, &doc);

    // Reconciling
    let (to_add, to_remove) = reconcile_redirects(ctx, to_add, to_remove).await;

    // Applying
    if !to_add.is_empty() || !to_remove.is_empty() {
        tracing::info!(
            list = %list.url(),
            added = to_add.len(),
            removed = to_remove.len(),
            "Reading list membership changed"
        );
        if let Err(e) = ctx.applier.apply(list.clone(), to_add, to_remove).await {
            tracing::error!(list = %list.url(), error = %e, "Failed to apply reading-list delta");
            return;
        }
    }

    list.set_last_poll(Utc::now());
}

/// Computes the naive membership diff between the fetched document and
/// the local member set.
///
/// Entry URLs are resolved against the list's base URL, validated,
/// deduplicated, and the adds capped at the configured import limit.
/// Entries past the cap still count as remotely present, so they never
/// leak into `to_remove`.
fn diff_membership(
    ctx: &PollContext,
    list: &ReadingList,
    doc: &ListDocument,
) -> (Vec<Arc<Feed>>, Vec<Arc<Feed>>) {
    let local = list.members();
    let local_urls: HashSet<&str> = local.iter().map(|f| f.url()).collect();

    let mut remote_urls: HashSet<String> = HashSet::new();
    let mut to_add = Vec::new();
    let mut skipped_invalid = 0usize;
    let mut over_limit = 0usize;

    for entry in &doc.entries {
        let url = resolve_entry_url(&entry.url, list.url());
        if validate_url(&url, ctx.settings.allow_private_networks).is_err() {
            skipped_invalid += 1;
            continue;
        }
        if !remote_urls.insert(url.clone()) {
            continue; // duplicate entry
        }
        if local_urls.contains(url.as_str()) {
            continue; // already a member
        }
        if to_add.len() >= ctx.settings.import_limit {
            over_limit += 1;
            continue;
        }
        let title = entry.title.clone().unwrap_or_else(|| url.clone());
        to_add.push(Arc::new(Feed::new(url, title)));
    }

    if skipped_invalid > 0 {
        tracing::warn!(
            list = %list.url(),
            skipped = skipped_invalid,
            "Reading-list entries with invalid URLs skipped"
        );
    }
    if over_limit > 0 {
        tracing::warn!(
            list = %list.url(),
            limit = ctx.settings.import_limit,
            dropped = over_limit,
            "Reading-list import limit reached, ignoring further new entries"
        );
    }

    let to_remove: Vec<Arc<Feed>> = local
        .iter()
        .filter(|f| !remote_urls.contains(f.url()))
        .cloned()
        .collect();

    (to_add, to_remove)
}

/// Adjusts a naive diff for feeds that moved rather than disappeared.
///
/// A feed whose URL permanently redirected shows up as one entry in
/// `to_add` (the new URL) and one in `to_remove` (the old URL); applying
/// that naively would destroy the existing feed's history. Redirect
/// chains are probed in both directions (an added URL resolving onto a
/// removed one, or a removed URL resolving onto an added one), and any
/// confirmed pair is dropped from both sets, keeping the existing feed
/// in place. Each URL is probed at most once.
///
/// Skipped entirely when either set is empty (the common case, avoids
/// needless network probing). A probe failure or redirect cycle leaves
/// the naive outcome for that pair untouched.
async fn reconcile_redirects(
    ctx: &PollContext,
    mut to_add: Vec<Arc<Feed>>,
    mut to_remove: Vec<Arc<Feed>>,
) -> (Vec<Arc<Feed>>, Vec<Arc<Feed>>) {
    if to_add.is_empty() || to_remove.is_empty() {
        return (to_add, to_remove);
    }

    // Pass 1: does an added URL resolve onto a removed one?
    let mut i = 0;
    while i < to_add.len() && !to_remove.is_empty() {
        if let Some(resolved) = probe(ctx, to_add[i].url()).await {
            if let Some(pos) = to_remove.iter().position(|f| f.url() == resolved) {
                tracing::info!(
                    from = %to_add[i].url(),
                    to = %resolved,
                    "Added entry is a redirect of an existing member, keeping the member"
                );
                to_remove.remove(pos);
                to_add.remove(i);
                continue;
            }
        }
        i += 1;
    }

    // Pass 2: does a removed URL resolve onto an added one? This is the
    // moved-feed case: the permanent redirect lives on the old URL.
    let mut i = 0;
    while i < to_remove.len() && !to_add.is_empty() {
        if let Some(resolved) = probe(ctx, to_remove[i].url()).await {
            if let Some(pos) = to_add.iter().position(|f| f.url() == resolved) {
                tracing::info!(
                    from = %to_remove[i].url(),
                    to = %resolved,
                    "Existing member moved to a new URL, preserving it"
                );
                to_add.remove(pos);
                to_remove.remove(i);
                continue;
            }
        }
        i += 1;
    }

    (to_add, to_remove)
}

/// One redirect probe. `None` covers both "could not confirm" cases:
/// network failure and redirect cycle.
async fn probe(ctx: &PollContext, url: &str) -> Option<String> {
    match ctx.resolver.resolve(url).await {
        Ok(Some(resolved)) => Some(resolved),
        Ok(None) => {
            tracing::debug!(url = %url, "Redirect cycle during reconciliation, keeping naive diff");
            None
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Redirect probe failed, keeping naive diff");
            None
        }
    }
}
