use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::activity::{ActivityMonitor, LogActivityMonitor};
use crate::connection::ConnectionState;
use crate::poll::{Task, WorkQueue};
use crate::settings::Settings;
use crate::sync::{DeltaApplier, ListImporter, RedirectResolver, TreeMutator};
use crate::tree::{Feed, FeedRefresher, GuideTree, ReadingList};

/// Everything a scan or a running task needs, threaded explicitly
/// instead of resolved through ambient global state.
///
/// Built once by the host, shared via `Arc` between the [`Poller`], the
/// worker pool, and every task.
pub struct PollContext {
    pub settings: Settings,
    pub connection: ConnectionState,
    pub(crate) refresher: Arc<dyn FeedRefresher>,
    pub(crate) importer: Arc<dyn ListImporter>,
    pub(crate) applier: DeltaApplier,
    pub(crate) resolver: RedirectResolver,
    pub(crate) activity: Arc<dyn ActivityMonitor>,
    queue: Arc<WorkQueue>,
    tree: Mutex<Arc<GuideTree>>,
}

impl PollContext {
    /// Builds a context around the host's collaborators.
    ///
    /// Spawns the delta-applier actor, so this must be called within a
    /// tokio runtime. Fails only if the redirect probe client cannot
    /// be constructed.
    pub fn new(
        settings: Settings,
        refresher: Arc<dyn FeedRefresher>,
        importer: Arc<dyn ListImporter>,
        mutator: Arc<dyn TreeMutator>,
    ) -> Result<Self, reqwest::Error> {
        let queue = Arc::new(WorkQueue::new(settings.queue_capacity));
        Ok(Self {
            settings,
            connection: ConnectionState::default(),
            refresher,
            importer,
            applier: DeltaApplier::spawn(mutator),
            resolver: RedirectResolver::new()?,
            activity: Arc::new(LogActivityMonitor::default()),
            queue,
            tree: Mutex::new(Arc::new(GuideTree::default())),
        })
    }

    /// Replaces the activity monitor (defaults to [`LogActivityMonitor`]).
    pub fn with_activity(mut self, activity: Arc<dyn ActivityMonitor>) -> Self {
        self.activity = activity;
        self
    }

    /// Replaces the connection state (defaults to always-online).
    pub fn with_connection(mut self, connection: ConnectionState) -> Self {
        self.connection = connection;
        self
    }

    /// Replaces the redirect resolver, e.g. to share a transport client.
    pub fn with_resolver(mut self, resolver: RedirectResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub(crate) fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.queue)
    }

    /// Number of tasks currently queued. Exposed for host diagnostics.
    pub fn queued_tasks(&self) -> usize {
        self.queue.len()
    }

    /// The current tree snapshot.
    pub fn current_tree(&self) -> Arc<GuideTree> {
        Arc::clone(&self.tree.lock().unwrap())
    }

    pub(crate) fn set_tree(&self, tree: GuideTree) {
        *self.tree.lock().unwrap() = Arc::new(tree);
    }
}

impl std::fmt::Debug for PollContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollContext")
            .field("settings", &self.settings)
            .field("queued_tasks", &self.queue.len())
            .finish_non_exhaustive()
    }
}

/// The root controller: walks the guide tree, decides what is due, and
/// feeds the work queue.
///
/// All scheduling methods are synchronous and cheap (eligibility
/// checks and an atomic claim, never I/O), so they can be called from
/// a timer task or straight from a UI event handler.
pub struct Poller {
    ctx: Arc<PollContext>,
    scan_skipped_offline: AtomicBool,
}

impl Poller {
    pub fn new(ctx: Arc<PollContext>) -> Self {
        Self {
            ctx,
            scan_skipped_offline: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<PollContext> {
        &self.ctx
    }

    /// Replaces the guide tree the scheduler walks. No I/O. Tasks
    /// already in flight for detached feeds skip themselves on run.
    pub fn set_source(&self, tree: GuideTree) {
        self.ctx.set_tree(tree);
    }

    /// Walks every guide and enqueues work for each eligible source.
    ///
    /// Offline, the scan is skipped and remembered;
    /// [`on_connectivity_restored`](Poller::on_connectivity_restored)
    /// replays it. Queue overflow along the way is deliberate
    /// backpressure: dropped sources are reconsidered on the next scan.
    pub fn scan_all(&self, manual: bool) {
        if !self.ctx.connection.is_online() {
            self.scan_skipped_offline.store(true, Ordering::Release);
            tracing::debug!(manual = manual, "Offline, skipping scan");
            return;
        }

        let now = Utc::now();
        let tree = self.ctx.current_tree();
        let mut enqueued = 0usize;

        for guide in tree.guides() {
            for list in &guide.lists {
                if self.request_list_update(list, manual) {
                    enqueued += 1;
                }
            }
            for feed in &guide.feeds {
                if manual || feed.wants_automatic_update(&self.ctx.settings, now) {
                    if self.request_update(feed, manual, false) {
                        enqueued += 1;
                    }
                }
            }
            // Reading-list members are pollable feeds like any other
            for list in &guide.lists {
                for feed in list.members() {
                    if manual || feed.wants_automatic_update(&self.ctx.settings, now) {
                        if self.request_update(&feed, manual, false) {
                            enqueued += 1;
                        }
                    }
                }
            }
        }

        tracing::debug!(manual = manual, enqueued = enqueued, "Scan complete");
    }

    /// Requests one feed update. Returns whether a task was enqueued.
    ///
    /// Check-and-mark is atomic: the eligibility re-check plus the
    /// `processing` claim cannot interleave with a concurrent caller
    /// (a manual user action racing the periodic scan), so at most one
    /// task is ever in flight per feed. Never blocks, never errors.
    pub fn request_update(&self, feed: &Arc<Feed>, manual: bool, allow_invisible: bool) -> bool {
        if !feed.is_updatable(manual, allow_invisible, &self.ctx.settings, Utc::now()) {
            return false;
        }
        if !feed.try_claim() {
            // Lost the race to a concurrent request
            return false;
        }
        if !self.ctx.queue.try_enqueue(Task::FeedUpdate(Arc::clone(feed))) {
            // Release so the next scan reconsiders this feed
            feed.release();
            tracing::debug!(feed = %feed.url(), "Work queue full, feed update dropped");
            return false;
        }
        true
    }

    /// Requests one reading-list reconciliation. Returns whether a
    /// task was enqueued. Same claim discipline as feed updates, on
    /// the list's `updating` flag.
    pub fn request_list_update(&self, list: &Arc<ReadingList>, manual: bool) -> bool {
        if list.is_updating() {
            return false;
        }
        let eligible = if manual {
            self.ctx.settings.allow_manual_list_updates
        } else {
            list.is_due(&self.ctx.settings, Utc::now())
        };
        if !eligible {
            return false;
        }
        if !list.try_claim() {
            return false;
        }
        if !self
            .ctx
            .queue
            .try_enqueue(Task::ReadingListUpdate(Arc::clone(list)))
        {
            list.release();
            tracing::debug!(list = %list.url(), "Work queue full, reading-list update dropped");
            return false;
        }
        true
    }

    /// Replays a scan that was skipped while offline. No-op when
    /// nothing was skipped.
    pub fn on_connectivity_restored(&self) {
        if self.scan_skipped_offline.swap(false, Ordering::AcqRel) {
            tracing::info!("Connectivity restored, re-running skipped scan");
            self.scan_all(false);
        }
    }

    /// Spawns a task that watches connectivity transitions and replays
    /// skipped scans when the connection comes back.
    pub fn spawn_connectivity_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        let mut rx = poller.ctx.connection.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if *rx.borrow_and_update() {
                    poller.on_connectivity_restored();
                }
            }
        })
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field(
                "scan_skipped_offline",
                &self.scan_skipped_offline.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}
