//! Bounded-concurrency polling scheduler for feeds and reading lists.
//!
//! `freshet` periodically refreshes a set of remotely-sourced feeds and
//! OPML reading lists on behalf of a host application. The host supplies
//! the guide tree and the collaborator implementations; the scheduler
//! decides *which* sources need refreshing, dispatches bounded concurrent
//! work, and reconciles reading-list membership changes against
//! redirect-induced URL changes.
//!
//! # Architecture
//!
//! - [`poll`] - The scheduler core: [`Poller`], the priority [`WorkQueue`],
//!   the [`WorkerPool`], and the task bodies
//! - [`tree`] - The polled data model: [`Feed`], [`ReadingList`],
//!   [`Guide`], [`GuideTree`]
//! - [`sync`] - Reading-list synchronization: the [`ListImporter`] seam
//!   and its OPML-backed implementation, the [`RedirectResolver`], and
//!   the [`DeltaApplier`] actor that serializes tree mutation
//! - [`connection`] - Process-wide online/offline state
//! - [`settings`] - TOML-backed configuration
//!
//! # Example
//!
//! ```ignore
//! use freshet::{PollContext, Poller, Settings, WorkerPool};
//! use std::sync::Arc;
//!
//! let ctx = Arc::new(PollContext::new(
//!     Settings::default(),
//!     refresher,
//!     importer,
//!     mutator,
//! )?);
//! let poller = Poller::new(ctx.clone());
//! let pool = WorkerPool::spawn(&ctx);
//!
//! poller.set_source(tree);
//! poller.scan_all(false);
//! ```

pub mod activity;
pub mod connection;
pub mod poll;
pub mod settings;
pub mod sync;
pub mod tree;
pub mod util;

pub use activity::{ActivityMonitor, ActivityToken, LogActivityMonitor, NullActivityMonitor};
pub use connection::ConnectionState;
pub use poll::{PollContext, Poller, Task, WorkQueue, WorkerPool};
pub use settings::{Settings, SettingsError};
pub use sync::{
    DeltaApplier, HttpListImporter, ImportError, ListDocument, ListEntry, ListImporter,
    MembershipMutator, RedirectResolver, ResolveError, TreeMutator,
};
pub use tree::{Feed, FeedId, FeedRefresher, Guide, GuideTree, ReadingList, RefreshError};
