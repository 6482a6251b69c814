//! The polled data model: feeds, reading lists, and the guide tree.
//!
//! A [`GuideTree`] is an immutable snapshot of [`Guide`]s handed to the
//! scheduler by the host. Guides are structural groupings only; they
//! are never polled themselves. [`Feed`]s and [`ReadingList`]s carry
//! the mutable per-source state (poll timestamps, lifecycle flags)
//! behind atomics and mutexes, so a snapshot swap never invalidates
//! in-flight work holding `Arc` references into the old tree.

mod feed;
mod list;

pub use feed::{Feed, FeedId, FeedRefresher, RefreshError};
pub use list::ReadingList;

use std::sync::Arc;

/// A named container of feeds and reading lists.
///
/// Purely structural: the scheduler walks guides to find pollable
/// sources but never polls a guide itself.
#[derive(Debug, Clone, Default)]
pub struct Guide {
    pub name: String,
    pub feeds: Vec<Arc<Feed>>,
    pub lists: Vec<Arc<ReadingList>>,
}

impl Guide {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feeds: Vec::new(),
            lists: Vec::new(),
        }
    }

    pub fn with_feed(mut self, feed: Arc<Feed>) -> Self {
        self.feeds.push(feed);
        self
    }

    pub fn with_list(mut self, list: Arc<ReadingList>) -> Self {
        self.lists.push(list);
        self
    }
}

/// Immutable snapshot of the guide tree.
///
/// Replaced wholesale by `Poller::set_source`. Tasks that captured
/// feeds from an older snapshot check membership against the current
/// one before doing work, so a detached feed is skipped silently.
#[derive(Debug, Clone, Default)]
pub struct GuideTree {
    guides: Vec<Arc<Guide>>,
}

impl GuideTree {
    pub fn new(guides: Vec<Arc<Guide>>) -> Self {
        Self { guides }
    }

    pub fn guides(&self) -> &[Arc<Guide>] {
        &self.guides
    }

    /// Whether a feed with the given identity is still reachable in
    /// this snapshot, either directly under a guide or as a
    /// reading-list member.
    pub fn contains_feed(&self, id: FeedId) -> bool {
        self.guides.iter().any(|guide| {
            guide.feeds.iter().any(|f| f.id() == id)
                || guide
                    .lists
                    .iter()
                    .any(|list| list.members().iter().any(|f| f.id() == id))
        })
    }
}
