//! The scheduler core: work queue, worker pool, task bodies, and the
//! poller that decides what runs when.
//!
//! Control flow: a timer or manual trigger calls [`Poller::scan_all`];
//! the poller walks the guide tree, filters by eligibility, claims each
//! source atomically, and enqueues [`Task`]s into the [`WorkQueue`];
//! [`WorkerPool`] tasks dequeue and execute them. Reading-list tasks
//! sort strictly ahead of feed tasks: list membership changes are
//! cheap and unblock downstream feed work.

mod poller;
mod queue;
mod task;
mod worker;

pub use poller::{PollContext, Poller};
pub use queue::WorkQueue;
pub use task::Task;
pub use worker::WorkerPool;
