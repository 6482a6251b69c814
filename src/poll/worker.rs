use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::poll::{PollContext, WorkQueue};

/// Fixed-size pool of worker tasks draining the [`WorkQueue`].
///
/// Workers loop dequeue, run, repeat. A task failure is invisible here
/// (tasks log and flag their own errors); a task *panic* is caught and
/// logged so a single bad source can never take a worker down with it.
/// [`shutdown`](WorkerPool::shutdown) closes the queue; workers finish
/// what they hold, drain the backlog, and exit. The pool never blocks
/// host shutdown: tokio tasks die with the runtime regardless.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `settings.worker_count` workers against the context's
    /// queue. Must be called within a tokio runtime.
    pub fn spawn(ctx: &Arc<PollContext>) -> Self {
        let count = ctx.settings.worker_count.max(1);
        let handles = (0..count)
            .map(|id| {
                let ctx = Arc::clone(ctx);
                tokio::spawn(worker_loop(id, ctx))
            })
            .collect();
        tracing::debug!(workers = count, "Worker pool started");
        Self {
            queue: ctx.queue(),
            handles,
        }
    }

    /// Stops scheduling: the queue rejects new work and workers exit
    /// once the backlog drains.
    pub fn shutdown(&self) {
        self.queue.close();
    }

    /// Shuts down and waits for all workers to finish.
    pub async fn join(self) {
        self.queue.close();
        for handle in self.handles {
            if let Err(e) = handle.await {
                // Worker bodies catch task panics; this only fires on
                // runtime-level cancellation.
                tracing::warn!(error = %e, "Worker join failed");
            }
        }
    }
}

async fn worker_loop(id: usize, ctx: Arc<PollContext>) {
    while let Some(task) = ctx.queue().dequeue().await {
        let label = task.label();
        tracing::trace!(worker = id, task = %label, "Task started");
        if let Err(panic) = AssertUnwindSafe(task.run(&ctx)).catch_unwind().await {
            tracing::error!(
                worker = id,
                task = %label,
                panic = %panic_message(&panic),
                "Task panicked"
            );
        }
    }
    tracing::debug!(worker = id, "Worker exiting");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
