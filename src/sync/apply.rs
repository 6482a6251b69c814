use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::tree::{Feed, ReadingList};

/// The external collaborator that owns structural tree mutation.
///
/// Invoked only on the applier actor, so implementations never see two
/// deltas at once and need no internal locking.
pub trait TreeMutator: Send + Sync {
    fn apply_reading_list_delta(
        &self,
        list: &ReadingList,
        to_add: &[Arc<Feed>],
        to_remove: &[Arc<Feed>],
    );
}

/// Default mutator: edits the reading list's membership in place.
#[derive(Debug, Default)]
pub struct MembershipMutator;

impl TreeMutator for MembershipMutator {
    fn apply_reading_list_delta(
        &self,
        list: &ReadingList,
        to_add: &[Arc<Feed>],
        to_remove: &[Arc<Feed>],
    ) {
        list.apply_delta(to_add, to_remove);
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The applier actor has stopped (its channel is closed).
    #[error("delta applier is not running")]
    Closed,
}

struct ApplyRequest {
    list: Arc<ReadingList>,
    to_add: Vec<Arc<Feed>>,
    to_remove: Vec<Arc<Feed>>,
    done: oneshot::Sender<()>,
}

/// Single coordinating actor through which all reading-list deltas are
/// applied.
///
/// Concurrent `ReadingListUpdateTask`s may finish reconciliation at the
/// same time; their deltas are funneled through one actor task so tree
/// mutation is never concurrent with itself. Callers block on a reply
/// channel, preserving synchronous-apply semantics: when
/// [`apply`](DeltaApplier::apply) returns, the mutation is visible.
#[derive(Debug, Clone)]
pub struct DeltaApplier {
    tx: mpsc::Sender<ApplyRequest>,
}

impl DeltaApplier {
    /// Spawns the applier actor. Must be called within a tokio runtime.
    pub fn spawn(mutator: Arc<dyn TreeMutator>) -> Self {
        let (tx, mut rx) = mpsc::channel::<ApplyRequest>(32);

        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                tracing::debug!(
                    list = %req.list.url(),
                    added = req.to_add.len(),
                    removed = req.to_remove.len(),
                    "Applying reading-list delta"
                );
                mutator.apply_reading_list_delta(&req.list, &req.to_add, &req.to_remove);
                // Caller may have given up waiting; that's fine
                let _ = req.done.send(());
            }
            tracing::debug!("Delta applier stopped");
        });

        Self { tx }
    }

    /// Submits a delta and waits until it has been applied.
    pub async fn apply(
        &self,
        list: Arc<ReadingList>,
        to_add: Vec<Arc<Feed>>,
        to_remove: Vec<Arc<Feed>>,
    ) -> Result<(), ApplyError> {
        let (done, applied) = oneshot::channel();
        self.tx
            .send(ApplyRequest {
                list,
                to_add,
                to_remove,
                done,
            })
            .await
            .map_err(|_| ApplyError::Closed)?;
        applied.await.map_err(|_| ApplyError::Closed)
    }
}
