use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::poll::Task;

/// Bounded, two-class priority queue of scheduler tasks.
///
/// Reading-list tasks are dequeued strictly before feed tasks; ties
/// break FIFO within each class. Implemented as two queues with a
/// preference rather than a comparator: the ordering contract is two
/// classes, nothing finer.
///
/// The capacity is shared across both classes. [`try_enqueue`]
/// (WorkQueue::try_enqueue) never blocks the producer: on overflow the
/// task is discarded and `false` returned. Dropped work is picked up
/// again on the next scan because eligibility is re-evaluated from
/// source state, not from queue membership.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
    capacity: usize,
}

#[derive(Debug)]
struct State {
    lists: VecDeque<Task>,
    feeds: VecDeque<Task>,
    closed: bool,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                lists: VecDeque::new(),
                feeds: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Number of queued tasks across both classes.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.lists.len() + state.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking enqueue. Returns `false` when the queue is full or
    /// closed; the task is dropped in that case.
    pub fn try_enqueue(&self, task: Task) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return false;
            }
            if state.lists.len() + state.feeds.len() >= self.capacity {
                return false;
            }
            if task.is_list_task() {
                state.lists.push_back(task);
            } else {
                state.feeds.push_back(task);
            }
        }
        self.notify.notify_one();
        true
    }

    /// Awaits the next task, preferring the reading-list class.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<Task> {
        loop {
            // Register interest before checking state, so an enqueue
            // between the check and the await still wakes us.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().unwrap();
                let task = state
                    .lists
                    .pop_front()
                    .or_else(|| state.feeds.pop_front());
                if let Some(task) = task {
                    // Hand the wakeup on: Notify holds at most one
                    // permit, so a burst of enqueues can under-wake a
                    // pool of idle workers without this.
                    if !state.lists.is_empty() || !state.feeds.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Closes the queue: rejects further enqueues and lets consumers
    /// drain what remains, then observe `None`.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }
}
