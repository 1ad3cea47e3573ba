// FIFO work queue shared between the stream callback and the workers.
//
// Push never blocks: the stream callback runs on the network I/O path. An
// optional capacity bounds memory; what happens at the bound is the queue's
// overflow policy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use megatick_common::OverflowPolicy;
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Accepted after evicting the oldest queued item.
    DroppedOldest,
    /// Refused; the queue is full.
    Rejected,
}

pub struct WorkQueue<T> {
    name: &'static str,
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: Option<usize>,
    policy: OverflowPolicy,
    dropped: AtomicU64,
    high_water: AtomicUsize,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> WorkQueue<T> {
    pub fn unbounded(name: &'static str) -> Self {
        Self::new(name, None, OverflowPolicy::default())
    }

    pub fn new(name: &'static str, capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        Self {
            name,
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue without waiting.
    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            let full = self.capacity.is_some_and(|cap| state.items.len() >= cap);
            let outcome = match (full, self.policy) {
                (false, _) => PushOutcome::Queued,
                (true, OverflowPolicy::Reject) => PushOutcome::Rejected,
                (true, OverflowPolicy::DropOldest) => {
                    state.items.pop_front();
                    PushOutcome::DroppedOldest
                }
            };
            if outcome != PushOutcome::Rejected {
                state.items.push_back(item);
                self.high_water.fetch_max(state.items.len(), Ordering::Relaxed);
            }
            outcome
        };

        match outcome {
            PushOutcome::Queued => self.notify.notify_one(),
            PushOutcome::DroppedOldest => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(queue = self.name, "Queue full, dropped oldest item");
                self.notify.notify_one();
            }
            PushOutcome::Rejected => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(queue = self.name, "Queue full, rejected item");
            }
        }
        outcome
    }

    /// Wait for the next item. Returns None once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Consumers exit once the queue is drained. Producers may still push
    /// until then; workers that feed their own queue rely on this.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items evicted or refused at the bound.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Largest length observed.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fifo_order() {
        let q = WorkQueue::unbounded("test");
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.len(), 1);
        assert_eq!(q.high_water(), 3);
    }

    #[test]
    fn drop_oldest_keeps_newest() {
        let q = WorkQueue::new("test", Some(2), OverflowPolicy::DropOldest);
        assert_eq!(q.push(1), PushOutcome::Queued);
        assert_eq!(q.push(2), PushOutcome::Queued);
        assert_eq!(q.push(3), PushOutcome::DroppedOldest);
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.dropped(), 1);
    }

    #[test]
    fn reject_refuses_new() {
        let q = WorkQueue::new("test", Some(1), OverflowPolicy::Reject);
        assert_eq!(q.push("a"), PushOutcome::Queued);
        assert_eq!(q.push("b"), PushOutcome::Rejected);
        assert_eq!(q.try_pop(), Some("a"));
        assert_eq!(q.try_pop(), None);
        assert_eq!(q.dropped(), 1);
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let q = Arc::new(WorkQueue::unbounded("test"));
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push(42);
        assert_eq!(consumer.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let q = Arc::new(WorkQueue::unbounded("test"));
        q.push(1);
        q.close();
        assert_eq!(q.pop().await, Some(1));
        assert_eq!(q.pop().await, None);

        let idle = Arc::new(WorkQueue::<u8>::unbounded("idle"));
        let waiter = {
            let idle = idle.clone();
            tokio::spawn(async move { idle.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        idle.close();
        assert_eq!(waiter.await.unwrap(), None);
    }
}
