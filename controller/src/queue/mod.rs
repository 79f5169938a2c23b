/*!

An in-memory work queue with delayed and rate-limited adds.

Items with the same key are never handed out concurrently: while one is being processed, later
items for that key stay queued until `done` is called. Equal items that are already waiting are
not queued twice.

!*/

mod rate_limiter;

pub(crate) use rate_limiter::{default_rate_limiter, RateLimiter};

use log::trace;
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Something that can be put on a `WorkQueue`.
pub(crate) trait QueueItem: Clone + Debug + Eq + Hash + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Send + Sync + 'static;

    /// Items sharing a key are processed one at a time.
    fn key(&self) -> &Self::Key;
}

pub(crate) struct WorkQueue<T: QueueItem> {
    inner: Arc<Inner<T>>,
}

impl<T: QueueItem> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: QueueItem> {
    state: Mutex<State<T>>,
    notify: Notify,
    limiter: Box<dyn RateLimiter<T>>,
}

struct State<T: QueueItem> {
    queue: VecDeque<T>,
    processing: HashSet<T::Key>,
    shutting_down: bool,
}

impl<T: QueueItem> WorkQueue<T> {
    pub(crate) fn new<L>(limiter: L) -> Self
    where
        L: RateLimiter<T> + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                limiter: Box::new(limiter),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `item` unless an equal item is already waiting.
    pub(crate) fn add(&self, item: T) {
        {
            let mut state = self.state();
            if state.shutting_down || state.queue.contains(&item) {
                return;
            }
            trace!("queueing {:?}", item);
            state.queue.push_back(item);
        }
        self.inner.notify.notify_waiters();
    }

    /// Queues `item` once `delay` has passed.
    pub(crate) fn add_after(&self, item: T, delay: Duration) {
        if delay.is_zero() {
            self.add(item);
            return;
        }
        trace!("queueing {:?} in {:?}", item, delay);
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Queues `item` after the delay the rate limiter assigns to it.
    pub(crate) fn add_rate_limited(&self, item: T) {
        let delay = self.inner.limiter.when(&item);
        self.add_after(item, delay);
    }

    /// Stops tracking retries of `item`.
    pub(crate) fn forget(&self, item: &T) {
        self.inner.limiter.forget(item);
    }

    pub(crate) fn num_requeues(&self, item: &T) -> u32 {
        self.inner.limiter.num_requeues(item)
    }

    /// Waits for the next item whose key is not being processed. Returns `None` once the queue
    /// is shut down.
    pub(crate) async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before looking so that an add between the check and the await is seen.
            notified.as_mut().enable();
            {
                let mut guard = self.state();
                let state = &mut *guard;
                if state.shutting_down {
                    return None;
                }
                let position = state
                    .queue
                    .iter()
                    .position(|item| !state.processing.contains(item.key()));
                if let Some(item) = position.and_then(|i| state.queue.remove(i)) {
                    state.processing.insert(item.key().clone());
                    return Some(item);
                }
            }
            notified.await;
        }
    }

    /// Marks the key of `item` as no longer being processed.
    pub(crate) fn done(&self, item: &T) {
        self.state().processing.remove(item.key());
        self.inner.notify.notify_waiters();
    }

    /// Drops waiting items and wakes every `get`. Adds after this are ignored.
    pub(crate) fn shut_down(&self) {
        {
            let mut state = self.state();
            state.shutting_down = true;
            state.queue.clear();
        }
        self.inner.notify.notify_waiters();
    }

    #[cfg(test)]
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state().queue.len()
    }
}
