//! Bounded FIFO queue with per-call backpressure.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::HubError;

/// What a producer does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Wait for capacity with no bound.
    Block,
    /// Wait for capacity at most this long, then fail with `QueueFull`.
    BlockFor(Duration),
    /// Evict the oldest item and insert without waiting.
    DropOldest,
}

/// Capacity-bounded FIFO queue shared between workers.
pub struct BoundedQueue<T> {
    name: String,
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Create a queue. A capacity of zero is raised to one.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.lock().len() >= self.capacity
    }

    /// Insert without waiting, evicting the oldest item when full.
    ///
    /// Eviction and insertion happen under one lock acquisition. Returns the
    /// evicted item, if any.
    pub fn push_drop_oldest(&self, item: T) -> Option<T> {
        let evicted = {
            let mut items = self.items.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            evicted
        };
        self.not_empty.notify_one();
        evicted
    }

    /// Insert if there is room, handing the item back otherwise.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                return Err(item);
            }
            items.push_back(item);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Insert following the given backpressure policy.
    ///
    /// Returns the evicted item under `DropOldest`.
    pub async fn push(&self, item: T, policy: Backpressure) -> Result<Option<T>, HubError> {
        match policy {
            Backpressure::DropOldest => Ok(self.push_drop_oldest(item)),
            Backpressure::Block => {
                self.push_wait(item).await;
                Ok(None)
            }
            Backpressure::BlockFor(limit) => {
                match tokio::time::timeout(limit, self.push_wait(item)).await {
                    Ok(()) => Ok(None),
                    Err(_) => Err(HubError::QueueFull(self.name.clone())),
                }
            }
        }
    }

    /// Blocking insert bounded by `limit`.
    pub async fn push_timeout(&self, item: T, limit: Duration) -> Result<(), HubError> {
        self.push(item, Backpressure::BlockFor(limit)).await.map(|_| ())
    }

    async fn push_wait(&self, mut item: T) {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_push(item) {
                Ok(()) => return,
                Err(back) => item = back,
            }
            notified.await;
        }
    }

    /// Remove the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Remove the oldest item.
    ///
    /// `None` waits indefinitely, a zero duration never waits, any other
    /// duration bounds the wait. Returns `None` when the wait expires.
    pub async fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        match timeout {
            None => Some(self.pop_wait().await),
            Some(limit) if limit.is_zero() => self.try_pop(),
            Some(limit) => tokio::time::timeout(limit, self.pop_wait()).await.ok(),
        }
    }

    async fn pop_wait(&self) -> T {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Remove up to `max` items without waiting, oldest first.
    pub fn drain(&self, max: usize) -> Vec<T> {
        let drained: Vec<T> = {
            let mut items = self.items.lock();
            let n = max.min(items.len());
            items.drain(..n).collect()
        };
        for _ in 0..drained.len() {
            self.not_full.notify_one();
        }
        drained
    }

    /// Empty the queue and return only the newest item.
    pub fn get_latest(&self) -> Option<T> {
        let latest = {
            let mut items = self.items.lock();
            let latest = items.pop_back();
            items.clear();
            latest
        };
        if latest.is_some() {
            self.not_full.notify_waiters();
        }
        latest
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
