//! Bounded drop-oldest buffer.
//!
//! Decouples a producing stage from a consuming stage that runs at a different
//! instantaneous rate. Memory and latency stay bounded because a full buffer
//! makes room by evicting its oldest element: the buffer always holds the most
//! recent `capacity` items, preferring freshness over completeness.
//!
//! Standard bounded channels block or fail the sender when full, so the
//! eviction policy is built by hand: a `VecDeque` behind a mutex plus a
//! [`Notify`] to wake a suspended [`get`](DropOldestBuffer::get).
//!
//! ```rust
//! use framecast::buffer::DropOldestBuffer;
//!
//! let buffer = DropOldestBuffer::new(3).unwrap();
//! for i in 0..5 {
//!     buffer.put(i);
//! }
//! assert_eq!(buffer.drain(), vec![2, 3, 4]);
//! assert_eq!(buffer.dropped(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::types::Frame;
use crate::{Result, StreamError};

/// Drop-oldest buffer of compressed frames
pub type FrameBuffer = DropOldestBuffer<Frame>;

/// Why [`DropOldestBuffer::get`] returned without an element
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Nothing arrived before the timeout; the caller should simply retry.
    #[error("no element arrived before the timeout")]
    Empty,
    /// The buffer was closed and has been drained.
    #[error("buffer closed")]
    Closed,
}

/// What happened to an element handed to [`DropOldestBuffer::put`]
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome<T> {
    /// Stored without evicting anything
    Stored,
    /// Stored after evicting the returned oldest element
    Evicted(T),
    /// The buffer is closed; the element is handed back
    Rejected(T),
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity FIFO that evicts its oldest element when full.
///
/// `put` never blocks and never fails. `get` suspends until an element
/// arrives, the timeout elapses, or the buffer is closed and drained.
#[derive(Debug)]
pub struct DropOldestBuffer<T> {
    inner: Mutex<Inner<T>>,
    available: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> DropOldestBuffer<T> {
    /// Create a buffer holding at most `capacity` elements
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StreamError::config("buffer_capacity", "must be at least 1"));
        }
        Ok(Self {
            inner: Mutex::new(Inner { items: VecDeque::with_capacity(capacity), closed: false }),
            available: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
        })
    }

    // Every critical section leaves the deque valid, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an element, evicting the oldest one first if the buffer is full.
    pub fn put(&self, item: T) -> PutOutcome<T> {
        let outcome = {
            let mut inner = self.lock();
            if inner.closed {
                return PutOutcome::Rejected(item);
            }
            let evicted =
                if inner.items.len() >= self.capacity { inner.items.pop_front() } else { None };
            inner.items.push_back(item);
            match evicted {
                Some(old) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    PutOutcome::Evicted(old)
                }
                None => PutOutcome::Stored,
            }
        };
        self.available.notify_one();
        outcome
    }

    /// Remove the oldest element, waiting up to `timeout` for one to arrive.
    pub async fn get(&self, timeout: Duration) -> Result<T, BufferError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a put between check and await is not missed.
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if let Some(item) = inner.items.pop_front() {
                    return Ok(item);
                }
                if inner.closed {
                    return Err(BufferError::Closed);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(BufferError::Empty);
            }
        }
    }

    /// Remove the oldest element without waiting
    pub fn try_get(&self) -> Result<T, BufferError> {
        let mut inner = self.lock();
        match inner.items.pop_front() {
            Some(item) => Ok(item),
            None if inner.closed => Err(BufferError::Closed),
            None => Err(BufferError::Empty),
        }
    }

    /// Remove and return everything currently buffered, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.lock().items.drain(..).collect()
    }

    /// Close the buffer.
    ///
    /// Later `put`s are rejected. Waiting and future `get`s return the
    /// remaining elements and then [`BufferError::Closed`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current occupancy. Advisory only; may be stale as soon as it returns.
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total elements evicted to make room since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
