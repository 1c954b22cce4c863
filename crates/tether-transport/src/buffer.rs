//! Pooled, reference-counted message buffers.
//!
//! Every message that crosses the dispatcher lives in a [`MessageBuffer`].
//! Buffers are rented from a [`BufferPool`] so the per-frame send/receive
//! path reuses allocations instead of churning through the allocator.
//!
//! # Reference counting
//!
//! A rented buffer starts with a count of 1 (the renter's own reference).
//! [`MessageBuffer::acquire`] hands out another reference to the same bytes
//! and [`MessageBuffer::release`] gives one back. When the last reference is
//! released the backing `Vec<u8>` is cleared and returned to its pool.
//!
//! The count is carried by an [`Arc`], so "use after release" cannot be
//! expressed: a released handle is moved away. The bytes can only be
//! written while exactly one reference exists ([`MessageBuffer::bytes_mut`]).
//!
//! ```text
//! rent(n) ──→ [count 1] ──acquire──→ [count 2] ──release──→ [count 1]
//!                                                                │
//!                                                release ────────┘
//!                                                   │
//!                                                   ▼
//!                                      cleared, back in the pool
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Default cap on the number of idle buffers a pool keeps around.
pub const DEFAULT_RETAINED_BUFFERS: usize = 256;

/// Default capacity reserved for a freshly allocated buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

struct PoolShared {
    free: Mutex<Vec<Vec<u8>>>,
    retained: usize,
    capacity_hint: usize,
    allocations: AtomicUsize,
}

impl PoolShared {
    fn take(&self, len: usize) -> Vec<u8> {
        let recycled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        match recycled {
            Some(mut bytes) => {
                bytes.reserve(len);
                bytes
            }
            None => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(len.max(self.capacity_hint))
            }
        }
    }

    fn give_back(&self, mut bytes: Vec<u8>) {
        bytes.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.retained {
            free.push(bytes);
        }
    }
}

/// A pool of reusable byte buffers.
///
/// Cheap to clone; clones share the same free list. Buffers keep only a
/// weak link back to the pool, so dropping the pool while buffers are still
/// in flight is fine: those buffers are simply freed instead of recycled.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Creates a pool that keeps at most `retained` idle buffers and
    /// reserves `capacity_hint` bytes for each new allocation.
    pub fn new(retained: usize, capacity_hint: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                free: Mutex::new(Vec::new()),
                retained,
                capacity_hint,
                allocations: AtomicUsize::new(0),
            }),
        }
    }

    /// Rents a zero-filled buffer of logical length `len`.
    ///
    /// Reuses an idle buffer when one is available, allocating otherwise.
    /// The returned buffer has a reference count of 1.
    pub fn rent(&self, len: usize) -> MessageBuffer {
        let mut bytes = self.shared.take(len);
        bytes.resize(len, 0);
        MessageBuffer {
            inner: Arc::new(Inner {
                bytes,
                pool: Arc::downgrade(&self.shared),
            }),
        }
    }

    /// Rents a buffer and fills it with a copy of `data`.
    pub fn rent_copy(&self, data: &[u8]) -> MessageBuffer {
        let mut bytes = self.shared.take(data.len());
        bytes.extend_from_slice(data);
        MessageBuffer {
            inner: Arc::new(Inner {
                bytes,
                pool: Arc::downgrade(&self.shared),
            }),
        }
    }

    /// Number of idle buffers waiting to be reused.
    pub fn available(&self) -> usize {
        self.shared
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of fresh allocations this pool has made.
    pub fn allocations(&self) -> usize {
        self.shared.allocations.load(Ordering::Relaxed)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_BUFFERS, DEFAULT_BUFFER_CAPACITY)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("allocations", &self.allocations())
            .field("retained", &self.shared.retained)
            .finish()
    }
}

struct Inner {
    bytes: Vec<u8>,
    pool: Weak<PoolShared>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.give_back(std::mem::take(&mut self.bytes));
        }
    }
}

/// A reference-counted handle to a (usually pooled) byte buffer.
pub struct MessageBuffer {
    inner: Arc<Inner>,
}

impl MessageBuffer {
    /// Wraps bytes that did not come from a pool. They are freed, not
    /// recycled, when the last reference is released.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bytes,
                pool: Weak::new(),
            }),
        }
    }

    /// Takes another reference to the same bytes.
    pub fn acquire(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Gives this reference back. The bytes return to the pool once every
    /// reference has been released.
    pub fn release(self) {
        drop(self);
    }

    /// Current number of live references to these bytes.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// The logical contents of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner.bytes
    }

    /// Mutable access to the contents, only while this is the sole reference.
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.inner).map(|inner| inner.bytes.as_mut_slice())
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }
}

impl AsRef<[u8]> for MessageBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("len", &self.len())
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_starts_with_single_reference() {
        let pool = BufferPool::default();
        let buf = pool.rent(12);
        assert_eq!(buf.ref_count(), 1);
        assert_eq!(buf.len(), 12);
        assert!(buf.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_acquire_and_release_track_count() {
        let pool = BufferPool::default();
        let buf = pool.rent(4);
        let second = buf.acquire();
        assert_eq!(buf.ref_count(), 2);
        second.release();
        assert_eq!(buf.ref_count(), 1);
    }

    #[test]
    fn test_last_release_returns_buffer_to_pool() {
        let pool = BufferPool::default();
        let buf = pool.rent(8);
        let other = buf.acquire();
        buf.release();
        assert_eq!(pool.available(), 0, "still referenced");
        other.release();
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_recycled_buffer_is_reused_and_zeroed() {
        let pool = BufferPool::default();
        let mut buf = pool.rent(3);
        buf.bytes_mut().unwrap().copy_from_slice(&[7, 8, 9]);
        buf.release();

        let again = pool.rent(5);
        assert_eq!(pool.allocations(), 1, "second rent reuses the first allocation");
        assert_eq!(again.as_slice(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_bytes_mut_refused_while_shared() {
        let pool = BufferPool::default();
        let mut buf = pool.rent(2);
        let shared = buf.acquire();
        assert!(buf.bytes_mut().is_none());
        drop(shared);
        assert!(buf.bytes_mut().is_some());
    }

    #[test]
    fn test_pool_respects_retention_cap() {
        let pool = BufferPool::new(1, 16);
        let a = pool.rent(1);
        let b = pool.rent(1);
        a.release();
        b.release();
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.allocations(), 2);
    }

    #[test]
    fn test_buffer_outlives_pool() {
        let pool = BufferPool::default();
        let buf = pool.rent_copy(b"late");
        drop(pool);
        assert_eq!(buf.as_slice(), b"late");
        buf.release();
    }

    #[test]
    fn test_from_vec_is_not_recycled() {
        let pool = BufferPool::default();
        let buf = MessageBuffer::from_vec(vec![1, 2, 3]);
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        buf.release();
        assert_eq!(pool.available(), 0);
    }
}
