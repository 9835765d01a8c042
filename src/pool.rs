//! Reusable receive buffers for UDP datagrams.
//!
//! Each datagram is read into a fixed-size buffer taken from a shared pool,
//! forwarded upstream, and the same buffer is reused to hold the response
//! bytes before they go back out on the socket. Buffers return to the pool
//! when the guard is dropped, so a buffer is released exactly once no
//! matter which path the forwarder takes.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

/// Fixed buffer size. Large enough for a classic (non-EDNS) DNS message;
/// responses beyond this are truncated by the relay, not reassembled.
pub const DNS_BUFFER_SIZE: usize = 1024;

/// Default number of buffers retained for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Lock-free pool of fixed-size byte buffers.
///
/// `acquire` never blocks and never fails: an empty pool just allocates a
/// fresh buffer. Returned buffers are not zeroed; callers must only trust
/// the bytes they wrote or read themselves.
pub struct BufferPool {
    buffers: ArrayQueue<Vec<u8>>,
    buffer_size: usize,
}

impl BufferPool {
    /// Create a pool that retains up to `capacity` buffers of `buffer_size`
    /// bytes each.
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            buffers: ArrayQueue::new(capacity),
            buffer_size,
        }
    }

    /// Create a pool with the standard DNS buffer size.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY, DNS_BUFFER_SIZE)
    }

    /// Take a buffer from the pool, allocating if none is available.
    ///
    /// The buffer's length always equals `buffer_size`; recycled contents
    /// are left as-is.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let buffer = self
            .buffers
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size]);

        PooledBuffer {
            buffer: Some(buffer),
            pool: Arc::clone(self),
        }
    }

    /// Size of each buffer handed out by this pool.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers currently available for reuse.
    pub fn available(&self) -> usize {
        self.buffers.len()
    }

    fn release(&self, buffer: Vec<u8>) {
        // If the queue is full the buffer is simply dropped.
        let _ = self.buffers.push(buffer);
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Owning the guard is owning the buffer: the receive loop moves it into
/// the forwarder task at dispatch, and the drop at the end of that task is
/// the single release back to the pool.
pub struct PooledBuffer {
    buffer: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
