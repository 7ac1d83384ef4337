//! Reusable byte buffers for rendering.

use parking_lot::Mutex;

/// Buffers kept by [`BUF_POOL`].
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Process-wide pool used by the HTML, text and XML viewers.
pub static BUF_POOL: BufferPool = BufferPool::new(DEFAULT_POOL_SIZE);

/// A bounded free list of byte buffers.
///
/// [`get`](Self::get) hands out a pooled buffer when one is available and
/// allocates otherwise; [`put`](Self::put) clears the buffer and keeps it only
/// while the pool is below capacity, so the pool never grows without bound.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    pub const fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Returns an empty buffer, reusing a pooled allocation if there is one.
    pub fn get(&self) -> Vec<u8> {
        self.buffers.lock().pop().unwrap_or_default()
    }

    /// Returns a buffer to the pool, or drops it if the pool is full.
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.capacity {
            buffers.push(buf);
        }
    }

    /// Number of idle buffers.
    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
