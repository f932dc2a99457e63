//! Object pooling for reusable hot path buffers
//!
//! Pre-allocated buffers shared between threads.
//! Uses crossbeam-queue for lock-free acquire/release.

use crate::core::key::KeyBuffer;
use crossbeam_queue::ArrayQueue;

/// Generic object pool for pre-allocated buffers
///
/// # Type Parameters
/// - `T`: The type of object to pool. Must be Send for thread safety.
///
/// # Example
/// ```
/// use rust_qd::infrastructure::pool::ObjectPool;
///
/// let pool = ObjectPool::with_capacity(16, || vec![0u16; 64]);
///
/// // Acquire from pool (no allocation)
/// let mut buf = pool.acquire().unwrap();
/// buf.fill(42);
///
/// // Release back to pool (no drop)
/// pool.release(buf).unwrap();
/// ```
pub struct ObjectPool<T: Send> {
    stack: ArrayQueue<T>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Send> ObjectPool<T> {
    /// Create a new pool with pre-allocated objects
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of objects in the pool
    /// * `factory` - Function to create new objects when pool is empty
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let stack = ArrayQueue::new(capacity);

        for _ in 0..capacity {
            if stack.push(factory()).is_err() {
                break; // Queue is full
            }
        }

        Self {
            stack,
            factory: Box::new(factory),
        }
    }

    /// Acquire an object from the pool
    ///
    /// Returns `None` when the pool is empty.
    #[inline(always)]
    pub fn acquire(&self) -> Option<T> {
        self.stack.pop()
    }

    /// Acquire from the pool, or build a fresh object when it is drained
    #[inline]
    pub fn acquire_or_create(&self) -> T {
        self.stack.pop().unwrap_or_else(|| (self.factory)())
    }

    /// Release an object back to the pool
    ///
    /// Returns the object back as `Err` when the pool is full.
    #[inline(always)]
    pub fn release(&self, obj: T) -> Result<(), T> {
        self.stack.push(obj)
    }

    /// Get the number of available objects in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }
}

/// Pool of embedded-key buffers for symbol lookups
pub type KeyBufferPool = ObjectPool<KeyBuffer>;

impl KeyBufferPool {
    /// Create a pool of key buffers sized for `content_capacity` code units
    pub fn with_key_capacity(pool_capacity: usize, content_capacity: usize) -> Self {
        Self::with_capacity(pool_capacity, move || {
            KeyBuffer::with_capacity(content_capacity)
        })
    }

    /// Run `f` with a pooled buffer holding the embedded key for `symbol`
    ///
    /// The buffer goes back to the pool afterwards; when the pool is full it
    /// is dropped.
    pub fn with_key<R>(&self, symbol: &str, f: impl FnOnce(&[u16]) -> R) -> R {
        let mut buf = self.acquire_or_create();
        let result = f(buf.embed_str(symbol));
        let _ = self.release(buf);
        result
    }
}
