//! Size-classed recycling of [`Chunk`] buffers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::chunk::Chunk;

/// A free list of [`Chunk`]s, keyed by size class (always a power of two).
///
/// `get_chunk` rounds the requested size up to the next power of two and
/// either pops a recycled chunk of that exact class or allocates a new
/// one. Chunks of different classes never mix: a recycled chunk always
/// keeps the capacity it was first allocated with.
///
/// A `Pool` is single-threaded, like the [`crate::Pipe`]s it serves (see
/// spec.md §5); share one across pipes with [`SharedPool`], not across
/// threads.
#[derive(Debug, Default)]
pub struct Pool {
    free: HashMap<usize, Vec<Chunk>>,
}

/// A `Pool` shared (without synchronization) among the pipes that draw
/// chunks from it. Construct with `SharedPool::new(Pool::new())`, or use
/// [`default_pool`] for the process-wide convenience pool.
pub type SharedPool = Rc<RefCell<Pool>>;

impl Pool {
    /// Creates an empty pool with no chunks in its free lists yet.
    pub fn new() -> Self {
        Pool::default()
    }

    /// Wraps this pool for sharing among multiple [`crate::Pipe`]s.
    pub fn into_shared(self) -> SharedPool {
        Rc::new(RefCell::new(self))
    }

    /// Returns a chunk of capacity `next_pow2(size)`, reusing a freed one
    /// of the same class when available (LIFO, for cache locality).
    pub(crate) fn get_chunk(&mut self, size: usize) -> Chunk {
        let cap = next_pow2(size);
        match self.free.get_mut(&cap).and_then(Vec::pop) {
            Some(mut chunk) => {
                chunk.reset();
                chunk
            }
            None => {
                tracing::trace!(cap, "pool: allocating new chunk");
                Chunk::new(cap)
            }
        }
    }

    /// Returns a chunk to its size class's free list for later reuse.
    pub(crate) fn return_chunk(&mut self, chunk: Chunk) {
        self.free.entry(chunk.cap()).or_default().push(chunk);
    }

    /// Number of chunks currently idle in the free lists, across all
    /// size classes. Exposed for tests and diagnostics, not part of the
    /// pool's functional contract.
    pub fn idle_len(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

/// Rounds `size` up to the next power of two; `0` and `1` both round to `1`.
fn next_pow2(size: usize) -> usize {
    if size <= 1 {
        1
    } else {
        1usize << (usize::BITS - (size - 1).leading_zeros())
    }
}

thread_local! {
    static DEFAULT_POOL: SharedPool = Pool::new().into_shared();
}

/// The process-wide (per-thread) default pool, used by [`crate::Pipe::new`]
/// when no explicit pool is supplied. Kept as an optional convenience,
/// not the only way to get a `Pool` — construct and share one explicitly
/// with [`Pool::new`]/[`Pool::into_shared`] to avoid the shared default
/// (see spec.md §9, "Global pool").
pub fn default_pool() -> SharedPool {
    DEFAULT_POOL.with(Rc::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_power_of_two() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(2), 2);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(1024), 1024);
        assert_eq!(next_pow2(1025), 2048);
    }

    #[test]
    fn get_chunk_rounds_and_starts_empty() {
        let mut pool = Pool::new();
        let chunk = pool.get_chunk(100);
        assert_eq!(chunk.cap(), 128);
        assert_eq!(chunk.length(), 0);
    }

    #[test]
    fn returned_chunk_is_recycled_within_its_class() {
        let mut pool = Pool::new();
        let mut chunk = pool.get_chunk(64);
        chunk.writable()[..4].copy_from_slice(b"data");
        chunk.written(4);
        pool.return_chunk(chunk);
        assert_eq!(pool.idle_len(), 1);

        let recycled = pool.get_chunk(64);
        assert_eq!(recycled.cap(), 64);
        assert_eq!(recycled.length(), 0, "recycled chunk must be reset");
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn size_classes_never_mix() {
        let mut pool = Pool::new();
        pool.return_chunk(Chunk::new(64));
        let chunk = pool.get_chunk(128);
        assert_eq!(chunk.cap(), 128);
        assert_eq!(pool.idle_len(), 1, "the 64-byte chunk must still be idle");
    }

    #[test]
    fn default_pool_is_shared_within_a_thread() {
        let a = default_pool();
        let b = default_pool();
        assert!(Rc::ptr_eq(&a, &b));
    }
}
