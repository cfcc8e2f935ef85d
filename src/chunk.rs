//! A fixed-capacity byte buffer with independent read and write cursors.

use memchr::memchr;

/// A single fixed-capacity buffer owned by exactly one [`crate::Pipe`] (or
/// the [`crate::Pool`] free list) at a time.
///
/// `start..end` is the readable window; `end..cap` is the writable
/// suffix. `cap` never changes after construction: a chunk is never
/// reallocated, only recycled via [`Chunk::reset`].
#[derive(Debug)]
pub(crate) struct Chunk {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl Chunk {
    /// Allocates a new zeroed chunk of exactly `cap` bytes.
    pub(crate) fn new(cap: usize) -> Self {
        Chunk {
            buf: vec![0u8; cap].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    #[inline]
    pub(crate) fn cap(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn length(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub(crate) fn free(&self) -> usize {
        self.buf.len() - self.end
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// The writable suffix `[end, cap)`.
    #[inline]
    pub(crate) fn writable(&mut self) -> &mut [u8] {
        &mut self.buf[self.end..]
    }

    /// Commits `n` previously-written bytes, advancing the write head.
    ///
    /// # Panics
    /// Panics if `n` exceeds [`Chunk::free`].
    pub(crate) fn written(&mut self, n: usize) {
        assert!(n <= self.free(), "written() past chunk capacity");
        self.end += n;
    }

    /// The readable window, clipped to at most `n` bytes when given.
    #[inline]
    pub(crate) fn readable(&self, n: Option<usize>) -> &[u8] {
        let end = match n {
            None => self.end,
            Some(n) => std::cmp::min(self.start + n, self.end),
        };
        &self.buf[self.start..end]
    }

    /// Advances the read head, discarding `n` bytes from the front.
    ///
    /// # Panics
    /// Panics if `n` exceeds [`Chunk::length`].
    pub(crate) fn consume(&mut self, n: usize) {
        assert!(n <= self.length(), "consume() past write head");
        self.start += n;
    }

    /// Finds `byte` within the readable window, at an offset relative to
    /// `start`. `end_off` is relative to `start` too and clips the
    /// search range to `[start_off, end_off)`; `None` means "to the
    /// write head".
    pub(crate) fn find(&self, byte: u8, start_off: usize, end_off: Option<usize>) -> Option<usize> {
        let window_len = self.length();
        if start_off >= window_len {
            return None;
        }
        let end_off = match end_off {
            Some(e) => std::cmp::min(e, window_len),
            None => window_len,
        };
        if start_off >= end_off {
            return None;
        }
        let base = self.start + start_off;
        let hay = &self.buf[base..self.start + end_off];
        memchr(byte, hay).map(|i| i + start_off)
    }

    /// Restores the chunk to empty, ready for reuse from the pool.
    pub(crate) fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}
