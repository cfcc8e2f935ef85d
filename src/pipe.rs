//! The stateful byte queue at the center of this crate (spec.md §3, §4.3-§4.6).

use std::collections::VecDeque;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};

use crate::chunk::Chunk;
use crate::config::PipeConfig;
use crate::error::PipeError;
use crate::pool::{default_pool, SharedPool};
use crate::search;

/// The pipe's internal EOF state. Transitions only via [`Pipe::eof`] or
/// [`Pipe::close`], and only while `Open` (spec.md §4.6, invariant 5).
#[derive(Debug)]
enum EofMarker<E> {
    Open,
    ClosedNormal,
    ClosedError(Rc<E>),
}

/// A snapshot of a [`Pipe`]'s EOF state (spec.md §4.6).
#[derive(Debug)]
pub enum EofState<'a, E> {
    /// The producer may still write and has not called `eof()`.
    Open,
    /// The producer finished normally.
    ClosedNormal,
    /// The producer finished because of `error`.
    ClosedError(&'a E),
}

/// Outcome of finding the pipe empty partway through an at-most
/// operation: either there may be more to come, or the stream is
/// cleanly finished.
enum Shortfall {
    NeedMore,
    Empty,
}

/// An in-memory, single-producer/single-consumer byte stream backed by a
/// queue of pooled, fixed-capacity chunks.
///
/// `E` is the type of error a producer can hand to [`Pipe::eof`]; reads
/// that encounter emptiness after such an EOF re-raise it via
/// [`PipeError::Eof`]. A `Pipe` is not `Send`/`Sync`: spec.md §5 scopes
/// it to single-threaded, cooperative use, the same way its backing
/// [`crate::Pool`] is.
#[derive(Debug)]
pub struct Pipe<E> {
    pool: SharedPool,
    chunks: VecDeque<Chunk>,
    bytes_unconsumed: usize,
    eof: EofMarker<E>,
    current_size: usize,
    minimum_size: usize,
    size_ceiling: Option<usize>,
    low_fill_threshold: u32,
    consecutive_low_fills: u32,
}

impl<E> Pipe<E> {
    /// A pipe drawing chunks from the thread-local default pool, with
    /// the default adaptive-sizing configuration.
    pub fn new() -> Self {
        Self::with_config(PipeConfig::default())
    }

    /// A pipe drawing chunks from the thread-local default pool, with
    /// a custom adaptive-sizing configuration.
    pub fn with_config(config: PipeConfig) -> Self {
        Self::with_pool(default_pool(), config)
    }

    /// A pipe drawing chunks from an explicitly constructed, possibly
    /// shared, pool (spec.md §9 "Global pool").
    pub fn with_pool(pool: SharedPool, config: PipeConfig) -> Self {
        Pipe {
            pool,
            chunks: VecDeque::new(),
            bytes_unconsumed: 0,
            eof: EofMarker::Open,
            current_size: config.minimum_size,
            minimum_size: config.minimum_size,
            size_ceiling: config.size_ceiling,
            low_fill_threshold: config.low_fill_threshold,
            consecutive_low_fills: 0,
        }
    }

    /// Total readable bytes currently buffered (spec.md §3,
    /// `bytes_unconsumed`).
    pub fn len(&self) -> usize {
        self.bytes_unconsumed
    }

    /// True when there is currently nothing to read — independent of
    /// whether the pipe is closed; see [`Pipe::is_exhausted`] for that.
    pub fn is_empty(&self) -> bool {
        self.bytes_unconsumed == 0
    }

    /// The pipe's current EOF state.
    pub fn state(&self) -> EofState<'_, E> {
        match &self.eof {
            EofMarker::Open => EofState::Open,
            EofMarker::ClosedNormal => EofState::ClosedNormal,
            EofMarker::ClosedError(e) => EofState::ClosedError(e),
        }
    }

    /// True once `eof()` has been called, whether or not unread bytes remain.
    pub fn is_closed(&self) -> bool {
        !matches!(self.eof, EofMarker::Open)
    }

    /// True once the pipe is closed *and* fully drained — the point at
    /// which a consumer will never see another byte. Distinct from
    /// [`Pipe::is_closed`]; ported from `pipe.py`'s `reached_eof`.
    pub fn is_exhausted(&self) -> bool {
        self.is_closed() && self.bytes_unconsumed == 0
    }

    /// The current chunk-allocation size hint, as retuned by adaptive
    /// sizing (spec.md §4.3). Exposed for tests and diagnostics.
    pub fn current_chunk_size(&self) -> usize {
        self.current_size
    }

    // ---- write path (spec.md §4.3) ----

    /// Returns a writable window into the tail chunk, allocating a new
    /// chunk from the pool first if needed. `sizehint`, when given,
    /// requests at least that many writable bytes; `None` uses the
    /// pipe's adaptively-tuned `current_size`.
    ///
    /// The returned window is valid until the next call to
    /// `get_buffer` or `buffer_written`.
    pub fn get_buffer(&mut self, sizehint: Option<usize>) -> &mut [u8] {
        debug_assert!(
            matches!(self.eof, EofMarker::Open),
            "get_buffer called on a pipe past eof()"
        );
        let need_new_chunk = match (self.chunks.back(), sizehint) {
            (None, _) => true,
            (Some(tail), None) => tail.free() == 0,
            (Some(tail), Some(hint)) => tail.free() < hint,
        };
        if need_new_chunk {
            let size = match sizehint {
                None => self.current_size,
                Some(hint) => std::cmp::max(self.current_size, hint),
            };
            let chunk = self.pool.borrow_mut().get_chunk(size);
            self.chunks.push_back(chunk);
        }
        self.chunks
            .back_mut()
            .expect("a tail chunk was just ensured to exist")
            .writable()
    }

    /// Commits `n` bytes written into the window last returned by
    /// `get_buffer`, and runs the adaptive-sizing rule.
    ///
    /// # Panics
    /// Panics if there is no tail chunk, or `n` exceeds its free space.
    pub fn buffer_written(&mut self, n: usize) {
        debug_assert!(
            matches!(self.eof, EofMarker::Open),
            "buffer_written called on a pipe past eof()"
        );
        let cap = self
            .chunks
            .back()
            .expect("buffer_written called with no tail chunk")
            .cap();
        if n == cap {
            self.consecutive_low_fills = 0;
            let doubled = self.current_size.saturating_mul(2);
            self.current_size = match self.size_ceiling {
                Some(ceiling) => std::cmp::min(doubled, ceiling),
                None => doubled,
            };
        } else if n < cap / 2 {
            self.consecutive_low_fills += 1;
            if self.consecutive_low_fills > self.low_fill_threshold {
                self.consecutive_low_fills = 0;
                self.current_size = std::cmp::max(self.current_size / 2, self.minimum_size);
                tracing::trace!(new_size = self.current_size, "pipe: shrinking chunk size");
            }
        }
        self.chunks.back_mut().unwrap().written(n);
        self.bytes_unconsumed += n;
    }

    /// Transitions the pipe out of `Open`. A no-op if already closed
    /// (spec.md §3 invariant 5: the marker never changes once set).
    pub fn eof(&mut self, error: Option<E>) {
        if matches!(self.eof, EofMarker::Open) {
            self.eof = match error {
                None => EofMarker::ClosedNormal,
                Some(e) => EofMarker::ClosedError(Rc::new(e)),
            };
            tracing::debug!("pipe: eof reached");
        }
    }

    /// Returns every owned chunk to the pool and marks the pipe closed
    /// (without an error, if it was not already closed). Safe to call
    /// more than once; also run by `Drop`.
    pub fn close(&mut self) {
        while let Some(chunk) = self.chunks.pop_front() {
            self.pool.borrow_mut().return_chunk(chunk);
        }
        self.bytes_unconsumed = 0;
        if matches!(self.eof, EofMarker::Open) {
            self.eof = EofMarker::ClosedNormal;
        }
    }

    // ---- search (spec.md §4.5) ----

    /// The absolute offset of the first `byte` in `[start, end)`
    /// (`end = None` means to the end of the buffered data), or `None`.
    pub fn find_byte(&self, byte: u8, start: usize, end: Option<usize>) -> Option<usize> {
        search::find_byte(&self.chunks, byte, start, end)
    }

    /// The absolute offset of the first occurrence of `needle` in
    /// `[start, end)`; the entire match must lie within that range.
    /// Single-byte needles delegate to [`Pipe::find_byte`].
    pub fn find(&self, needle: &[u8], start: usize, end: Option<usize>) -> Option<usize> {
        search::find(&self.chunks, needle, start, end)
    }

    // ---- read path internals (spec.md §4.4) ----

    fn shortfall_signal(&self) -> Result<Shortfall, PipeError<E>> {
        match &self.eof {
            EofMarker::Open => Ok(Shortfall::NeedMore),
            EofMarker::ClosedNormal => Ok(Shortfall::Empty),
            EofMarker::ClosedError(e) => Err(PipeError::Eof(Rc::clone(e))),
        }
    }

    /// Lengths to take from each chunk, front to back, to cover `n`
    /// bytes. Does not mutate anything; `n` must be `<= bytes_unconsumed`.
    fn plan_take(&self, n: usize) -> Vec<usize> {
        let mut plan = Vec::new();
        let mut remaining = n;
        for chunk in &self.chunks {
            if remaining == 0 {
                break;
            }
            let len = chunk.length();
            if remaining >= len {
                plan.push(len);
                remaining -= len;
            } else {
                plan.push(remaining);
                remaining = 0;
            }
        }
        plan
    }

    fn materialize(&self, plan: &[usize]) -> Bytes {
        let total = plan.iter().sum();
        let mut buf = BytesMut::with_capacity(total);
        for (chunk, &len) in self.chunks.iter().zip(plan) {
            buf.extend_from_slice(chunk.readable(Some(len)));
        }
        buf.freeze()
    }

    /// Applies a plan produced by `plan_take`: chunks it fully drains are
    /// popped and returned to the pool in the same step (spec.md §4.4
    /// "Reclamation rule"); a partially-drained trailing chunk is
    /// advanced via `consume` and stays in the queue.
    fn apply_plan(&mut self, plan: &[usize], total: usize) {
        for &len in plan {
            let full_len = self
                .chunks
                .front()
                .expect("plan longer than the chunk queue")
                .length();
            if len == full_len {
                let chunk = self.chunks.pop_front().unwrap();
                self.pool.borrow_mut().return_chunk(chunk);
            } else {
                self.chunks.front_mut().unwrap().consume(len);
            }
        }
        self.bytes_unconsumed -= total;
    }

    /// Materializes the bytes behind `plan_take(bytes_unconsumed)` — the
    /// entire remainder — for a `PartialRead` error, draining it from the
    /// pipe unless `peek` is set.
    fn drain_partial(&mut self, peek: bool) -> Bytes {
        let plan = self.plan_take(self.bytes_unconsumed);
        let leftover = self.materialize(&plan);
        if !peek {
            let total = self.bytes_unconsumed;
            self.apply_plan(&plan, total);
        }
        leftover
    }

    fn take(&mut self, n: Option<usize>, peek: bool) -> Result<Option<Bytes>, PipeError<E>> {
        if n == Some(0) {
            return Ok(Some(Bytes::new()));
        }
        if self.bytes_unconsumed == 0 {
            return match self.shortfall_signal()? {
                Shortfall::NeedMore => Ok(None),
                Shortfall::Empty => Ok(Some(Bytes::new())),
            };
        }
        let n = n.map_or(self.bytes_unconsumed, |n| n.min(self.bytes_unconsumed));
        let plan = self.plan_take(n);
        let bytes = self.materialize(&plan);
        if !peek {
            self.apply_plan(&plan, n);
        }
        Ok(Some(bytes))
    }

    fn take_zerocopy<R>(
        &mut self,
        n: Option<usize>,
        peek: bool,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        if n == Some(0) {
            return Ok(Some(f(&mut std::iter::empty())));
        }
        if self.bytes_unconsumed == 0 {
            return match self.shortfall_signal()? {
                Shortfall::NeedMore => Ok(None),
                Shortfall::Empty => Ok(Some(f(&mut std::iter::empty()))),
            };
        }
        let n = n.map_or(self.bytes_unconsumed, |n| n.min(self.bytes_unconsumed));
        let plan = self.plan_take(n);
        let result = {
            let windows: Vec<&[u8]> = self
                .chunks
                .iter()
                .zip(&plan)
                .map(|(c, &len)| c.readable(Some(len)))
                .collect();
            f(&mut windows.into_iter())
        };
        if !peek {
            self.apply_plan(&plan, n);
        }
        Ok(Some(result))
    }

    fn skip_impl(&mut self, n: Option<usize>) -> Result<Option<usize>, PipeError<E>> {
        if n == Some(0) {
            return Ok(Some(0));
        }
        if self.bytes_unconsumed == 0 {
            return match self.shortfall_signal()? {
                Shortfall::NeedMore => Ok(None),
                Shortfall::Empty => Ok(Some(0)),
            };
        }
        let n = n.map_or(self.bytes_unconsumed, |n| n.min(self.bytes_unconsumed));
        let plan = self.plan_take(n);
        self.apply_plan(&plan, n);
        Ok(Some(n))
    }

    // ---- public read API (spec.md §4.4) ----

    /// At-most read: up to `n` bytes (`None` = all currently buffered).
    /// See spec.md §4.4 for the `n == 0` / EOF behavior table.
    pub fn read(&mut self, n: Option<usize>) -> Result<Option<Bytes>, PipeError<E>> {
        self.take(n, false)
    }

    /// Like [`Pipe::read`], but does not consume the bytes.
    pub fn peek(&mut self, n: Option<usize>) -> Result<Option<Bytes>, PipeError<E>> {
        self.take(n, true)
    }

    /// Zero-copy at-most read: `f` is invoked with windows aliasing
    /// chunk memory directly, scoped to the call — the pipe cannot be
    /// mutated again until `f` returns (spec.md §9 "Zero-copy handouts").
    pub fn read_zerocopy<R>(
        &mut self,
        n: Option<usize>,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        self.take_zerocopy(n, false, f)
    }

    /// Like [`Pipe::read_zerocopy`], but does not consume the bytes.
    pub fn peek_zerocopy<R>(
        &mut self,
        n: Option<usize>,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        self.take_zerocopy(n, true, f)
    }

    /// Skips up to `n` bytes (`None` = all currently buffered), returning
    /// how many were actually skipped.
    pub fn skip(&mut self, n: Option<usize>) -> Result<Option<usize>, PipeError<E>> {
        self.skip_impl(n)
    }

    fn exact<R>(
        &mut self,
        n: usize,
        peek: bool,
        on_enough: impl FnOnce(&mut Self) -> Result<Option<R>, PipeError<E>>,
        empty: R,
    ) -> Result<Option<R>, PipeError<E>> {
        if n == 0 {
            return Ok(Some(empty));
        }
        if self.bytes_unconsumed < n {
            if self.bytes_unconsumed == 0 {
                return match self.shortfall_signal()? {
                    Shortfall::NeedMore => Ok(None),
                    Shortfall::Empty => Ok(Some(empty)),
                };
            }
            if self.is_closed() {
                let leftover = self.drain_partial(peek);
                return Err(PipeError::partial_read(leftover));
            }
            return Ok(None);
        }
        on_enough(self)
    }

    /// Exact read: exactly `n` bytes, or a definite "not enough yet"
    /// (`None`), empty/`PartialRead`/error per the EOF state, as laid
    /// out in spec.md §4.4.
    pub fn read_exact(&mut self, n: usize) -> Result<Option<Bytes>, PipeError<E>> {
        self.exact(n, false, |p| p.take(Some(n), false), Bytes::new())
    }

    /// Like [`Pipe::read_exact`], but does not consume on the happy path
    /// or drain on a `PartialRead` (DESIGN.md documents this choice).
    pub fn peek_exact(&mut self, n: usize) -> Result<Option<Bytes>, PipeError<E>> {
        self.exact(n, true, |p| p.take(Some(n), true), Bytes::new())
    }

    /// Zero-copy exact read. `f` is `FnOnce`, so (unlike [`Pipe::read_exact`])
    /// this cannot be routed through the shared `exact` helper, which
    /// needs to be able to produce its "not enough data yet" value
    /// without consuming the caller's callback; the same shortfall logic
    /// is inlined here instead, calling `f` exactly once per outcome.
    pub fn read_exact_zerocopy<R>(
        &mut self,
        n: usize,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        self.exact_zerocopy(n, false, f)
    }

    /// Zero-copy exact peek; see [`Pipe::read_exact_zerocopy`].
    pub fn peek_exact_zerocopy<R>(
        &mut self,
        n: usize,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        self.exact_zerocopy(n, true, f)
    }

    fn exact_zerocopy<R>(
        &mut self,
        n: usize,
        peek: bool,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        if n == 0 {
            return Ok(Some(f(&mut std::iter::empty())));
        }
        if self.bytes_unconsumed < n {
            if self.bytes_unconsumed == 0 {
                return match self.shortfall_signal()? {
                    Shortfall::NeedMore => Ok(None),
                    Shortfall::Empty => Ok(Some(f(&mut std::iter::empty()))),
                };
            }
            if self.is_closed() {
                let leftover = self.drain_partial(peek);
                return Err(PipeError::partial_read(leftover));
            }
            return Ok(None);
        }
        self.take_zerocopy(Some(n), peek, f)
    }

    /// Exact skip: like [`Pipe::read_exact`] but discarding the bytes
    /// and returning only a count.
    pub fn skip_exact(&mut self, n: usize) -> Result<Option<usize>, PipeError<E>> {
        self.exact(n, false, |p| p.skip_impl(Some(n)), 0)
    }

    /// Reads up to (and optionally including, or past) `separator`.
    /// Consumes `idx + separator.len()` bytes when `skip_separator` is
    /// `false` (the default reading includes the separator in the
    /// result); when `true`, the separator is consumed but excluded
    /// from the returned bytes.
    ///
    /// # Errors
    /// Returns [`PipeError::InvalidArgument`] if `separator` is empty.
    pub fn read_until(
        &mut self,
        separator: &[u8],
        skip_separator: bool,
    ) -> Result<Option<Bytes>, PipeError<E>> {
        let idx = self.find_separator(separator)?;
        match idx {
            Some(idx) => {
                if skip_separator {
                    let data = self
                        .take(Some(idx), false)?
                        .expect("idx <= bytes_unconsumed");
                    self.skip_impl(Some(separator.len()))?;
                    Ok(Some(data))
                } else {
                    self.take(Some(idx + separator.len()), false)
                }
            }
            None => self.read_until_not_found(),
        }
    }

    /// Zero-copy `read_until`.
    pub fn read_until_zerocopy<R>(
        &mut self,
        separator: &[u8],
        skip_separator: bool,
        f: impl FnOnce(&mut dyn Iterator<Item = &[u8]>) -> R,
    ) -> Result<Option<R>, PipeError<E>> {
        let idx = self.find_separator(separator)?;
        match idx {
            Some(idx) => {
                if skip_separator {
                    let result = self
                        .take_zerocopy(Some(idx), false, f)?
                        .expect("idx <= bytes_unconsumed");
                    self.skip_impl(Some(separator.len()))?;
                    Ok(Some(result))
                } else {
                    self.take_zerocopy(Some(idx + separator.len()), false, f)
                }
            }
            None => match self.read_until_not_found_signal()? {
                Some(Shortfall::Empty) => Ok(Some(f(&mut std::iter::empty()))),
                Some(Shortfall::NeedMore) | None => Ok(None),
            },
        }
    }

    fn find_separator(&self, separator: &[u8]) -> Result<Option<usize>, PipeError<E>> {
        if separator.is_empty() {
            return Err(PipeError::InvalidArgument(
                "readuntil separator must not be empty",
            ));
        }
        Ok(if separator.len() == 1 {
            self.find_byte(separator[0], 0, None)
        } else {
            self.find(separator, 0, None)
        })
    }

    fn read_until_not_found(&mut self) -> Result<Option<Bytes>, PipeError<E>> {
        if self.bytes_unconsumed == 0 {
            return match self.shortfall_signal()? {
                Shortfall::NeedMore => Ok(None),
                Shortfall::Empty => Ok(Some(Bytes::new())),
            };
        }
        if self.is_closed() {
            let leftover = self.drain_partial(false);
            return Err(PipeError::partial_read(leftover));
        }
        Ok(None)
    }

    /// Shared control-flow for the zero-copy `read_until` miss path:
    /// `Ok(None)` signals "need more", whether the pipe is empty and
    /// still open or there are buffered bytes and the separator just
    /// hasn't shown up yet; `Ok(Some(Shortfall::Empty))` signals an
    /// empty result (closed normally, nothing left); `Err` carries a
    /// `PartialRead` or the producer's EOF error.
    fn read_until_not_found_signal(&mut self) -> Result<Option<Shortfall>, PipeError<E>> {
        if self.bytes_unconsumed == 0 {
            return self.shortfall_signal().map(Some);
        }
        if self.is_closed() {
            let leftover = self.drain_partial(false);
            return Err(PipeError::partial_read(leftover));
        }
        Ok(None)
    }
}

impl<E> Default for Pipe<E> {
    fn default() -> Self {
        Pipe::new()
    }
}

impl<E> Drop for Pipe<E> {
    fn drop(&mut self) {
        self.close();
    }
}
