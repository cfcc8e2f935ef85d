//! Error types for the pipe's read path (spec.md §7).

use std::rc::Rc;

use bytes::Bytes;
use thiserror::Error;

/// Errors raised by [`crate::Pipe`]'s read-path operations.
///
/// `E` is the type of error a producer can pass to [`crate::Pipe::eof`];
/// it is re-raised verbatim by reads that encounter emptiness after such
/// an EOF. The pipe itself never constructs an `E` value, so no bound on
/// `E` is required beyond what each variant's own impls need.
#[derive(Debug, Error)]
pub enum PipeError<E> {
    /// A negative offset or size, or another caller-side misuse. Fatal
    /// to the call; the pipe's state is left untouched.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// EOF was reached with bytes still held in the pipe. Carries the
    /// remainder, which has already been drained from the pipe as a
    /// side effect of raising this error.
    #[error("partial read: {} byte(s) left at EOF", leftover.len())]
    PartialRead {
        /// The bytes that were left when EOF was reached.
        leftover: Bytes,
    },

    /// The error value a producer passed to `eof(Some(e))`, re-raised
    /// on a later read that finds the pipe both closed and empty.
    ///
    /// Held behind an `Rc` rather than `E` itself: the pipe keeps its own
    /// copy to hand out on every subsequent read past EOF, which an owned
    /// `E` could not do without requiring `E: Clone`.
    #[error("stream closed with error")]
    Eof(Rc<E>),
}

impl<E> PipeError<E> {
    pub(crate) fn partial_read(leftover: Bytes) -> Self {
        PipeError::PartialRead { leftover }
    }
}
