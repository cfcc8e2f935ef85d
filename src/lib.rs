#![warn(clippy::all)]
#![warn(future_incompatible)]
#![warn(rust_2018_idioms)]

//! A chunked, size-classed byte pipe: an in-memory, single-producer /
//! single-consumer byte stream backed by pooled, fixed-capacity chunks.
//!
//! A [`Pipe`] is not a growable contiguous buffer. It holds a queue of
//! `Chunk`s (each a fixed-size boxed byte buffer with independent read
//! and write cursors) drawn from a [`Pool`] that recycles them by size
//! class, and adapts the size of chunks it requests next based on how
//! full recent writes have been (see [`PipeConfig`]). This trades the
//! contiguity a single growable buffer gives you for cheap, constant-
//! time appends and O(1) reclamation of fully-drained chunks.
//!
//! ```
//! use chunked_pipe::Pipe;
//!
//! let mut pipe: Pipe<std::convert::Infallible> = Pipe::new();
//! let buf = pipe.get_buffer(None);
//! buf[..5].copy_from_slice(b"hello");
//! pipe.buffer_written(5);
//!
//! assert_eq!(pipe.read(Some(5)).unwrap().as_deref(), Some(&b"hello"[..]));
//! ```

mod adapter;
mod chunk;
mod config;
mod error;
mod pipe;
mod pool;
mod search;

pub use adapter::PipeEventSink;
pub use config::{PipeConfig, DEFAULT_CHUNK_SIZE};
pub use error::PipeError;
pub use pipe::{EofState, Pipe};
pub use pool::{default_pool, Pool, SharedPool};
