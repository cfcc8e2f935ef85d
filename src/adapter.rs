//! The stream adapter contract (spec.md §6): the interface the core
//! exposes to any async I/O binding, without depending on one itself.
//!
//! This crate supplies no adapter — no `AsyncRead`/`AsyncWrite` impl, no
//! wire protocol, no CLI. [`PipeEventSink`] documents the shape an
//! adapter built on top of [`crate::Pipe`] is expected to have; it is
//! not used by `Pipe` itself.

use crate::Pipe;

/// The read-side half of the adapter contract: how an async I/O binding
/// finds out there is something to poll for on a [`Pipe`] it owns.
///
/// An adapter registers one of these with whatever reactor it lives on
/// and calls [`PipeEventSink::on_data`] after each `buffer_written`/`eof`
/// it performs on the write side, so the read side's waker (if any) gets
/// polled again. The callback must be synchronous and must not touch the
/// `Pipe` — spec.md §6 rules out reentrant mutation from inside the
/// commit path that is invoking it.
pub trait PipeEventSink<E> {
    /// Invoked after a commit (`buffer_written` or `eof`) changes what a
    /// reader of `pipe` would observe.
    fn on_data(&mut self, pipe: &Pipe<E>);
}

/// A sink that does nothing; the degenerate adapter for a `Pipe` driven
/// entirely by synchronous polling.
impl<E> PipeEventSink<E> for () {
    fn on_data(&mut self, _pipe: &Pipe<E>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipeConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSink {
        count: Rc<Cell<u32>>,
    }

    impl PipeEventSink<&'static str> for CountingSink {
        fn on_data(&mut self, _pipe: &Pipe<&'static str>) {
            self.count.set(self.count.get() + 1);
        }
    }

    #[test]
    fn sink_is_notified_once_per_commit() {
        let mut pipe: Pipe<&'static str> = Pipe::with_config(PipeConfig::default());
        let count = Rc::new(Cell::new(0));
        let mut sink = CountingSink {
            count: Rc::clone(&count),
        };

        let buf = pipe.get_buffer(None);
        buf[..4].copy_from_slice(b"data");
        pipe.buffer_written(4);
        sink.on_data(&pipe);

        pipe.eof(None);
        sink.on_data(&pipe);

        assert_eq!(count.get(), 2);
    }

    /// Demonstrates the contract end to end with a real reactor: a
    /// producer task writes on one side while a consumer task polls
    /// `read_exact` in a loop, the way a `tokio::io::AsyncRead` adapter
    /// built on top of this trait would.
    #[tokio::test]
    async fn tokio_task_pair_round_trips_through_the_contract() {
        use tokio::sync::Notify;

        let pipe = Rc::new(std::cell::RefCell::new(Pipe::<&'static str>::new()));
        let notify = Rc::new(Notify::new());

        let producer_pipe = Rc::clone(&pipe);
        let producer_notify = Rc::clone(&notify);
        let producer = async move {
            for chunk in [&b"hello "[..], &b"world"[..]] {
                let mut p = producer_pipe.borrow_mut();
                let buf = p.get_buffer(Some(chunk.len()));
                buf[..chunk.len()].copy_from_slice(chunk);
                p.buffer_written(chunk.len());
                drop(p);
                producer_notify.notify_one();
                tokio::task::yield_now().await;
            }
            producer_pipe.borrow_mut().eof(None);
            producer_notify.notify_one();
        };

        let consumer_pipe = Rc::clone(&pipe);
        let consumer = async move {
            let mut out = Vec::new();
            loop {
                let next = consumer_pipe.borrow_mut().read(Some(64)).unwrap();
                match next {
                    Some(bytes) if !bytes.is_empty() => out.extend_from_slice(&bytes),
                    Some(_) => break, // empty + closed: exhausted
                    None => notify.notified().await,
                }
            }
            out
        };

        let local = tokio::task::LocalSet::new();
        let out = local
            .run_until(async {
                let (_, out) = tokio::join!(producer, consumer);
                out
            })
            .await;
        assert_eq!(out, b"hello world");
    }
}
