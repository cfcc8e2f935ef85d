//! Integration tests exercising `Pipe` only through its public API, the
//! way a consumer crate would. Scenarios 1-7 are ported literally from
//! spec.md §8; the rest cover the boundary behaviors listed alongside
//! them.

use bytes::Bytes;
use chunked_pipe::{Pipe, PipeConfig, PipeError};

type TestPipe = Pipe<&'static str>;

fn write_all(pipe: &mut TestPipe, data: &[u8]) {
    let mut written = 0;
    while written < data.len() {
        let buf = pipe.get_buffer(None);
        let n = std::cmp::min(buf.len(), data.len() - written);
        buf[..n].copy_from_slice(&data[written..written + n]);
        pipe.buffer_written(n);
        written += n;
    }
}

#[test]
fn simple_round_trip() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"testing");
    assert_eq!(p.read_exact(4).unwrap(), Some(Bytes::from("test")));
    assert_eq!(p.read_exact(3).unwrap(), Some(Bytes::from("ing")));
    assert_eq!(p.len(), 0);
}

#[test]
fn exact_on_insufficient_then_topped_up() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"te");
    assert_eq!(p.read_exact(4).unwrap(), None);
    write_all(&mut p, b"st");
    assert_eq!(p.read_exact(4).unwrap(), Some(Bytes::from("test")));
}

#[test]
fn crlf_across_chunk_boundary() {
    let mut p = Pipe::<&'static str>::with_config(PipeConfig::fixed_size(2048));
    let mut data = vec![b'a'; 2047];
    data.push(b'\r');
    data.push(b'\n');
    data.extend(std::iter::repeat(b'a').take(2047));
    write_all(&mut p, &data);
    assert_eq!(p.find(b"\r\n", 0, None), Some(2047));
}

#[test]
fn eof_then_partial_read_then_empty() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"testing");
    p.eof(None);
    assert_eq!(p.read_exact(4).unwrap(), Some(Bytes::from("test")));
    assert_eq!(p.read_exact(1).unwrap(), Some(Bytes::from("i")));
    match p.read_exact(4) {
        Err(PipeError::PartialRead { leftover }) => assert_eq!(leftover, Bytes::from("ng")),
        other => panic!("expected PartialRead, got {other:?}"),
    }
    assert_eq!(p.read_exact(4).unwrap(), Some(Bytes::new()));
}

#[test]
fn error_eof_reraised_after_partial_read() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"testing");
    p.eof(Some("disk gone"));
    assert_eq!(p.read_exact(4).unwrap(), Some(Bytes::from("test")));
    assert_eq!(p.read_exact(1).unwrap(), Some(Bytes::from("i")));
    match p.read_exact(4) {
        Err(PipeError::PartialRead { leftover }) => assert_eq!(leftover, Bytes::from("ng")),
        other => panic!("expected PartialRead, got {other:?}"),
    }
    match p.read_exact(4) {
        Err(PipeError::Eof(e)) => assert_eq!(*e, "disk gone"),
        other => panic!("expected Eof(\"disk gone\"), got {other:?}"),
    }
    // Re-raised verbatim a second time too (spec.md §7).
    match p.read_exact(1) {
        Err(PipeError::Eof(e)) => assert_eq!(*e, "disk gone"),
        other => panic!("expected Eof(\"disk gone\") again, got {other:?}"),
    }
}

#[test]
fn readuntil_with_and_without_skip() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"test\r\ning\r\n");
    assert_eq!(
        p.read_until(b"\r\n", true).unwrap(),
        Some(Bytes::from("test"))
    );
    assert_eq!(
        p.read_until(b"\r\n", false).unwrap(),
        Some(Bytes::from("ing\r\n"))
    );
    p.eof(None);
    assert_eq!(p.read_until(b"\r\n", false).unwrap(), Some(Bytes::new()));
}

#[test]
fn adaptive_sizing_grows_then_shrinks() {
    let mut p = Pipe::<&'static str>::with_config(PipeConfig {
        minimum_size: 2048,
        size_ceiling: None,
        low_fill_threshold: 10,
    });
    for _ in 0..4 {
        let cap = p.get_buffer(None).len();
        p.buffer_written(cap);
    }
    let grown = p.current_chunk_size();
    assert!(grown > 2048);

    p.skip(None).unwrap();
    for _ in 0..12 {
        let buf = p.get_buffer(None);
        p.buffer_written(1.min(buf.len()));
    }
    assert!(p.current_chunk_size() < grown);
}

// --- boundary behaviors ---

#[test]
fn read_zero_is_always_empty_regardless_of_state() {
    let mut open = TestPipe::new();
    assert_eq!(open.read(Some(0)).unwrap(), Some(Bytes::new()));

    let mut closed = TestPipe::new();
    closed.eof(None);
    assert_eq!(closed.read(Some(0)).unwrap(), Some(Bytes::new()));

    let mut errored = TestPipe::new();
    errored.eof(Some("boom"));
    assert_eq!(errored.read(Some(0)).unwrap(), Some(Bytes::new()));
}

#[test]
fn read_on_empty_pipe_follows_the_eof_table() {
    let mut open = TestPipe::new();
    assert_eq!(open.read(Some(1)).unwrap(), None);

    let mut closed = TestPipe::new();
    closed.eof(None);
    assert_eq!(closed.read(Some(1)).unwrap(), Some(Bytes::new()));

    let mut errored = TestPipe::new();
    errored.eof(Some("boom"));
    match errored.read(Some(1)) {
        Err(PipeError::Eof(e)) => assert_eq!(*e, "boom"),
        other => panic!("expected Eof, got {other:?}"),
    }
}

#[test]
fn readexact_partial_at_eof_drains_exactly_what_was_buffered() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"abc");
    p.eof(None);
    match p.read_exact(10) {
        Err(PipeError::PartialRead { leftover }) => {
            assert_eq!(leftover, Bytes::from("abc"));
        }
        other => panic!("expected PartialRead, got {other:?}"),
    }
    assert_eq!(p.len(), 0);
}

#[test]
fn separator_spanning_a_chunk_boundary_is_found() {
    let mut p = Pipe::<&'static str>::with_config(PipeConfig::fixed_size(4));
    write_all(&mut p, b"ab\r\ncd");
    assert_eq!(p.find(b"\r\n", 0, None), Some(2));
}

#[test]
fn peek_does_not_consume_and_matches_a_following_read() {
    let mut p = TestPipe::new();
    write_all(&mut p, b"hello world");
    let peeked = p.peek(Some(5)).unwrap().unwrap();
    assert_eq!(p.len(), 11);
    let read = p.read(Some(5)).unwrap().unwrap();
    assert_eq!(peeked, read);
}
