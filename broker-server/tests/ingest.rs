use broker_core::{BufferPool, StreamManager};
use broker_server::net::engine::Engine;
use slog::{Discard, Logger};
use std::convert::TryInto;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn test_logger() -> Logger {
    Logger::root(Discard, slog::o!())
}

fn encode_publish(stream: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(0x01);
    body.extend_from_slice(&(stream.len() as u16).to_be_bytes());
    body.extend_from_slice(stream.as_bytes());
    body.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    body.extend_from_slice(payload);

    let mut frame = Vec::new();
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Starts an engine bound to ephemeral ports on a background thread and returns the data port's
/// address plus the manager and temp dir (kept alive for the duration of the test).
fn spawn_engine() -> (SocketAddr, Arc<StreamManager>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let segment_pool = Arc::new(BufferPool::new(4096));
    let request_pool = Arc::new(BufferPool::new(64));
    let manager = Arc::new(StreamManager::new(
        dir.path().to_path_buf(),
        segment_pool,
        test_logger(),
    ));

    let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut engine = Engine::new(
        loopback,
        loopback,
        request_pool,
        manager.clone(),
        test_logger(),
    )
    .unwrap();

    let data_addr = engine.local_data_addr().unwrap();

    thread::spawn(move || {
        let _ = engine.run();
    });

    // Give the reactor thread a moment to enter its poll loop.
    thread::sleep(Duration::from_millis(20));

    (data_addr, manager, dir)
}

fn read_exact_ids(stream: &mut TcpStream, count: usize) -> Vec<[u8; 16]> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut buf = [0u8; 16];
        stream.read_exact(&mut buf).unwrap();
        out.push(buf);
    }
    out
}

#[test]
fn single_small_publish_gets_a_record_id_of_one() {
    let (addr, _manager, _dir) = spawn_engine();
    let mut stream = TcpStream::connect(addr).unwrap();

    let frame = encode_publish("streamABC", b"{\"k\":1,\"v\":\"hello\"}");
    stream.write_all(&frame).unwrap();

    let ids = read_exact_ids(&mut stream, 1);
    assert_eq!(u64::from_be_bytes(ids[0][0..8].try_into().unwrap()), 0);
    assert_eq!(u64::from_be_bytes(ids[0][8..16].try_into().unwrap()), 1);
}

#[test]
fn batch_of_five_on_one_write_replies_in_order() {
    let (addr, _manager, _dir) = spawn_engine();
    let mut stream = TcpStream::connect(addr).unwrap();

    let mut batch = Vec::new();
    for _ in 0..5 {
        batch.extend_from_slice(&encode_publish("batch", b"hello"));
    }
    stream.write_all(&batch).unwrap();

    let ids = read_exact_ids(&mut stream, 5);
    let los: Vec<u64> = ids
        .iter()
        .map(|id| u64::from_be_bytes(id[8..16].try_into().unwrap()))
        .collect();
    assert_eq!(los, vec![1, 2, 3, 4, 5]);
}

#[test]
fn split_header_across_two_writes_still_parses() {
    let (addr, _manager, _dir) = spawn_engine();
    let mut stream = TcpStream::connect(addr).unwrap();

    let frame = encode_publish("streamABC", b"hello");
    stream.write_all(&frame[..2]).unwrap();
    thread::sleep(Duration::from_millis(20));
    stream.write_all(&frame[2..]).unwrap();

    let ids = read_exact_ids(&mut stream, 1);
    assert_eq!(u64::from_be_bytes(ids[0][8..16].try_into().unwrap()), 1);
}

#[test]
fn two_streams_interleaved_get_independent_sequences() {
    let (addr, _manager, _dir) = spawn_engine();
    let mut conn_a = TcpStream::connect(addr).unwrap();
    let mut conn_b = TcpStream::connect(addr).unwrap();

    conn_a.write_all(&encode_publish("A", b"1")).unwrap();
    conn_b.write_all(&encode_publish("B", b"1")).unwrap();
    conn_a.write_all(&encode_publish("A", b"2")).unwrap();

    let a_ids = read_exact_ids(&mut conn_a, 2);
    let b_ids = read_exact_ids(&mut conn_b, 1);

    assert_eq!(u64::from_be_bytes(a_ids[0][8..16].try_into().unwrap()), 1);
    assert_eq!(u64::from_be_bytes(a_ids[1][8..16].try_into().unwrap()), 2);
    assert_eq!(u64::from_be_bytes(b_ids[0][8..16].try_into().unwrap()), 1);
}

#[test]
fn malformed_opcode_closes_only_that_connection() {
    let (addr, _manager, _dir) = spawn_engine();

    let mut bad = TcpStream::connect(addr).unwrap();
    bad.write_all(&[0, 0, 0, 1, 0xff]).unwrap();

    let mut buf = [0u8; 1];
    let n = bad.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0, "server should close the connection after a bad opcode");

    // A fresh connection to the same server still serves traffic.
    let mut good = TcpStream::connect(addr).unwrap();
    good.write_all(&encode_publish("s", b"x")).unwrap();
    let ids = read_exact_ids(&mut good, 1);
    assert_eq!(u64::from_be_bytes(ids[0][8..16].try_into().unwrap()), 1);
}
