//! End-to-end tests for plaintext ingestion over real sockets.
//!
//! Each test binds a receiver on an ephemeral port, feeds a cache writer
//! and checks what lands in the cache.

use points_cache::{Cache, Sample};
use server::connection::ConnectionOptions;
use server::{CacheWriter, State, TcpReceiver};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Pipeline {
    cache: Arc<Cache>,
    receiver: TcpReceiver,
    addr: SocketAddr,
    writer: JoinHandle<server::WriterStats>,
}

async fn start_pipeline(options: ConnectionOptions) -> Pipeline {
    let cache = Arc::new(Cache::new(16));
    let (tx, rx) = mpsc::channel(1024);
    let writer = tokio::spawn(CacheWriter::new(cache.clone(), 0).run(rx));

    let mut receiver = TcpReceiver::new(tx, options);
    let addr = receiver
        .listen("127.0.0.1:0".parse().unwrap())
        .await
        .expect("failed to bind receiver");

    Pipeline {
        cache,
        receiver,
        addr,
        writer,
    }
}

/// Send `payload`, close the write half and wait for the server to close
/// its side. Once this returns the connection task has finished.
async fn send_and_close(addr: SocketAddr, payload: &[u8]) {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    stream.write_all(payload).await.unwrap();
    // The server may already have reset the connection.
    let _ = stream.shutdown().await;

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("server did not close the connection");
    if read.is_ok() {
        assert!(rest.is_empty(), "server should never write to the client");
    }
}

/// Poll until `condition` holds or five seconds pass.
async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_samples_for_one_metric() {
    let mut p = start_pipeline(ConnectionOptions::default()).await;

    send_and_close(p.addr, b"metric.a 1 1000\nmetric.a 2 1010\n").await;

    assert!(wait_for(|| p.cache.size() == 2).await);
    let record = p.cache.pop("metric.a").expect("metric.a missing");
    assert_eq!(
        record.samples(),
        &[Sample::new(1.0, 1000), Sample::new(2.0, 1010)]
    );
    assert_eq!(p.cache.size(), 0);

    p.receiver.stop();
    p.receiver.join().await;
    drop(p.receiver);
    let stats = p.writer.await.unwrap();
    assert_eq!(stats.written, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_line_is_skipped() {
    let mut p = start_pipeline(ConnectionOptions::default()).await;

    send_and_close(p.addr, b"garbage\nmetric.b 3 2000\n").await;

    assert!(wait_for(|| p.cache.size() == 1).await);
    let record = p.cache.pop("metric.b").expect("metric.b missing");
    assert_eq!(record.samples(), &[Sample::new(3.0, 2000)]);
    assert!(p.cache.get("garbage").is_none());

    p.receiver.stop();
    p.receiver.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unterminated_line_is_discarded() {
    let mut p = start_pipeline(ConnectionOptions::default()).await;

    send_and_close(p.addr, b"metric.c 4 3000").await;

    p.receiver.stop();
    p.receiver.join().await;
    drop(p.receiver);

    // All senders are gone, so the writer has seen everything it will see.
    let stats = p.writer.await.unwrap();
    assert_eq!(stats.written, 0);
    assert!(p.cache.get("metric.c").is_none());
    assert_eq!(p.cache.size(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_clients() {
    const CLIENTS: usize = 16;
    const LINES: usize = 200;

    let mut p = start_pipeline(ConnectionOptions::default()).await;

    let mut clients = Vec::new();
    for client in 0..CLIENTS {
        let addr = p.addr;
        clients.push(tokio::spawn(async move {
            let mut payload = Vec::new();
            for i in 0..LINES {
                payload.extend_from_slice(format!("client.{} {} {}\n", client, i, i).as_bytes());
            }
            send_and_close(addr, &payload).await;
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    assert!(wait_for(|| p.cache.size() == CLIENTS * LINES).await);

    // One connection per metric, so samples keep the order they were sent in.
    for client in 0..CLIENTS {
        let record = p.cache.pop(&format!("client.{}", client)).unwrap();
        assert_eq!(record.len(), LINES);
        for (i, sample) in record.samples().iter().enumerate() {
            assert_eq!(sample.timestamp, i as i64);
        }
    }
    assert_eq!(p.cache.size(), 0);

    p.receiver.stop();
    p.receiver.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_connection_is_closed() {
    let options = ConnectionOptions {
        idle_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let mut p = start_pipeline(options).await;

    let mut stream = TcpStream::connect(p.addr).await.unwrap();
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("idle connection was not closed")
        .unwrap_or(0);
    assert_eq!(n, 0);

    p.receiver.stop();
    p.receiver.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_keeps_open_connections() {
    let mut p = start_pipeline(ConnectionOptions::default()).await;

    let mut stream = TcpStream::connect(p.addr).await.unwrap();
    stream.write_all(b"inflight 1 100\n").await.unwrap();
    assert!(wait_for(|| p.cache.size() == 1).await);

    p.receiver.stop();
    p.receiver.join().await;
    assert_eq!(p.receiver.state(), State::Stopped);

    // The listener is gone.
    assert!(TcpStream::connect(p.addr).await.is_err());

    // The connection accepted before stop keeps delivering.
    stream.write_all(b"inflight 2 200\n").await.unwrap();
    assert!(wait_for(|| p.cache.size() == 2).await);

    drop(stream);
    drop(p.receiver);
    let stats = tokio::time::timeout(Duration::from_secs(5), p.writer)
        .await
        .expect("writer did not finish after the last connection closed")
        .unwrap();
    assert_eq!(stats.written, 2);

    let record = p.cache.pop("inflight").unwrap();
    assert_eq!(
        record.samples(),
        &[Sample::new(1.0, 100), Sample::new(2.0, 200)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_over_long_line_closes_connection() {
    let options = ConnectionOptions {
        max_line_length: 32,
        ..Default::default()
    };
    let mut p = start_pipeline(options).await;

    let mut payload = b"short 1 1\n".to_vec();
    payload.extend_from_slice(format!("{} 1 1\n", "x".repeat(64)).as_bytes());
    payload.extend_from_slice(b"after 1 1\n");
    send_and_close(p.addr, &payload).await;

    p.receiver.stop();
    p.receiver.join().await;
    drop(p.receiver);
    p.writer.await.unwrap();

    assert!(p.cache.get("short").is_some());
    assert!(p.cache.get("after").is_none());
    assert_eq!(p.cache.size(), 1);
}
