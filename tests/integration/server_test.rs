use std::net::SocketAddr;
use std::time::Duration;

use selfmon::core::self_monitor::{BroadcastHub, SamplingMode};
use selfmon::server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::common::fake_monitor;

struct TestServer {
    addr: SocketAddr,
    hub: BroadcastHub,
    stop: oneshot::Sender<()>,
    task: JoinHandle<selfmon::Result<()>>,
}

async fn start_server(push_interval: Duration) -> TestServer {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor, push_interval);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(server::serve(listener, hub.clone(), async move {
        let _ = stopped.await;
    }));

    TestServer {
        addr,
        hub,
        stop,
        task,
    }
}

async fn get(addr: SocketAddr, path: &str) -> (u16, serde_json::Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();

    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    (status, serde_json::from_str(body).unwrap())
}

/// Read from an open event stream until one complete `data:` event arrives.
async fn next_event(stream: &mut TcpStream, buffer: &mut String) -> serde_json::Value {
    loop {
        if let Some(start) = buffer.find("data:") {
            if let Some(len) = buffer[start..].find("\n\n") {
                let json = buffer[start + 5..start + len].trim().to_string();
                buffer.replace_range(..start + len + 2, "");
                return serde_json::from_str(&json).unwrap();
            }
        }

        let mut chunk = [0u8; 8192];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "event stream closed early");
        buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
}

#[tokio::test]
async fn test_metrics_endpoint_counts_requests() {
    let server = start_server(Duration::from_secs(2)).await;

    let (status, first) = get(server.addr, "/api/metrics").await;
    assert_eq!(status, 200);
    assert_eq!(first["totalRequests"], 1);
    assert_eq!(first["endpoints"]["/api/metrics"], 1);

    let (_, second) = get(server.addr, "/api/metrics").await;
    assert_eq!(second["totalRequests"], 2);
    assert_eq!(second["statusCodes"]["200"], 1);
    assert_eq!(second["hostname"], "test-host");
}

#[tokio::test]
async fn test_unknown_route_counts_as_error() {
    let server = start_server(Duration::from_secs(2)).await;

    let (status, body) = get(server.addr, "/does-not-exist").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not found");

    let (_, snapshot) = get(server.addr, "/api/metrics").await;
    assert_eq!(snapshot["statusCodes"]["404"], 1);
    assert_eq!(snapshot["errorCount"], 1);
}

#[tokio::test]
async fn test_health_and_index() {
    let server = start_server(Duration::from_secs(2)).await;

    let (status, health) = get(server.addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["health"], "HEALTHY");

    let (status, index) = get(server.addr, "/").await;
    assert_eq!(status, 200);
    assert_eq!(index["name"], "selfmon");
    assert_eq!(index["pushIntervalMs"], 2000);
}

#[tokio::test]
async fn test_stream_pushes_and_unsubscribes_on_disconnect() {
    let server = start_server(Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /api/stream HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut buffer = String::new();
    let first = timeout(Duration::from_secs(5), next_event(&mut stream, &mut buffer))
        .await
        .unwrap();
    assert_eq!(first["activeConnections"], 1);
    let second = timeout(Duration::from_secs(5), next_event(&mut stream, &mut buffer))
        .await
        .unwrap();
    assert!(second["timestamp"].is_i64());

    let (_, listing) = get(server.addr, "/api/subscribers").await;
    assert_eq!(listing["total"], 1);

    drop(stream);
    let closed = timeout(Duration::from_secs(5), async {
        while server.hub.subscriber_count() > 0 {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(closed.is_ok(), "subscriber was not removed after disconnect");
    assert_eq!(server.hub.monitor().active_connections(), 0);
}

#[tokio::test]
async fn test_graceful_shutdown_closes_open_streams() {
    let server = start_server(Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /api/stream HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buffer = String::new();
    timeout(Duration::from_secs(5), next_event(&mut stream, &mut buffer))
        .await
        .unwrap();

    server.stop.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), server.task)
        .await
        .expect("server stops with a stream open")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(server.hub.subscriber_count(), 0);
}
