//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tripwire::notification::{BreakerEvent, EventKind};

/// Start a programmable HTTP backend on an ephemeral port.
///
/// Each request is answered with the `(status, body)` produced by `f`.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;

                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Receive the next breaker event, failing the test after one second.
#[allow(dead_code)]
pub async fn next_event(rx: &mut broadcast::Receiver<Value>) -> BreakerEvent {
    let value = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no event within 1s")
        .expect("bus closed");
    serde_json::from_value(value).expect("not a breaker event")
}

/// Kinds of every event already queued on `rx`.
#[allow(dead_code)]
pub fn drain_kinds(rx: &mut broadcast::Receiver<Value>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(value) = rx.try_recv() {
        let event: BreakerEvent = serde_json::from_value(value).expect("not a breaker event");
        kinds.push(event.kind);
    }
    kinds
}
