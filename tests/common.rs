//! Common test harness utilities for integration tests.

// Not all test files use all helpers; silence dead_code warnings for unused exports.
#![allow(dead_code)]

use lottery::audit::MemoryAuditSink;
use lottery::config::{Config, WindowConfig};
use lottery::lottery::LotterySession;
use lottery::time::Clock;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Session over `clock` recording into a shared in-memory sink.
pub fn session_with_sink<C: Clock>(
    clock: C,
    seed: Option<u64>,
) -> (Arc<LotterySession<C>>, MemoryAuditSink) {
    let sink = MemoryAuditSink::default();
    let session = LotterySession::new(WindowConfig::default(), clock)
        .with_audit(Arc::new(sink.clone()))
        .with_seed(seed);
    (Arc::new(session), sink)
}

/// Config bound to an ephemeral loopback port with the audit log under `dir`.
pub fn test_config(dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.http.bind = "127.0.0.1:0".into();
    cfg.audit.log_path = dir.join("lottery_log.txt");
    cfg.draw.seed = Some(7);
    cfg
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    condition()
}

/// Raw HTTP/1.1 response: status code and body.
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("json body")
    }
}

/// Send one request and read until the server closes the connection.
pub async fn http_request(addr: SocketAddr, method: &str, path: &str, form: &str) -> HttpReply {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{form}",
        form.len()
    );
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.expect("read");
    let (head, body) = raw.split_once("\r\n\r\n").expect("response head");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status code");
    HttpReply {
        status,
        body: body.to_string(),
    }
}
