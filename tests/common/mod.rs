//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use cache_proxy::{CacheProxy, ProxyConfig, RunningProxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// What a stub upstream answers for one request.
#[derive(Debug, Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(&'static str, &'static str)>,
    pub delay: Option<Duration>,
    pub chunked: bool,
}

impl StubReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: Vec::new(),
            delay: None,
            chunked: false,
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Send the body with `Transfer-Encoding: chunked` instead of a length.
    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }
}

/// A raw-TCP upstream that counts fetches and records request heads.
pub struct StubUpstream {
    pub addr: SocketAddr,
    fetches: Arc<AtomicU32>,
    heads: Arc<Mutex<Vec<String>>>,
}

impl StubUpstream {
    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Request heads received so far, lowercased.
    pub fn heads(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Request target (`/path?query`) from a raw request head.
pub fn request_target(head: &str) -> &str {
    head.split_whitespace().nth(1).unwrap_or("/")
}

/// Start a programmable stub upstream on an ephemeral port.
pub async fn start_stub_upstream<F>(reply: F) -> StubUpstream
where
    F: Fn(&str) -> StubReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let fetches = Arc::new(AtomicU32::new(0));
    let heads = Arc::new(Mutex::new(Vec::new()));
    let reply = Arc::new(reply);

    let stub = StubUpstream {
        addr,
        fetches: fetches.clone(),
        heads: heads.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let reply = reply.clone();
            let fetches = fetches.clone();
            let heads = heads.clone();
            tokio::spawn(async move {
                let Some(head) = read_head(&mut socket).await else {
                    return;
                };
                fetches.fetch_add(1, Ordering::SeqCst);
                heads.lock().unwrap().push(head.to_ascii_lowercase());

                let reply = reply(&head);
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }

                let reason = StatusCode::from_u16(reply.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let framing = if reply.chunked {
                    "Transfer-Encoding: chunked".to_string()
                } else {
                    format!("Content-Length: {}", reply.body.len())
                };
                let mut response = format!(
                    "HTTP/1.1 {} {}\r\n{}\r\nConnection: close\r\n",
                    reply.status, reason, framing
                );
                for (name, value) in &reply.headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str("\r\n");
                if reply.chunked {
                    response.push_str(&format!("{:x}\r\n{}\r\n0\r\n\r\n", reply.body.len(), reply.body));
                } else {
                    response.push_str(&reply.body);
                }

                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    stub
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Address of a port nothing listens on.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A fresh cache directory, removed when dropped.
pub fn scratch_dir() -> TempDir {
    TempDir::new().unwrap()
}

pub fn proxy_config(upstream_base: &str, cache_root: &Path) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.prefixes = vec!["127.0.0.1:0".to_string()];
    config.listener.drain_timeout_secs = 2;
    config.upstream.base_url = upstream_base.to_string();
    config.cache.root = cache_root.to_path_buf();
    config
}

/// Start a proxy and return it with the base URL of its first listener.
pub async fn start_proxy(config: ProxyConfig) -> (RunningProxy, String) {
    let running = CacheProxy::new(config).start().await.unwrap();
    let url = format!("http://{}", running.local_addrs()[0]);
    (running, url)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
