//! Shared test fixtures: a small in-process HTTP server that can serve
//! bodies in delayed chunks, and assorted builders.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use barge::transfer::TransferDescriptor;
use reqwest::Url;

/// One canned response, optionally trickled out in delayed chunks.
#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    pub content_length: bool,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            chunk_size: 64 * 1024,
            chunk_delay: Duration::ZERO,
            content_length: true,
        }
    }

    /// A 200 response whose body arrives in `chunk_size` pieces with
    /// `chunk_delay` between them.
    pub fn slow(body: Vec<u8>, chunk_size: usize, chunk_delay: Duration) -> Self {
        Self {
            chunk_size,
            chunk_delay,
            ..Self::ok(body)
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok(Vec::new())
        }
    }

    /// Drops the Content-Length header; the body size is then unknown
    /// until the connection closes.
    pub fn without_content_length(mut self) -> Self {
        self.content_length = false;
        self
    }
}

/// Minimal HTTP/1.1 server bound to a random local port.
pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    pub async fn spawn(routes: HashMap<String, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let _ = serve(stream, routes).await;
                });
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn serve(mut stream: TcpStream, routes: Arc<HashMap<String, Route>>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let count = stream.read(&mut buf).await?;
        if count == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..count]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

    let Some(route) = routes.get(&path) else {
        stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
        return stream.shutdown().await;
    };

    let reason = match route.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nConnection: close\r\n",
        route.status, reason
    );
    if route.content_length {
        head.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;

    for chunk in route.body.chunks(route.chunk_size.max(1)) {
        stream.write_all(chunk).await?;
        stream.flush().await?;
        if !route.chunk_delay.is_zero() {
            tokio::time::sleep(route.chunk_delay).await;
        }
    }
    stream.shutdown().await
}

/// Creates a temporary directory for download destinations.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Builds a descriptor pointing `url` at `dir`/`name`.
pub fn descriptor(url: &str, dir: &Path, name: &str) -> TransferDescriptor {
    TransferDescriptor::new(
        Url::parse(url).expect("Failed to parse test url"),
        dir.join(name),
        name,
    )
}

/// Deterministic body content of the given length.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Polls `condition` every 10 ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
