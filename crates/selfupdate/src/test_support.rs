//! Minimal in-process HTTP responder for exercising the real client paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the responder sends for a path.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Complete response with the given status and body.
    Body { status: u16, body: Vec<u8> },
    /// 200 with no Content-Length; the body ends when the connection closes.
    Unsized(Vec<u8>),
    /// Announce `announced` bytes, send `prefix`, then hang.
    Stall { announced: u64, prefix: Vec<u8> },
}

impl Reply {
    pub(crate) fn ok(body: impl Into<Vec<u8>>) -> Self {
        Reply::Body {
            status: 200,
            body: body.into(),
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Reply::Body {
            status,
            body: Vec::new(),
        }
    }
}

/// Loopback HTTP server answering from a mutable route table.
pub(crate) struct TestServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Reply>>>,
}

impl TestServer {
    /// Absolute URL for `path` on this server.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Add or replace the reply for `path`.
    pub(crate) fn route(&self, path: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(path.to_string(), reply);
    }
}

/// Serve `routes` on a loopback port.
///
/// Unknown paths get a 404. Every connection is closed after one response.
pub(crate) async fn serve(routes: Vec<(&str, Reply)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<Mutex<HashMap<String, Reply>>> = Arc::new(Mutex::new(
        routes
            .into_iter()
            .map(|(path, reply)| (path.to_string(), reply))
            .collect(),
    ));

    let table = Arc::clone(&routes);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                let _ = respond(stream, &table).await;
            });
        }
    });

    TestServer {
        base: format!("http://{}", addr),
        routes,
    }
}

async fn respond(
    mut stream: TcpStream,
    routes: &Mutex<HashMap<String, Reply>>,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let reply = routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or(Reply::status(404));

    match reply {
        Reply::Body { status, body } => {
            let header = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(status),
                body.len()
            );
            stream.write_all(header.as_bytes()).await?;
            stream.write_all(&body).await?;
            stream.shutdown().await?;
        }
        Reply::Unsized(body) => {
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n")
                .await?;
            stream.write_all(&body).await?;
            stream.shutdown().await?;
        }
        Reply::Stall { announced, prefix } => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                announced
            );
            stream.write_all(header.as_bytes()).await?;
            stream.write_all(&prefix).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
    }
    Ok(())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
