//! A local HTTP server with canned responses for provider tests.
//!
//! Routes are matched on the request path plus an optional query fragment,
//! first match wins. Unmatched requests get `404 Not Found`. Every request
//! head is recorded so tests can check query parameters and headers.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Route {
    path: String,
    query: Option<String>,
    status: u16,
    body: Vec<u8>,
}

impl Route {
    fn matches(&self, target: &str) -> bool {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        path == self.path && self.query.as_deref().is_none_or(|q| query.contains(q))
    }
}

/// One request received by a [`MockServer`].
#[derive(Debug, Clone)]
pub struct Request {
    /// Request target, path plus query string.
    pub target: String,
    /// The raw request head, request line and headers.
    pub head: String,
}

#[derive(Debug, Default)]
struct State {
    routes: Vec<Route>,
    requests: Vec<Request>,
}

/// Canned-response HTTP/1.1 server bound to a random local port.
///
/// The server stops when dropped.
#[derive(Debug)]
pub struct MockServer {
    addr: std::net::SocketAddr,
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Bind to `127.0.0.1:0` and start serving.
    ///
    /// # Panics
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server addr");
        let state = Arc::new(Mutex::new(State::default()));

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&shared)));
            }
        });

        Self { addr, state, task }
    }

    /// Base URL, `http://127.0.0.1:<port>`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer requests for `path` with `status` and `body`.
    pub fn mock(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.push(path, None, status, body.into());
    }

    /// Answer requests for `path` whose query contains `query`.
    pub fn mock_query(&self, path: &str, query: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.push(path, Some(query.to_string()), status, body.into());
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.state).requests.clone()
    }

    /// Requests whose path is `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.target.split('?').next() == Some(path))
            .collect()
    }

    fn push(&self, path: &str, query: Option<String>, status: u16, body: Vec<u8>) {
        lock(&self.state).routes.push(Route {
            path: path.to_string(),
            query,
            status,
            body,
        });
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(state: &Mutex<State>) -> std::sync::MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn serve(mut socket: TcpStream, state: Arc<Mutex<State>>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&head).into_owned();
    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    let (status, body) = {
        let mut state = lock(&state);
        state.requests.push(Request {
            target: target.clone(),
            head: head.clone(),
        });
        state
            .routes
            .iter()
            .find(|route| route.matches(&target))
            .map_or((404, b"not found".to_vec()), |route| (route.status, route.body.clone()))
    };

    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reason(status),
        body.len()
    );
    if socket.write_all(response.as_bytes()).await.is_ok() && socket.write_all(&body).await.is_ok()
    {
        let _ = socket.shutdown().await;
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// A 3x2 PNG header (IHDR only; enough for sniffing).
#[must_use]
pub fn png_3x2() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 13]);
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&3u32.to_be_bytes());
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}
