//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use selective_proxy::config::AppConfig;
use selective_proxy::http::HttpServer;
use selective_proxy::net::Listener;
use selective_proxy::{ProxySession, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const TEST_USER_AGENT: &str = "apt-host-test/1.0";

/// A request as seen by a mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(k, _)| k.as_str()).collect()
    }
}

/// A raw-TCP upstream that records every request it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Start a programmable upstream. The handler owns the socket after the
/// request has been read and writes whatever response the test needs.
pub async fn start_upstream<F, Fut>(handler: F) -> MockUpstream
where
    F: Fn(RecordedRequest, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            let recorded = Arc::clone(&recorded);
            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    recorded.lock().unwrap().push(request.clone());
                    handler(request, socket).await;
                }
            });
        }
    });

    MockUpstream { addr, requests }
}

/// Upstream that answers every request with a fixed 200 body.
pub async fn start_fixed_upstream(body: &'static str) -> MockUpstream {
    start_upstream(move |_, mut socket| async move {
        respond(&mut socket, "200 OK", &[("content-type", "text/plain")], body.as_bytes()).await;
    })
    .await
}

/// Write a complete, non-persistent HTTP/1.1 response.
pub async fn respond(socket: &mut TcpStream, status: &str, headers: &[(&str, &str)], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!("content-length: {}\r\nconnection: close\r\n\r\n", body.len()));

    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(body).await;
    let _ = socket.shutdown().await;
}

/// Write the head of a chunked response; the caller sends the chunks.
pub async fn respond_chunked_head(socket: &mut TcpStream, headers: &[(&str, &str)]) {
    let mut head = String::from("HTTP/1.1 200 OK\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("transfer-encoding: chunked\r\nconnection: close\r\n\r\n");
    let _ = socket.write_all(head.as_bytes()).await;
}

/// Write one chunk of a chunked body.
pub async fn write_chunk(socket: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    socket
        .write_all(format!("{:x}\r\n", data.len()).as_bytes())
        .await?;
    socket.write_all(data).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await
}

/// Running proxy host; shuts down when dropped.
pub struct ProxyHarness {
    pub addr: SocketAddr,
    pub session: ProxySession,
    shutdown: Shutdown,
    _data: tempfile::TempDir,
}

impl ProxyHarness {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for ProxyHarness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy host with `upstreams` pinned to local mock servers.
pub async fn start_proxy(upstreams: &[(&str, SocketAddr)], timeout: Duration) -> ProxyHarness {
    let data = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.drain_timeout_secs = 1;
    config.proxy.timeout_ms = timeout.as_millis() as u64;
    config.proxy.user_agent = TEST_USER_AGENT.into();
    config.store.data_dir = Some(data.path().to_path_buf());

    let mut builder = ProxySession::builder(config.proxy.partition.clone())
        .user_agent(TEST_USER_AGENT)
        .plaintext_upstreams();
    for (host, addr) in upstreams {
        builder = builder.resolve(*host, *addr);
    }
    let session = builder.build().unwrap();

    let server = HttpServer::with_session(config.clone(), session.clone());
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    ProxyHarness {
        addr,
        session,
        shutdown,
        _data: data,
    }
}

/// Client that leaves encodings alone so relayed headers can be inspected.
pub fn raw_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .no_zstd()
        .build()
        .unwrap()
}

/// A response read straight off the socket.
#[derive(Debug)]
pub struct RawResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Send `request` verbatim and collect everything until the peer closes.
pub async fn send_raw(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    read_until_closed(&mut stream).await
}

/// Read until EOF; a reset counts as the end of the stream.
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return out,
            Ok(n) => out.extend_from_slice(&buf[..n]),
        }
    }
}

pub fn parse_response(raw: &[u8]) -> RawResponse {
    let head_end = find(raw, b"\r\n\r\n").expect("incomplete response head");
    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default().to_string();
    let headers = parse_headers(lines);
    let rest = &raw[head_end + 4..];

    let body = if header_value(&headers, "transfer-encoding").is_some_and(|v| v.contains("chunked")) {
        decode_chunked(rest).expect("incomplete chunked body").0
    } else if let Some(len) = header_value(&headers, "content-length").and_then(|v| v.parse().ok()) {
        rest[..len].to_vec()
    } else {
        rest.to_vec()
    };

    RawResponse {
        status_line,
        headers,
        body,
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&raw, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers = parse_headers(lines);
    let mut body = raw[head_end + 4..].to_vec();

    if header_value(&headers, "transfer-encoding").is_some_and(|v| v.contains("chunked")) {
        loop {
            if let Some((decoded, _)) = decode_chunked(&body) {
                body = decoded;
                break;
            }
            let n = socket.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            body.extend_from_slice(&buf[..n]);
        }
    } else if let Some(len) = header_value(&headers, "content-length").and_then(|v| v.parse::<usize>().ok()) {
        while body.len() < len {
            let n = socket.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            body.extend_from_slice(&buf[..n]);
        }
        body.truncate(len);
    }

    Some(RecordedRequest {
        request_line,
        headers,
        body,
    })
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect()
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Decode a complete chunked body; `None` until the last chunk has arrived.
fn decode_chunked(mut data: &[u8]) -> Option<(Vec<u8>, usize)> {
    let total = data.len();
    let mut out = Vec::new();
    loop {
        let line_end = find(data, b"\r\n")?;
        let size_field = std::str::from_utf8(&data[..line_end]).ok()?;
        let size = usize::from_str_radix(size_field.split(';').next()?.trim(), 16).ok()?;
        data = &data[line_end + 2..];
        if size == 0 {
            let trailer_end = find(data, b"\r\n")?;
            data = &data[trailer_end + 2..];
            return Some((out, total - data.len()));
        }
        if data.len() < size + 2 {
            return None;
        }
        out.extend_from_slice(&data[..size]);
        data = &data[size + 2..];
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Wait briefly so spawned servers are accepting.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
