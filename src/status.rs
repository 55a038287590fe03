//! Plain-HTTP status endpoint
//!
//! Connections that are not WebSocket upgrades are answered with the number
//! of active rooms (`GET /` or `GET /health`) or a 404.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use tokio_tungstenite::tungstenite::http::{Method, Response, StatusCode, Uri};
use tracing::debug;

use crate::error::AppError;

/// Largest request head inspected before deciding
pub const MAX_HEAD_LEN: usize = 16 * 1024;

/// Most headers parsed from a request head
const MAX_HEADERS: usize = 124;

/// Give up waiting for a full request head after this long
const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while the request head is still arriving
const PEEK_INTERVAL: Duration = Duration::from_millis(10);

/// Request line and upgrade flag of a complete request head
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestLine {
    method: String,
    path: String,
    upgrade: bool,
}

/// Parse a request head, `Ok(None)` while it is still incomplete
fn parse_request(bytes: &[u8]) -> Result<Option<RequestLine>, httparse::Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    if req.parse(bytes)?.is_partial() {
        return Ok(None);
    }

    let upgrade = req.headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case("upgrade")
            && std::str::from_utf8(header.value)
                .is_ok_and(|value| value.trim().eq_ignore_ascii_case("websocket"))
    });
    let path = req
        .path
        .and_then(|path| path.parse::<Uri>().ok())
        .map(|uri| uri.path().to_string())
        .unwrap_or_default();

    Ok(Some(RequestLine {
        method: req.method.unwrap_or_default().to_string(),
        path,
        upgrade,
    }))
}

/// Request head bytes seen so far, still unread on the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    bytes: Vec<u8>,
}

impl RequestHead {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Number of bytes peeked
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The head filled the whole peek buffer
    pub fn is_truncated(&self) -> bool {
        self.bytes.len() >= MAX_HEAD_LEN
    }

    /// Whether the request asks for a WebSocket upgrade
    ///
    /// Heads too large to inspect are handed to the WebSocket handshake,
    /// which rejects them if they are not upgrades.
    pub fn is_websocket_upgrade(&self) -> bool {
        if self.is_truncated() {
            return true;
        }
        match parse_request(&self.bytes) {
            Ok(Some(req)) => req.upgrade,
            Ok(None) => false,
            Err(httparse::Error::TooManyHeaders) => true,
            Err(_) => false,
        }
    }

    fn is_status_request(&self) -> bool {
        matches!(
            parse_request(&self.bytes),
            Ok(Some(req)) if req.method == Method::GET.as_str() && (req.path == "/" || req.path == "/health")
        )
    }
}

/// Read the request head without consuming it
///
/// Returns whatever arrived before the head was complete, the size cap, EOF,
/// or the timeout, whichever comes first. An idle client yields an empty head.
pub async fn peek_request_head(stream: &TcpStream) -> Result<RequestHead, AppError> {
    let mut buf = vec![0u8; MAX_HEAD_LEN];
    let mut seen = 0;
    let peek = async {
        loop {
            let n = stream.peek(&mut buf).await?;
            seen = n;
            if n == 0 || n == MAX_HEAD_LEN || !matches!(parse_request(&buf[..n]), Ok(None)) {
                return Ok::<(), std::io::Error>(());
            }
            tokio::time::sleep(PEEK_INTERVAL).await;
        }
    };

    let peeked = tokio::time::timeout(HEAD_TIMEOUT, peek).await;
    match peeked {
        Ok(result) => result?,
        Err(_) => debug!("Request head incomplete after {:?} ({} bytes)", HEAD_TIMEOUT, seen),
    }

    buf.truncate(seen);
    Ok(RequestHead::new(buf))
}

/// Build the response for a plain request
pub fn status_response(head: &RequestHead, room_count: usize) -> Result<Response<String>, AppError> {
    let (status, body) = if head.is_status_request() {
        (StatusCode::OK, format!("Active rooms: {}", room_count))
    } else {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    };

    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .header(CONTENT_LENGTH, body.len().to_string())
        .header(CONNECTION, "close")
        .body(body)?;
    Ok(response)
}

/// Serialize a response as HTTP/1.1 bytes
pub fn write_response(response: &Response<String>) -> Vec<u8> {
    let mut out = format!("{:?} {}\r\n", response.version(), response.status()).into_bytes();
    for (name, value) in response.headers() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(response.body().as_bytes());
    out
}

/// Consume the request head and write the response
pub async fn respond(mut stream: TcpStream, head: &RequestHead, response: &Response<String>) -> Result<(), AppError> {
    let mut discard = vec![0u8; head.len()];
    stream.read_exact(&mut discard).await?;
    stream.write_all(&write_response(response)).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &str = "GET /ABCD?role=host HTTP/1.1\r\nHost: x\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
    const PLAIN: &str = "GET / HTTP/1.1\r\nHost: x\r\n\r\n";

    fn head(text: &str) -> RequestHead {
        RequestHead::new(text.as_bytes().to_vec())
    }

    fn rendered(head: &RequestHead, room_count: usize) -> String {
        let response = status_response(head, room_count).unwrap();
        String::from_utf8(write_response(&response)).unwrap()
    }

    #[test]
    fn test_detects_upgrade() {
        assert!(head(UPGRADE).is_websocket_upgrade());
        assert!(head("GET / HTTP/1.1\r\nupgrade:  WebSocket\r\n\r\n").is_websocket_upgrade());
        assert!(!head(PLAIN).is_websocket_upgrade());
        assert!(!head("GET / HTTP/1.1\r\nHost").is_websocket_upgrade());
        assert!(!head("").is_websocket_upgrade());
    }

    #[test]
    fn test_large_head_still_upgrades() {
        let cookie = "c".repeat(6000);
        let text = format!(
            "GET /ABCD?role=client HTTP/1.1\r\nHost: x\r\nCookie: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n",
            cookie
        );
        assert!(head(&text).is_websocket_upgrade());

        let truncated = RequestHead::new(format!("GET / HTTP/1.1\r\nCookie: {}", "c".repeat(MAX_HEAD_LEN)).into_bytes()[..MAX_HEAD_LEN].to_vec());
        assert!(truncated.is_truncated());
        assert!(truncated.is_websocket_upgrade());

        let many: String = (0..200).map(|n| format!("X-{}: v\r\n", n)).collect();
        assert!(head(&format!("GET / HTTP/1.1\r\n{}\r\n", many)).is_websocket_upgrade());
    }

    #[test]
    fn test_status_ok() {
        let response = rendered(&head(PLAIN), 3);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("content-length: 15\r\n"));
        assert!(response.ends_with("\r\n\r\nActive rooms: 3"));

        let response = rendered(&head("GET /health?verbose=1 HTTP/1.1\r\n\r\n"), 0);
        assert!(response.ends_with("Active rooms: 0"));
    }

    #[test]
    fn test_status_not_found() {
        assert!(rendered(&head("GET /metrics HTTP/1.1\r\n\r\n"), 1).starts_with("HTTP/1.1 404 Not Found"));
        assert!(rendered(&head("POST / HTTP/1.1\r\n\r\n"), 1).starts_with("HTTP/1.1 404"));
        assert!(rendered(&head(""), 1).starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_peek_and_respond_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(PLAIN.as_bytes()).await.unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        });

        let (stream, _) = listener.accept().await.unwrap();
        let peeked = peek_request_head(&stream).await.unwrap();
        assert_eq!(peeked, head(PLAIN));
        assert!(!peeked.is_websocket_upgrade());
        let response = status_response(&peeked, 2).unwrap();
        respond(stream, &peeked, &response).await.unwrap();

        let response = client.await.unwrap();
        assert!(response.ends_with("Active rooms: 2"));
    }

    #[tokio::test]
    async fn test_idle_client_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _idle = TcpStream::connect(addr).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();

        let peeked = tokio::time::timeout(HEAD_TIMEOUT + Duration::from_secs(3), peek_request_head(&stream))
            .await
            .expect("peek must give up after the head timeout")
            .unwrap();
        assert!(peeked.is_empty());
        assert!(!peeked.is_websocket_upgrade());
    }
}
