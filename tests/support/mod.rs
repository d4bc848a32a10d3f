//! Shared helpers for the integration tests: a minimal raw-socket upstream
//! stub, a real POST-echo origin, and the `size_to_int` parser used by the
//! original load-generation server's `/chunked?size=...` query parameter.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use httprelay::dialer::{DialFuture, Dialer};
use httprelay::message::{Request, Response};
use httprelay::{Config, Headers, Worker};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Parse a size string with an optional `k`/`m`/`g` suffix (decimal,
/// matching the original load-generation server's query parameter, not
/// binary kibi/mebi units).
pub fn size_to_int(s: &str) -> Result<i64, String> {
    if s.is_empty() {
        return Err("invalid size".into());
    }
    let (digits, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'k' => (&s[..s.len() - 1], 1_000),
        b'm' => (&s[..s.len() - 1], 1_000_000),
        b'g' => (&s[..s.len() - 1], 1_000_000_000),
        _ => (s, 1),
    };
    digits
        .parse::<i64>()
        .map(|n| n * multiplier)
        .map_err(|err| err.to_string())
}

/// Start a TCP listener that, for each accepted connection, reads
/// whatever the client sends until the connection is either fully
/// consumed or `leading_read_size` bytes have been read, then writes
/// `response` verbatim and closes. Good enough to stand in for the
/// "origin server" in the end-to-end proxy scenarios, which only care
/// about what is written back.
pub async fn spawn_fixed_upstream(response: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            // Drain the request so the client's write side doesn't block;
            // don't bother parsing it, these stubs only test the response path.
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response).await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

/// Like [`spawn_fixed_upstream`], but records everything the proxy writes
/// to it (request line, headers, and body) instead of discarding it, so a
/// test can assert on exactly what was forwarded upstream. Reads until
/// 200ms pass with no new bytes, since the proxy never closes its write
/// half of the upstream connection on its own.
pub async fn spawn_capturing_upstream(response: &'static [u8]) -> (SocketAddr, Arc<Mutex<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let captured_task = captured.clone();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 8192];
            loop {
                match tokio::time::timeout(Duration::from_millis(200), socket.read(&mut buf)).await {
                    Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
                    Ok(Ok(n)) => captured_task.lock().unwrap().extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(response).await;
            let _ = socket.shutdown().await;
        }
    });
    (addr, captured)
}

/// A real (if minimal) HTTP/1.1 origin: parses the request it receives and,
/// for `POST`, echoes the request body back as the response body with a
/// matching `Content-Length`; any other method gets `400 Bad Request`.
/// Grounded on `examples/original_source/test_server/post_echo_handler.go`
/// (`io.Copy(w, req.Body)` gated on `req.Method != "POST"`). Reuses the
/// crate's own `Request`/`Response` framing rather than hand-rolling a
/// second parser just for this stub.
pub async fn spawn_post_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            let (read_half, mut write_half) = socket.into_split();
            let mut reader = BufReader::new(read_half);
            let request = match Request::parse(&mut reader).await {
                Ok(req) => req,
                Err(_) => return,
            };
            let content_length: usize = request
                .headers
                .get("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let mut body = vec![0u8; content_length];
            if content_length > 0 && reader.read_exact(&mut body).await.is_err() {
                return;
            }

            let response = if request.method != "POST" {
                Response::fixed(400, "Bad Request")
            } else {
                let mut headers = Headers::new();
                headers.insert("content-length", body.len().to_string());
                Response {
                    version: "HTTP/1.1".to_string(),
                    status: 200,
                    reason: "OK".to_string(),
                    headers,
                }
            };
            let echoes_body = request.method == "POST";
            if response.write(&mut write_half).await.is_ok() && echoes_body {
                let _ = write_half.write_all(&body).await;
            }
            let _ = write_half.shutdown().await;
        }
    });
    addr
}

/// A dialer that redirects every connection attempt to a single fixed
/// address, regardless of the `Host` header the proxy resolved.
pub struct FixedDialer {
    pub addr: SocketAddr,
}

impl Dialer for FixedDialer {
    fn dial(&self, _addr: String) -> DialFuture {
        let target = self.addr;
        Box::pin(async move {
            TcpStream::connect(target)
                .await
                .map_err(|err| httprelay::Error::Dial(target.to_string(), err))
        })
    }
}

/// A dialer that panics if it is ever invoked, for asserting that a
/// semantic-error path (missing `Host`, unsupported method) rejects the
/// request before attempting to dial upstream at all.
pub struct PanicDialer;

impl Dialer for PanicDialer {
    fn dial(&self, addr: String) -> DialFuture {
        panic!("dialer should not have been called, tried to dial {:?}", addr);
    }
}

/// Start the proxy itself on an ephemeral port, dialing everything
/// through `dialer`. Returns the address clients should connect to.
pub async fn spawn_proxy(dialer: Arc<dyn Dialer>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config::default();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let worker = Worker::new(dialer.clone(), config.clone());
            tokio::spawn(async move {
                worker.run(socket).await;
            });
        }
    });
    addr
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn size_to_int_literal_cases() {
        assert_eq!(size_to_int("30"), Ok(30));
        assert_eq!(size_to_int("100k"), Ok(100_000));
        assert_eq!(size_to_int("6m"), Ok(6_000_000));
        assert!(size_to_int("").is_err());
        assert!(size_to_int("1h").is_err());
        assert!(size_to_int("a").is_err());
    }
}
