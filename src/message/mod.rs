//! HTTP/1.1 message framing: request line, status line, header block, and
//! the async line reader they're built on.
//!
//! Parsing reads from any `AsyncBufRead` and is request/response-agnostic
//! below the first line; serialization writes to any `AsyncWrite`.
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::headers::{canonicalize, Headers};

/// A parsed HTTP/1.1 request.
///
/// Immutable after construction except for the hop-by-hop stripping the
/// exchange engine applies before forwarding it upstream.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: Headers,
}

/// A parsed HTTP/1.1 response.
#[derive(Debug, Clone)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

impl Response {
    /// Build one of the engine's fixed well-known responses: empty
    /// headers, `HTTP/1.1`, the given status and reason.
    pub fn fixed(status: u16, reason: &str) -> Response {
        Response {
            version: "HTTP/1.1".to_string(),
            status,
            reason: reason.to_string(),
            headers: Headers::new(),
        }
    }
}

/// Read a single CRLF-terminated line, stripping the trailing CRLF.
///
/// Rejects lines that reach EOF without a terminating CRLF, per the
/// framing rule that a bare LF (or none at all) is malformed input.
async fn read_line<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<String, Error> {
    let mut buf = Vec::new();
    let n = r.read_until(b'\n', &mut buf).await.map_err(Error::Io)?;
    if n == 0 {
        return Err(Error::Framing("unexpected EOF reading line".into()));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' || buf[buf.len() - 1] != b'\n' {
        return Err(Error::Framing("line is not CRLF-terminated".into()));
    }
    buf.truncate(buf.len() - 2);
    String::from_utf8(buf).map_err(|_| Error::Framing("non-UTF-8 line".into()))
}

/// Read zero or more `Name: value` lines up to (and consuming) the
/// terminating blank line.
async fn read_headers<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Headers, Error> {
    let mut headers = Headers::new();
    loop {
        let line = read_line(r).await?;
        if line.is_empty() {
            return Ok(headers);
        }
        let colon = line
            .find(':')
            .ok_or_else(|| Error::Framing(format!("header line missing ':': {:?}", line)))?;
        let name = line[..colon].trim().to_ascii_lowercase();
        let value = line[colon + 1..].trim().to_string();
        headers.insert(name, value);
    }
}

impl Request {
    /// Parse a request line and header block from `r`. Does not touch the
    /// body; the caller decides how to read it once headers are known.
    pub async fn parse<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Request, Error> {
        let line = read_line(r).await?;
        let mut fields = line.split(' ');
        let method = fields.next();
        let uri = fields.next();
        let version = fields.next();
        let extra = fields.next();
        let (method, uri, version) = match (method, uri, version, extra) {
            (Some(m), Some(u), Some(v), None) if !m.is_empty() && !u.is_empty() && !v.is_empty() => {
                (m.to_string(), u.to_string(), v.to_string())
            }
            _ => return Err(Error::Framing(format!("malformed request line: {:?}", line))),
        };
        let headers = read_headers(r).await?;
        Ok(Request { method, uri, version, headers })
    }

    /// Serialize the request line and header block to `w`.
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> std::io::Result<()> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version);
        for (name, value) in self.headers.iter() {
            out.push_str(&canonicalize(name));
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        w.write_all(out.as_bytes()).await
    }
}

impl Response {
    /// Parse a status line and header block from `r`.
    pub async fn parse<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Response, Error> {
        let line = read_line(r).await?;
        let mut fields = line.splitn(3, ' ');
        let version = fields.next();
        let code = fields.next();
        let rest = fields.next();
        let (version, code, reason) = match (version, code, rest) {
            (Some(v), Some(c), Some(r)) if !v.is_empty() && !c.is_empty() => {
                (v.to_string(), c, r.to_string())
            }
            _ => return Err(Error::Framing(format!("malformed status line: {:?}", line))),
        };
        let status: u16 = code
            .parse()
            .ok()
            .filter(|s| (100..600).contains(s))
            .ok_or_else(|| Error::Framing(format!("invalid status code: {:?}", code)))?;
        let headers = read_headers(r).await?;
        Ok(Response { version, status, reason, headers })
    }

    /// Serialize the status line and header block to `w`.
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> std::io::Result<()> {
        let mut out = format!("{} {} {}\r\n", self.version, self.status, self.reason);
        for (name, value) in self.headers.iter() {
            out.push_str(&canonicalize(name));
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        w.write_all(out.as_bytes()).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn parses_simple_request() {
        let input = b"GET / HTTP/1.1\r\nHost: www.google.com\r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        let req = Request::parse(&mut r).await.unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.uri, "/");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.headers.get("host"), Some("www.google.com"));
    }

    #[tokio::test]
    async fn rejects_malformed_request_line() {
        let input = b"GET /\r\nHost: x\r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        assert!(Request::parse(&mut r).await.is_err());
    }

    #[tokio::test]
    async fn rejects_header_without_colon() {
        let input = b"GET / HTTP/1.1\r\nHost www.google.com\r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        assert!(Request::parse(&mut r).await.is_err());
    }

    #[tokio::test]
    async fn parses_response_with_multiword_reason() {
        let input = b"HTTP/1.1 404 Not Found\r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        let res = Response::parse(&mut r).await.unwrap();
        assert_eq!(res.status, 404);
        assert_eq!(res.reason, "Not Found");
    }

    #[tokio::test]
    async fn rejects_status_with_bad_leading_digit() {
        let input = b"HTTP/1.1 999 Nope\r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        assert!(Response::parse(&mut r).await.is_err());
    }

    #[tokio::test]
    async fn rejects_status_line_missing_reason_field() {
        let input = b"HTTP/1.1 200\r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        assert!(Response::parse(&mut r).await.is_err());
    }

    #[tokio::test]
    async fn accepts_status_line_with_empty_reason() {
        let input = b"HTTP/1.1 200 \r\n\r\n";
        let mut r = BufReader::new(Cursor::new(&input[..]));
        let res = Response::parse(&mut r).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.reason, "");
    }

    #[tokio::test]
    async fn round_trips_request() {
        let mut headers = Headers::new();
        headers.insert("host", "example.com");
        headers.insert("content-length", "6");
        let req = Request {
            method: "POST".into(),
            uri: "/submit".into(),
            version: "HTTP/1.1".into(),
            headers,
        };
        let mut out = Vec::new();
        req.write(&mut out).await.unwrap();
        let mut r = BufReader::new(Cursor::new(out));
        let parsed = Request::parse(&mut r).await.unwrap();
        assert_eq!(parsed.method, req.method);
        assert_eq!(parsed.uri, req.uri);
        assert_eq!(parsed.headers.get("host"), Some("example.com"));
        assert_eq!(parsed.headers.get("content-length"), Some("6"));
    }

    #[tokio::test]
    async fn round_trips_response() {
        let res = Response::fixed(400, "Bad Request");
        let mut out = Vec::new();
        res.write(&mut out).await.unwrap();
        let mut r = BufReader::new(Cursor::new(out));
        let parsed = Response::parse(&mut r).await.unwrap();
        assert_eq!(parsed.status, 400);
        assert_eq!(parsed.reason, "Bad Request");
    }
}
