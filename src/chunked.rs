//! Chunked transfer-encoding: the decoder (raw bytes out, framing
//! stripped) and the writer. The pass-through reader that preserves
//! on-wire framing bytes lives in `body.rs`, since it needs the async
//! reader/channel plumbing shared with the fixed-length reader.
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// Parse a chunk-size line (hex digits only, CRLF already stripped).
///
/// Accepts `[0-9a-fA-F]+`. The original Go source has an acknowledged bug
/// where uppercase `'A'..'F'` are computed as if they were lowercase minus
/// 10 (`c - 'a' + 10`), which produces the wrong value. This crate uses
/// the correct formula (`c - 'A' + 10`) per the spec's explicit
/// requirement; the miscomputation is not reproduced.
pub fn parse_hex_len(line: &str) -> Result<usize, Error> {
    if line.is_empty() {
        return Err(Error::ChunkSize("empty chunk-size line".into()));
    }
    let mut len: usize = 0;
    for c in line.chars() {
        let digit = match c {
            '0'..='9' => c as usize - '0' as usize,
            'a'..='f' => c as usize - 'a' as usize + 10,
            'A'..='F' => c as usize - 'A' as usize + 10,
            _ => return Err(Error::ChunkSize(format!("invalid hex digit: {:?}", c))),
        };
        len = len * 16 + digit;
    }
    Ok(len)
}

/// Read one CRLF-terminated line, raw bytes included (the terminating
/// `\r\n` is part of the returned buffer). Shared by this module's own
/// CRLF-stripping wrapper below and by `body.rs`'s chunked pass-through
/// reader, which needs the exact on-wire bytes to replay them verbatim.
pub(crate) async fn read_raw_crlf_line<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Vec<u8>, Error> {
    let mut line = Vec::new();
    let n = r.read_until(b'\n', &mut line).await.map_err(Error::Io)?;
    if n == 0 {
        return Err(Error::Framing("unexpected EOF reading line".into()));
    }
    if line.len() < 2 || line[line.len() - 2] != b'\r' || line[line.len() - 1] != b'\n' {
        return Err(Error::Framing("line is not CRLF-terminated".into()));
    }
    Ok(line)
}

async fn read_crlf_line<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<String, Error> {
    let mut line = read_raw_crlf_line(r).await?;
    line.truncate(line.len() - 2);
    String::from_utf8(line).map_err(|_| Error::Framing("non-UTF-8 chunk-size line".into()))
}

/// Decode a full chunked-encoded body from `r`, stripping all framing
/// (chunk-size lines, CRLFs, and the terminating zero-length chunk) and
/// returning the plain body bytes.
///
/// This is the "raw-bytes-out" decoder for consumers that want the
/// decoded body rather than an exact on-wire replay (the proxy itself
/// uses the pass-through reader in `body.rs` instead, since it forwards
/// chunk framing verbatim).
pub async fn decode<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    loop {
        let line = read_crlf_line(r).await?;
        let len = parse_hex_len(&line)?;
        if len == 0 {
            // Final chunk: one more CRLF and we're done. No trailers.
            let trailer = read_crlf_line(r).await?;
            if !trailer.is_empty() {
                return Err(Error::Framing("unsupported chunk trailer".into()));
            }
            return Ok(out);
        }
        let mut buf = vec![0u8; len];
        tokio::io::AsyncReadExt::read_exact(r, &mut buf)
            .await
            .map_err(Error::Io)?;
        out.extend_from_slice(&buf);
        let trailer = read_crlf_line(r).await?;
        if !trailer.is_empty() {
            return Err(Error::Framing("expected CRLF after chunk data".into()));
        }
    }
}

/// Writes chunked transfer-encoding framing around each call to `write`.
pub struct ChunkedWriter<W> {
    w: W,
}

impl<W: AsyncWrite + Unpin> ChunkedWriter<W> {
    pub fn new(w: W) -> ChunkedWriter<W> {
        ChunkedWriter { w }
    }

    /// Write one chunk: `len(buf)` in lowercase hex, CRLF, `buf`, CRLF.
    /// Short writes to the underlying sink are retried to completion by
    /// `write_all`.
    pub async fn write(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let header = format!("{:x}\r\n", buf.len());
        self.w.write_all(header.as_bytes()).await?;
        self.w.write_all(buf).await?;
        self.w.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Write the terminating `0\r\n\r\n` chunk.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.w.write_all(b"0\r\n\r\n").await
    }
}
