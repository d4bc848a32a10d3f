//! The asynchronous body sources (`BodyReader` variants) used by the
//! exchange engine's body-transfer pumps.
//!
//! Each variant runs as its own spawned task, delivering byte chunks over
//! an mpsc channel and, on failure, a single error over a one-shot
//! channel. `Cancel()` is modeled as dropping (or explicitly firing) a
//! one-shot signal the task selects against between reads, so a transfer
//! can stop a reader promptly without waiting for it to reach EOF.
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};

use crate::chunked::{parse_hex_len, read_raw_crlf_line};
use crate::error::Error;

/// Which framing a body source reads.
#[derive(Debug, Clone)]
pub enum BodyKind {
    /// Read exactly `n` bytes, then stop silently (EOF before `n` is not
    /// an error; see the exchange engine's error policy).
    FixedLength(u64),
    /// Forward a chunked body byte-for-byte, framing included.
    ChunkedPassthrough,
    /// No body framing is present; watch the source for EOF/disconnect
    /// while the worker waits on the upstream response.
    ClientConnectionWatcher,
}

/// A running body source: a stream of byte chunks plus a single error
/// slot, backed by a task spawned by [`BodyReader::start`].
pub struct BodyReader {
    chunks: mpsc::Receiver<Bytes>,
    error: oneshot::Receiver<Error>,
    cancel: Option<oneshot::Sender<()>>,
}

impl BodyReader {
    /// Launch the reader task over `source`, reading at most
    /// `chunk_size` bytes at a time for the fixed-length variant.
    pub fn start<R>(kind: BodyKind, mut source: R, chunk_size: usize) -> BodyReader
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (chunk_tx, chunk_rx) = mpsc::channel(8);
        let (err_tx, err_rx) = oneshot::channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = match kind {
                BodyKind::FixedLength(n) => {
                    run_fixed_length(&mut source, n, chunk_size, &chunk_tx, &mut cancel_rx).await
                }
                BodyKind::ChunkedPassthrough => {
                    run_chunked_passthrough(&mut source, &chunk_tx, &mut cancel_rx).await
                }
                BodyKind::ClientConnectionWatcher => {
                    run_connection_watcher(&mut source, &mut cancel_rx).await
                }
            };
            if let Err(err) = result {
                let _ = err_tx.send(err);
            }
        });

        BodyReader {
            chunks: chunk_rx,
            error: err_rx,
            cancel: Some(cancel_tx),
        }
    }

    /// Receive the next chunk, or `None` once the reader has finished
    /// (naturally or via cancellation).
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.chunks.recv().await
    }

    /// Take the error receiver so a caller can await it independently of
    /// `recv`. May only be called once.
    pub fn take_error(&mut self) -> oneshot::Receiver<Error> {
        std::mem::replace(&mut self.error, oneshot::channel().1)
    }

    /// Signal the reader task to stop at its next cancellation point.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

/// `true` once `cancel_rx` has fired or its sender was dropped.
fn cancelled(cancel_rx: &mut oneshot::Receiver<()>) -> bool {
    matches!(
        cancel_rx.try_recv(),
        Ok(()) | Err(oneshot::error::TryRecvError::Closed)
    )
}

async fn run_fixed_length<R>(
    source: &mut R,
    mut remaining: u64,
    chunk_size: usize,
    chunk_tx: &mpsc::Sender<Bytes>,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    while remaining > 0 {
        let want = std::cmp::min(remaining, chunk_size as u64) as usize;
        let read = tokio::select! {
            _ = &mut *cancel_rx => return Ok(()),
            read = source.read(&mut buf[..want]) => read.map_err(Error::Io)?,
        };
        if read == 0 {
            // EOF before the declared length is silently accepted.
            return Ok(());
        }
        remaining -= read as u64;
        if chunk_tx.send(Bytes::copy_from_slice(&buf[..read])).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}

async fn run_chunked_passthrough<R>(
    source: &mut R,
    chunk_tx: &mpsc::Sender<Bytes>,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        if cancelled(cancel_rx) {
            return Ok(());
        }
        let size_line = tokio::select! {
            _ = &mut *cancel_rx => return Ok(()),
            line = read_raw_crlf_line(source) => line?,
        };
        let text = std::str::from_utf8(&size_line[..size_line.len() - 2])
            .map_err(|_| Error::Framing("non-UTF-8 chunk-size line".into()))?;
        let len = parse_hex_len(text)?;
        if chunk_tx.send(Bytes::from(size_line)).await.is_err() {
            return Ok(());
        }
        if len == 0 {
            let trailer = read_raw_crlf_line(source).await?;
            if trailer.len() != 2 {
                return Err(Error::Framing("unsupported chunk trailer".into()));
            }
            let _ = chunk_tx.send(Bytes::from(trailer)).await;
            return Ok(());
        }
        let mut data = vec![0u8; len + 2];
        tokio::select! {
            _ = &mut *cancel_rx => return Ok(()),
            read = source.read_exact(&mut data) => read.map_err(Error::Io)?,
        };
        if data[len] != b'\r' || data[len + 1] != b'\n' {
            return Err(Error::Framing("expected CRLF after chunk data".into()));
        }
        if chunk_tx.send(Bytes::from(data)).await.is_err() {
            return Ok(());
        }
    }
}

async fn run_connection_watcher<R>(
    source: &mut R,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut probe = [0u8; 1];
    let read = tokio::select! {
        _ = &mut *cancel_rx => return Ok(()),
        read = source.read(&mut probe) => read.map_err(Error::Io)?,
    };
    if read == 0 {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "client closed connection while waiting for upstream response",
        )));
    }
    Err(Error::Framing(
        "unexpected data on client connection with no pending body".into(),
    ))
}
