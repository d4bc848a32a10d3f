//! `BodyTransfer`: pumps chunks from a [`BodyReader`] into a byte sink,
//! observing worker-wide cancellation and surfacing at most one error.
//!
//! Benign end-of-file is filtered out at the source: [`crate::body`]'s
//! fixed-length reader simply stops (no error) when the underlying
//! connection reaches EOF before the declared length, so anything that
//! reaches this pump's error channel is a genuine transport or framing
//! failure, fit to log and forward. Unlike the unbuffered channels this
//! design was ported from, `oneshot::Sender::send` never blocks, so the
//! finish signal always fires promptly whether or not anything is
//! listening on the error channel — no extra forwarding task is needed to
//! guarantee that.
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, watch};

use crate::body::BodyReader;
use crate::error::Error;

pub struct BodyTransfer {
    finish: oneshot::Receiver<()>,
    error: oneshot::Receiver<Error>,
}

impl BodyTransfer {
    /// Start pumping `reader` into `writer`. `done` is the worker's
    /// shared cancellation signal: the transfer observes it alongside
    /// chunk delivery and the reader's own error slot.
    pub fn start<W>(mut reader: BodyReader, mut writer: W, mut done: watch::Receiver<()>) -> BodyTransfer
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (finish_tx, finish_rx) = oneshot::channel();
        let (err_tx, err_rx) = oneshot::channel();
        let mut reader_error = reader.take_error();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = done.changed() => {
                        if changed.is_err() {
                            reader.cancel();
                            break;
                        }
                    }
                    chunk = reader.recv() => {
                        match chunk {
                            Some(data) => {
                                if let Err(err) = writer.write_all(&data).await {
                                    reader.cancel();
                                    let _ = err_tx.send(Error::Io(err));
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    err = &mut reader_error => {
                        if let Ok(err) = err {
                            debug!("body transfer reader error: {}", err);
                            let _ = err_tx.send(err);
                        }
                        break;
                    }
                }
            }
            let _ = writer.flush().await;
            let _ = finish_tx.send(());
        });

        BodyTransfer { finish: finish_rx, error: err_rx }
    }

    /// Wait for the transfer to terminate (naturally, on error, or on
    /// cancellation).
    pub async fn finished(self) {
        let _ = self.finish.await;
    }

    /// Take the error slot to inspect it without consuming `finished()`.
    pub fn take_error(&mut self) -> oneshot::Receiver<Error> {
        std::mem::replace(&mut self.error, oneshot::channel().1)
    }
}
