//! One-shot message readers: `RequestReader` and `ResponseReader`.
//!
//! Each spawns a task that parses exactly one message from its source and
//! delivers it back over a one-shot channel, carrying either the parsed
//! message or the single error that can occur instead — a `Result` fills
//! both roles the design describes as separate delivery/error channels,
//! which is the natural Rust shape for "exactly one of two outcomes."
//! The source itself travels back with the result so its owner can keep
//! reading the body from the same connection afterward.
use tokio::io::AsyncBufRead;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::message::{Request, Response};

pub struct RequestReader<R> {
    delivery: oneshot::Receiver<(Result<Request, Error>, R)>,
}

impl<R> RequestReader<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn start(mut source: R) -> RequestReader<R> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = Request::parse(&mut source).await;
            let _ = tx.send((result, source));
        });
        RequestReader { delivery: rx }
    }

    /// Wait for the parsed request, returning the source alongside it so
    /// the caller can keep reading (e.g. the request body) from it.
    pub async fn recv(self) -> Result<(Request, R), Error> {
        match self.delivery.await {
            Ok((Ok(req), source)) => Ok((req, source)),
            Ok((Err(err), _)) => Err(err),
            Err(_) => Err(Error::Framing("request reader task was dropped".into())),
        }
    }
}

pub struct ResponseReader<R> {
    delivery: oneshot::Receiver<(Result<Response, Error>, R)>,
}

impl<R> ResponseReader<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn start(mut source: R) -> ResponseReader<R> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = Response::parse(&mut source).await;
            let _ = tx.send((result, source));
        });
        ResponseReader { delivery: rx }
    }

    pub async fn recv(self) -> Result<(Response, R), Error> {
        match self.delivery.await {
            Ok((Ok(res), source)) => Ok((res, source)),
            Ok((Err(err), _)) => Err(err),
            Err(_) => Err(Error::Framing("response reader task was dropped".into())),
        }
    }
}
