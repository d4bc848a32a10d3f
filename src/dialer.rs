//! The upstream dialer.
//!
//! The original source keeps a process-wide mutable `serverDialer`
//! variable that tests swap out before accepting connections. That's not
//! viable once connections are handled concurrently on a shared runtime,
//! so it's replaced by a `Dialer` trait injected into each `Worker` at
//! construction time; tests supply a fake implementation instead of
//! mutating global state.
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::error::Error;

/// A boxed, already-awaited connect attempt.
pub type DialFuture = Pin<Box<dyn Future<Output = Result<TcpStream, Error>> + Send>>;

/// Something that can open a byte-stream connection to `addr`.
///
/// `addr` is already `host:port` normalized by [`crate::host`].
pub trait Dialer: Send + Sync {
    fn dial(&self, addr: String) -> DialFuture;
}

/// The proxy's default dialer: a plain TCP connect.
#[derive(Debug, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, addr: String) -> DialFuture {
        Box::pin(async move {
            TcpStream::connect(&addr)
                .await
                .map_err(|err| Error::Dial(addr, err))
        })
    }
}

/// Convenience alias for the trait-object form every `Worker` holds.
pub type SharedDialer = Arc<dyn Dialer>;
