//! The exchange engine: one `Worker` per accepted client connection,
//! driving a single request/response exchange end to end.
//!
//! The design describes this as an explicit state machine (waitForRequest
//! -> requestReceived -> waitForResponse -> responseReceived ->
//! receiveBody -> sendErrorResponse -> finishWorker). Rust's ownership
//! makes the "never revisits an earlier state" invariant structural
//! rather than asserted: each step below consumes the value the previous
//! one produced (the request, the dialed connection, the response), so
//! there is nothing left to go back to.
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::body::{BodyKind, BodyReader};
use crate::config::Config;
use crate::dialer::SharedDialer;
use crate::error::Error;
use crate::headers::{strip_hop_by_hop, Headers};
use crate::host::append_port_if_needed;
use crate::message::{Request, Response};
use crate::reader::{RequestReader, ResponseReader};
use crate::transfer::BodyTransfer;

const SUPPORTED_METHODS: &[&str] = &["GET", "HEAD", "POST"];

/// Decide which `BodyReader` variant a message's headers call for.
///
/// `Content-Length` wins over `Transfer-Encoding` if (incorrectly) both
/// are present, matching the engine's documented priority. Returns
/// `Ok(None)` when the message has no body framing at all.
fn create_body_reader_kind(headers: &Headers) -> Result<Option<BodyKind>, Error> {
    if let Some(value) = headers.get("content-length") {
        let n: u64 = value
            .parse()
            .map_err(|_| Error::InvalidContentLength(value.to_string()))?;
        return Ok(Some(BodyKind::FixedLength(n)));
    }
    if headers
        .get("transfer-encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
    {
        return Ok(Some(BodyKind::ChunkedPassthrough));
    }
    Ok(None)
}

/// Drives one client connection through a single request/response
/// exchange and closes both sockets when it finishes.
pub struct Worker {
    dialer: SharedDialer,
    config: Config,
}

/// Everything `requestReceived` hands off to `waitForResponse`.
struct Exchange {
    client_transfer: BodyTransfer,
    upstream_read: BufReader<OwnedReadHalf>,
}

impl Worker {
    pub fn new(dialer: SharedDialer, config: Config) -> Worker {
        Worker { dialer, config }
    }

    /// Run the full exchange over `client`. Never panics on a bad
    /// exchange: every framing, semantic, or upstream failure resolves to
    /// a fixed response (or, after response headers are already on the
    /// wire, a silent teardown) and a return.
    pub async fn run(&self, client: TcpStream) {
        let (client_read, mut client_write) = client.into_split();
        let client_read = BufReader::new(client_read);
        let (done_tx, done_rx) = watch::channel(());

        // waitForRequest
        let request_reader = RequestReader::start(client_read);
        let (request, client_read) = match request_reader.recv().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("request parse failed: {}", err);
                send_fixed(&mut client_write, 500, "Internal Server Error").await;
                return;
            }
        };

        // requestReceived
        let exchange = match self.start_exchange(request, client_read, done_rx.clone()).await {
            Ok(exchange) => exchange,
            Err((status, reason)) => {
                send_fixed(&mut client_write, status, reason).await;
                return;
            }
        };
        let Exchange { mut client_transfer, upstream_read } = exchange;

        // waitForResponse
        let mut client_error = client_transfer.take_error();
        let response_reader = ResponseReader::start(upstream_read);
        let (mut response, upstream_read) = tokio::select! {
            result = response_reader.recv() => match result {
                Ok(pair) => pair,
                Err(err) => {
                    warn!("response parse failed: {}", err);
                    send_fixed(&mut client_write, 500, "Internal Server Error").await;
                    drop(done_tx);
                    client_transfer.finished().await;
                    return;
                }
            },
            err = &mut client_error => {
                if let Ok(err) = err {
                    warn!("client body transfer failed while awaiting response: {}", err);
                }
                drop(done_tx);
                client_transfer.finished().await;
                return;
            }
        };

        // responseReceived
        strip_hop_by_hop(&mut response.headers);
        if let Err(err) = response.write(&mut client_write).await {
            debug!("failed writing response to client: {}", err);
            drop(done_tx);
            client_transfer.finished().await;
            return;
        }
        let server_transfer = match create_body_reader_kind(&response.headers) {
            Ok(Some(kind)) => {
                let reader = BodyReader::start(kind, upstream_read, self.config.body_chunk_size);
                Some(BodyTransfer::start(reader, client_write, done_rx.clone()))
            }
            Ok(None) => None,
            Err(err) => {
                debug!("response has unusable body framing, forwarding without a body: {}", err);
                None
            }
        };

        // receiveBody: drain the response body to completion first, while
        // `done` is still open, so a real transfer isn't cut short. Only
        // then close `done` and wait for the client-side transfer: for a
        // real request body it has very likely already finished, and for
        // a `ClientConnectionWatcher` (no request body) it never finishes
        // on its own, it only resolves once cancelled here.
        if let Some(server_transfer) = server_transfer {
            server_transfer.finished().await;
        }
        drop(done_tx);
        client_transfer.finished().await;

        // finishWorker: both sockets close as their owning values go out
        // of scope.
        debug!("exchange finished");
    }

    /// requestReceived: validate the method, resolve and dial the
    /// upstream, strip hop-by-hop headers, forward the request, and start
    /// the client-to-server body transfer (or connection watcher).
    async fn start_exchange(
        &self,
        mut request: Request,
        client_read: BufReader<OwnedReadHalf>,
        done_rx: watch::Receiver<()>,
    ) -> Result<Exchange, (u16, &'static str)> {
        if !SUPPORTED_METHODS.contains(&request.method.as_str()) {
            return Err((400, "Bad Request"));
        }
        let host = request
            .headers
            .get("host")
            .map(str::to_string)
            .ok_or((400, "Bad Request"))?;
        // Validate the request's own body framing before dialing anything:
        // the ordering guarantee is that the request is fully validated
        // before the upstream dial, not just fully parsed.
        let client_body_kind = create_body_reader_kind(&request.headers).map_err(|err| {
            warn!("request has unusable body framing: {}", err);
            (400, "Bad Request")
        })?;
        let addr = append_port_if_needed(&host);

        let upstream = self.dialer.dial(addr).await.map_err(|err| {
            warn!("dial failed: {}", err);
            (400, "Bad Request")
        })?;
        let (upstream_read, mut upstream_write) = upstream.into_split();
        let upstream_read = BufReader::new(upstream_read);

        strip_hop_by_hop(&mut request.headers);
        request
            .write(&mut upstream_write)
            .await
            .map_err(|_| (400, "Bad Request"))?;

        let client_reader = match client_body_kind {
            Some(kind) => BodyReader::start(kind, client_read, self.config.body_chunk_size),
            None => BodyReader::start(
                BodyKind::ClientConnectionWatcher,
                client_read,
                self.config.body_chunk_size,
            ),
        };
        let client_transfer = BodyTransfer::start(client_reader, upstream_write, done_rx);

        Ok(Exchange { client_transfer, upstream_read })
    }
}

async fn send_fixed(w: &mut OwnedWriteHalf, status: u16, reason: &str) {
    let response = Response::fixed(status, reason);
    if let Err(err) = response.write(w).await {
        debug!("failed writing fixed response: {}", err);
    }
    let _ = w.flush().await;
}
