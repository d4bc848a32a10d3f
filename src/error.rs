//! The proxy's error taxonomy.
//!
//! Mirrors the framing / semantic / upstream split from the design:
//! framing and semantic errors are surfaced to a single client response
//! (500 and 400 respectively), upstream errors get 400 (dial failure) or a
//! silent teardown (once response headers are already on the wire).
use std::io;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// I/O failure on either socket.
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// A request/status line or header block did not parse.
        Framing(msg: String) {
            description("framing error")
            display("framing error: {}", msg)
        }
        /// An invalid hex chunk-size line.
        ChunkSize(msg: String) {
            description("invalid chunk size")
            display("invalid chunk size: {}", msg)
        }
        /// Method not in {GET, HEAD, POST}.
        UnsupportedMethod(method: String) {
            description("unsupported method")
            display("unsupported method: {}", method)
        }
        /// No usable `Host` header on the request.
        MissingHost {
            description("missing Host header")
        }
        /// `Content-Length` present but not a valid non-negative integer.
        InvalidContentLength(value: String) {
            description("invalid Content-Length")
            display("invalid Content-Length: {:?}", value)
        }
        /// Dialing the upstream origin failed.
        Dial(addr: String, err: io::Error) {
            description("failed to dial upstream")
            display("failed to dial upstream {}: {}", addr, err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
