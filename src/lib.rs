//! A forwarding HTTP/1.1 proxy.
//!
//! Accepts one request per client connection, parses it, dials the origin
//! named by the request's `Host` header, relays the request upstream with
//! hop-by-hop headers stripped, and streams both bodies through until the
//! exchange completes. Each exchange closes both sockets: there is no
//! keep-alive, pipelining, or connection reuse.
#![recursion_limit = "128"]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate log;

pub mod body;
pub mod chunked;
pub mod config;
pub mod dialer;
pub mod error;
pub mod headers;
pub mod host;
pub mod message;
pub mod reader;
pub mod transfer;
pub mod worker;

pub use config::Config;
pub use error::Error;
pub use headers::Headers;
pub use message::{Request, Response};
pub use worker::Worker;
