//! Small set of tunables the exchange engine needs.
//!
//! Kept deliberately minimal: the spec describes no timeout or
//! backpressure knobs, so this does not invent any. It exists so the
//! binary's CLI flags have somewhere to land and so the buffer size used
//! by the fixed-length body reader isn't a magic number buried in
//! `body.rs`.

/// Default size of the chunk emitted by the fixed-length body reader.
pub const DEFAULT_BODY_CHUNK_SIZE: usize = 4096;

/// Default listen port, matching the primary variant of the original.
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the listener binds to.
    pub listen_port: u16,
    /// Size of the internal buffer used to read a fixed-length body.
    pub body_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen_port: DEFAULT_PORT,
            body_chunk_size: DEFAULT_BODY_CHUNK_SIZE,
        }
    }
}
