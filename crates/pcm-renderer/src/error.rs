use std::time::Duration;

use crate::sink::{ConnectionState, StreamState};

/// Errors surfaced by the renderer and its sink backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A loop, connection, stream, or other client-side object could not be created.
    #[error("sink resource allocation failed: {0}")]
    Resource(String),

    /// The server connection ended up in a terminal non-ready state.
    #[error("sink connection unusable (state: {0})")]
    Connection(ConnectionState),

    /// The connection did not reach a decisive state before the configured deadline.
    #[error("timed out after {0:?} waiting for sink connection")]
    ConnectTimeout(Duration),

    /// The playback stream ended up in a terminal non-ready state.
    #[error("playback stream unusable (state: {0})")]
    Stream(StreamState),

    /// The producer port could not report its PCM parameters.
    #[error("input port parameter query failed: {0}")]
    Port(String),

    /// The renderer worker thread is gone; no further hooks can be serviced.
    #[error("renderer worker is not running")]
    Worker,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
