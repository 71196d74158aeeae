use crate::sink::{ConnectionState, StreamState};

/// Point-in-time renderer diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct RendererStatus {
    /// Server-reported connection state (loop-side truth).
    pub connection_state: ConnectionState,
    /// Stream state as last bridged into the renderer context.
    pub stream_state: StreamState,
    /// Latest write-readiness hint from the server, in bytes.
    pub pending_write_bytes: usize,
    /// Payload bytes handed to the stream so far.
    pub bytes_written: u64,
    /// Buffers fully rendered and released back to the port.
    pub buffers_rendered: u64,
    /// Stream writes that reported an error (payload was dropped).
    pub write_failures: u64,
    /// Whether the end-of-stream notification has been raised.
    pub eos_signaled: bool,
}
