//! Render core: owns the link to the sink and moves producer buffers
//! through it.
//!
//! ## One render pass
//! 1. Reuse the held buffer if it still carries payload, otherwise claim
//!    the next one from the port (claimed buffers are held as-is, even when
//!    empty, so EOS markers flow through the same path).
//! 2. Write the payload to the stream in one call, under the loop lock,
//!    then mark the buffer consumed.
//! 3. Once a buffer is empty, raise end-of-stream if it carries the mark,
//!    reset its offset, and release it to the port.
//! 4. Repeat until the port runs dry.
//!
//! Passes run only while the *shadow* stream state is `Ready`; the shadow
//! is fed exclusively by bridged events, so this thread never reads the
//! server's state directly.

use std::sync::Arc;

use crate::bridge::EventBridge;
use crate::config::RendererConfig;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::mainloop::Mainloop;
use crate::port::{FilledBuffer, INPUT_PORT_INDEX, InputPort, PortEvent};
use crate::sink::{ConnectionState, SinkConnector, StreamState};
use crate::status::RendererStatus;
use crate::stream::StreamManager;

/// Everything that exists only between allocate and deallocate.
struct Link {
    mainloop: Mainloop,
    connection: ConnectionManager,
    stream: StreamManager,
}

impl Link {
    fn new() -> Self {
        Self {
            mainloop: Mainloop::start(),
            connection: ConnectionManager::new(),
            stream: StreamManager::new(),
        }
    }
}

pub(crate) struct RenderCore {
    config: RendererConfig,
    connector: Box<dyn SinkConnector>,
    port: Arc<dyn InputPort>,
    bridge: EventBridge,
    link: Option<Link>,
    held: Option<FilledBuffer>,
    shadow_stream: StreamState,
    pending_write_bytes: usize,
    port_disabled: bool,
    bytes_written: u64,
    buffers_rendered: u64,
    write_failures: u64,
    eos_signaled: bool,
}

impl RenderCore {
    pub(crate) fn new(
        config: RendererConfig,
        connector: Box<dyn SinkConnector>,
        port: Arc<dyn InputPort>,
        bridge: EventBridge,
    ) -> Self {
        Self {
            config,
            connector,
            port,
            bridge,
            link: None,
            held: None,
            shadow_stream: StreamState::Unconnected,
            pending_write_bytes: 0,
            port_disabled: false,
            bytes_written: 0,
            buffers_rendered: 0,
            write_failures: 0,
            eos_signaled: false,
        }
    }

    pub(crate) fn bridge(&self) -> &EventBridge {
        &self.bridge
    }

    pub(crate) fn shadow_stream_state(&self) -> StreamState {
        self.shadow_stream
    }

    pub(crate) fn pending_write_bytes(&self) -> usize {
        self.pending_write_bytes
    }

    pub(crate) fn set_port_disabled(&mut self, disabled: bool) {
        tracing::debug!(disabled, "input port availability changed");
        self.port_disabled = disabled;
    }

    /// Bring up loop, connection, and stream. Idempotent through the ensure
    /// operations; on failure everything built so far is torn down again.
    pub(crate) fn allocate(&mut self) -> Result<()> {
        let link = self.link.get_or_insert_with(Link::new);
        let Link {
            mainloop,
            connection,
            stream,
        } = link;
        let guard = mainloop.lock();
        let (guard, res) = stream.ensure_stream(
            mainloop,
            guard,
            connection,
            self.connector.as_mut(),
            self.port.as_ref(),
            &self.config,
            &self.bridge,
        );
        drop(guard);
        if let Err(e) = res {
            tracing::warn!("sink setup failed: {e}");
            self.teardown();
            return Err(e);
        }
        Ok(())
    }

    /// Full teardown: stop the dispatch thread first so no callback can run
    /// past this point, then close stream and connection, then give back any
    /// held buffer. Idempotent.
    pub(crate) fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.mainloop.stop();
            let mut state = link.mainloop.lock();
            link.stream.teardown(&mut state);
            link.connection.teardown(&mut state);
            drop(state);
        }
        if let Some(mut buffer) = self.held.take() {
            buffer.offset = 0;
            self.port.release_buffer(INPUT_PORT_INDEX, buffer);
        }
        self.shadow_stream = StreamState::Unconnected;
        self.pending_write_bytes = 0;
    }

    /// Shadow stream state handler for bridged events. Dropped when the
    /// link (or its stream) no longer exists.
    pub(crate) fn apply_stream_state(&mut self, state: StreamState) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if !link.stream.is_active() {
            return;
        }
        tracing::trace!(state = %state, "bridged stream state");
        self.shadow_stream = state;
    }

    /// Write-readiness handler for bridged events. Recorded for diagnostics
    /// only; writes are never gated on it.
    pub(crate) fn apply_write_request(&mut self, bytes: usize) {
        if self.link.is_none() {
            return;
        }
        tracing::trace!(bytes, "bridged write request");
        self.pending_write_bytes = bytes;
    }

    /// Drain the port while the stream is ready for payload.
    pub(crate) fn render_pass(&mut self) {
        while self.shadow_stream == StreamState::Ready && !self.port_disabled {
            let Some(mut buffer) = self.next_buffer() else {
                return;
            };
            if buffer.filled > 0 {
                self.write_payload(&mut buffer);
            }
            if buffer.filled == 0 {
                self.finish_buffer(buffer);
            } else {
                self.held = Some(buffer);
                return;
            }
        }
    }

    pub(crate) fn status(&self) -> RendererStatus {
        let connection_state = match self.link.as_ref() {
            Some(link) => link.mainloop.lock().connection_state(),
            None => ConnectionState::Unconnected,
        };
        RendererStatus {
            connection_state,
            stream_state: self.shadow_stream,
            pending_write_bytes: self.pending_write_bytes,
            bytes_written: self.bytes_written,
            buffers_rendered: self.buffers_rendered,
            write_failures: self.write_failures,
            eos_signaled: self.eos_signaled,
        }
    }

    // Held buffers always carry payload; empty ones are finished on the
    // spot, so the reuse path never resurrects a consumed buffer.
    fn next_buffer(&mut self) -> Option<FilledBuffer> {
        if let Some(held) = self.held.take() {
            return Some(held);
        }
        let buffer = self.port.claim_buffer(INPUT_PORT_INDEX)?;
        tracing::trace!(filled = buffer.filled, eos = buffer.eos, "claimed input buffer");
        Some(buffer)
    }

    fn write_payload(&mut self, buffer: &mut FilledBuffer) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let Some(stream) = link.stream.stream_mut() else {
            return;
        };
        let guard = link.mainloop.lock();
        let res = stream.write(buffer.payload());
        drop(guard);
        match res {
            Ok(()) => self.bytes_written += buffer.filled as u64,
            Err(e) => {
                self.write_failures += 1;
                tracing::warn!(bytes = buffer.filled, "stream write failed: {e}");
            }
        }
        buffer.mark_consumed();
    }

    fn finish_buffer(&mut self, mut buffer: FilledBuffer) {
        if buffer.eos {
            tracing::info!("end of input stream reached");
            self.eos_signaled = true;
            self.port.notify(PortEvent::EndOfStream);
        }
        buffer.offset = 0;
        self.port.release_buffer(INPUT_PORT_INDEX, buffer);
        self.buffers_rendered += 1;
    }
}
