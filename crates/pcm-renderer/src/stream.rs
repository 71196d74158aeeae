//! Stream manager: one playback stream per connection, created after the
//! connection is awaited ready and wired to the event bridge.

use std::sync::MutexGuard;

use crate::bridge::EventBridge;
use crate::config::RendererConfig;
use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::format::SampleSpec;
use crate::mainloop::{LinkState, Mainloop};
use crate::port::{INPUT_PORT_INDEX, InputPort};
use crate::sink::{SinkConnector, SinkStream, StreamState};

pub(crate) struct StreamManager {
    stream: Option<Box<dyn SinkStream>>,
}

impl StreamManager {
    pub(crate) fn new() -> Self {
        Self { stream: None }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub(crate) fn stream_mut(&mut self) -> Option<&mut (dyn SinkStream + 'static)> {
        self.stream.as_deref_mut()
    }

    /// Create and connect the playback stream, establishing the connection
    /// first if needed. Idempotent; runs with the loop lock held (the guard
    /// is threaded through the connection wait).
    ///
    /// A connection sitting in a terminal state from a previous life is torn
    /// down before reconnecting.
    pub(crate) fn ensure_stream<'l>(
        &mut self,
        mainloop: &'l Mainloop,
        mut guard: MutexGuard<'l, LinkState>,
        conn: &mut ConnectionManager,
        connector: &mut dyn SinkConnector,
        port: &dyn InputPort,
        config: &RendererConfig,
        bridge: &EventBridge,
    ) -> (MutexGuard<'l, LinkState>, Result<()>) {
        if self.stream.is_some() {
            return (guard, Ok(()));
        }
        if guard.connection_state().is_terminal_failure() {
            conn.teardown(&mut guard);
        }
        if let Err(e) = conn.ensure_connected(&mut guard, connector, config, mainloop) {
            return (guard, Err(e));
        }
        let (mut guard, res) = conn.await_ready(mainloop, guard, config.connect_timeout);
        if let Err(e) = res {
            return (guard, Err(e));
        }

        let params = match port.pcm_params(INPUT_PORT_INDEX) {
            Ok(p) => p,
            Err(e) => return (guard, Err(e)),
        };
        tracing::debug!(
            bits = params.bits_per_sample,
            channels = params.channels,
            rate = params.sample_rate,
            "input port pcm parameters"
        );
        let spec = SampleSpec::from_port_params(&params);
        if !spec.is_valid() {
            return (
                guard,
                Err(Error::Resource(format!("unusable sample spec ({spec})"))),
            );
        }

        guard.set_stream_callback(Some(Box::new({
            let bridge = bridge.clone();
            move |s| bridge.post_stream_state(s)
        })));
        guard.set_write_callback(Some(Box::new({
            let bridge = bridge.clone();
            move |n| bridge.post_write_request(n)
        })));
        guard.set_suspended_callback(Some(Box::new(|suspended| {
            tracing::debug!(suspended, "playback stream suspension");
        })));

        let Some(live) = conn.connection_mut() else {
            self.teardown(&mut guard);
            return (
                guard,
                Err(Error::Resource("connection lost before stream setup".into())),
            );
        };
        match live.create_stream(
            &config.stream_name,
            &spec,
            config.sink.as_deref(),
            mainloop.injector(),
        ) {
            Ok(stream) => {
                if guard.stream_state() == StreamState::Unconnected {
                    guard.set_stream_state(StreamState::Creating);
                }
                tracing::info!(name = %config.stream_name, spec = %spec, sink = config.sink.as_deref().unwrap_or("default"), "playback stream connecting");
                self.stream = Some(stream);
                (guard, Ok(()))
            }
            Err(e) => {
                self.teardown(&mut guard);
                (guard, Err(e))
            }
        }
    }

    /// Drop the stream and its callback registrations. Idempotent.
    pub(crate) fn teardown(&mut self, state: &mut LinkState) {
        state.set_stream_callback(None);
        state.set_write_callback(None);
        state.set_suspended_callback(None);
        if let Some(mut stream) = self.stream.take() {
            stream.disconnect();
            tracing::debug!("playback stream closed");
        }
        state.set_stream_state(StreamState::Unconnected);
    }
}
