//! Discarding sink backend.
//!
//! Reports a healthy connection and stream immediately, counts written
//! payload, and keeps write-readiness flowing so rendering proceeds at full
//! speed. Useful for hosts without audio hardware and as a wiring check.

use crate::error::Result;
use crate::format::SampleSpec;
use crate::mainloop::EventInjector;
use crate::sink::{
    ConnectionState, SinkConnection, SinkConnector, SinkEvent, SinkStream, StreamState,
};

pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkConnector for NullSink {
    fn connect(
        &mut self,
        app_name: &str,
        _media_role: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkConnection>> {
        tracing::debug!(app = app_name, "null sink connected");
        events.post(SinkEvent::Connection(ConnectionState::Connecting));
        events.post(SinkEvent::Connection(ConnectionState::Ready));
        Ok(Box::new(NullConnection { events }))
    }
}

struct NullConnection {
    events: EventInjector,
}

impl SinkConnection for NullConnection {
    fn create_stream(
        &mut self,
        name: &str,
        spec: &SampleSpec,
        _sink: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkStream>> {
        events.post(SinkEvent::Stream(StreamState::Creating));
        // Advertise a quarter second of headroom per request.
        let chunk = (spec.bytes_per_second() / 4).max(1);
        tracing::info!(name, spec = %spec, chunk, "null stream open");
        events.post(SinkEvent::Stream(StreamState::Ready));
        events.post(SinkEvent::WriteRequested(chunk));
        Ok(Box::new(NullStream {
            events,
            chunk,
            discarded: 0,
        }))
    }

    fn disconnect(&mut self) {
        self.events
            .post(SinkEvent::Connection(ConnectionState::Terminated));
    }
}

struct NullStream {
    events: EventInjector,
    chunk: usize,
    discarded: u64,
}

impl SinkStream for NullStream {
    fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.discarded += payload.len() as u64;
        tracing::trace!(bytes = payload.len(), "null stream swallowed payload");
        self.events.post(SinkEvent::WriteRequested(self.chunk));
        Ok(())
    }

    fn disconnect(&mut self) {
        tracing::debug!(discarded = self.discarded, "null stream closed");
        self.events.post(SinkEvent::Stream(StreamState::Terminated));
    }
}
