//! Client-side seam to the audio sink server.
//!
//! The renderer never talks to a server API directly; it goes through three
//! small traits so the state machines can be driven by a real backend
//! ([`crate::backend`]) or by the scripted sink in the test suite:
//! - [`SinkConnector`] opens a connection,
//! - [`SinkConnection`] creates playback streams,
//! - [`SinkStream`] accepts payload writes.
//!
//! Backends report progress exclusively as [`SinkEvent`]s posted through an
//! [`EventInjector`](crate::mainloop::EventInjector); the dispatch thread in
//! [`crate::mainloop`] serializes them into the link state.

use std::fmt;

use crate::error::Result;
use crate::format::SampleSpec;
use crate::mainloop::EventInjector;

/// Connection lifecycle as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connect attempt has been made (or the link was torn down).
    Unconnected,
    /// The transport is being established.
    Connecting,
    /// The server is authorizing the client.
    Authorizing,
    /// The client name is being registered.
    SettingName,
    /// The connection is usable.
    Ready,
    /// The connection failed and will make no further progress.
    Failed,
    /// The connection was closed in an orderly fashion.
    Terminated,
}

impl ConnectionState {
    /// States that precede a decision; waiters keep waiting through these.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Authorizing
                | ConnectionState::SettingName
        )
    }

    /// Terminal states in which the connection is unusable.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Terminated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authorizing => "authorizing",
            ConnectionState::SettingName => "setting-name",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
            ConnectionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Playback stream lifecycle as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// No stream exists yet.
    Unconnected,
    /// The stream is being set up on the server.
    Creating,
    /// The stream accepts payload.
    Ready,
    /// The stream failed and will make no further progress.
    Failed,
    /// The stream was closed in an orderly fashion.
    Terminated,
}

impl StreamState {
    /// Terminal states in which the stream is unusable.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, StreamState::Failed | StreamState::Terminated)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Unconnected => "unconnected",
            StreamState::Creating => "creating",
            StreamState::Ready => "ready",
            StreamState::Failed => "failed",
            StreamState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Notifications a backend posts into the event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    /// The connection changed state.
    Connection(ConnectionState),
    /// The playback stream changed state.
    Stream(StreamState),
    /// The server can absorb roughly this many more payload bytes.
    WriteRequested(usize),
    /// The stream was suspended (`true`) or resumed (`false`) by the server.
    Suspended(bool),
}

/// Opens connections to a sink server.
///
/// `connect` may return before the connection is usable; progress arrives as
/// [`SinkEvent::Connection`] events. Implementations must leave the link in
/// at least `Connecting` by the time they return `Ok`.
pub trait SinkConnector: Send {
    fn connect(
        &mut self,
        app_name: &str,
        media_role: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkConnection>>;
}

/// An open server connection. Created and used only on the renderer worker,
/// so implementations need not be `Send`.
pub trait SinkConnection {
    /// Create a playback stream and start connecting it to `sink`
    /// (`None` = server default output). Stream progress arrives as
    /// [`SinkEvent::Stream`] / [`SinkEvent::WriteRequested`] events.
    fn create_stream(
        &mut self,
        name: &str,
        spec: &SampleSpec,
        sink: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkStream>>;

    /// Close the connection. Must be idempotent.
    fn disconnect(&mut self);
}

/// An open playback stream.
pub trait SinkStream {
    /// Hand `payload` to the server. Called with the loop lock held; must
    /// not block on server progress.
    fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// Close the stream. Must be idempotent.
    fn disconnect(&mut self);
}
