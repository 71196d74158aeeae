//! Connection manager: one server connection, created lazily and awaited
//! cooperatively.
//!
//! All entry points run on the renderer worker with the loop lock held;
//! [`ConnectionManager::await_ready`] threads the guard through by value
//! because waiting releases it.

use std::sync::MutexGuard;
use std::time::{Duration, Instant};

use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::mainloop::{LinkState, Mainloop};
use crate::sink::{ConnectionState, SinkConnection, SinkConnector};

pub(crate) struct ConnectionManager {
    conn: Option<Box<dyn SinkConnection>>,
}

impl ConnectionManager {
    pub(crate) fn new() -> Self {
        Self { conn: None }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut (dyn SinkConnection + 'static)> {
        self.conn.as_deref_mut()
    }

    /// Create the connection and start connecting, unless one already
    /// exists. The connector leaves the link at least `Connecting` when it
    /// returns `Ok`; the synchronous floor below covers backends that only
    /// report progress through events.
    pub(crate) fn ensure_connected(
        &mut self,
        state: &mut LinkState,
        connector: &mut dyn SinkConnector,
        config: &RendererConfig,
        mainloop: &Mainloop,
    ) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        state.set_connection_callback(Some(Box::new(|s| {
            tracing::debug!(state = %s, "sink connection state");
        })));
        match connector.connect(
            &config.app_name,
            config.media_role.as_deref(),
            mainloop.injector(),
        ) {
            Ok(conn) => {
                if state.connection_state() == ConnectionState::Unconnected {
                    state.set_connection_state(ConnectionState::Connecting);
                }
                tracing::debug!(app = %config.app_name, "sink connection started");
                self.conn = Some(conn);
                Ok(())
            }
            Err(e) => {
                state.set_connection_callback(None);
                Err(e)
            }
        }
    }

    /// Block until the connection is decisively ready or unusable.
    ///
    /// Transitional states wait on the loop's condition variable and
    /// re-check; `timeout` bounds the total wait (`None` waits forever).
    pub(crate) fn await_ready<'l>(
        &mut self,
        mainloop: &'l Mainloop,
        mut guard: MutexGuard<'l, LinkState>,
        timeout: Option<Duration>,
    ) -> (MutexGuard<'l, LinkState>, Result<()>) {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let state = guard.connection_state();
            match state {
                ConnectionState::Ready => return (guard, Ok(())),
                s if s.is_transitional() => {}
                s => return (guard, Err(Error::Connection(s))),
            }
            match deadline {
                None => guard = mainloop.wait(guard),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited = timeout.unwrap_or_default();
                        tracing::warn!(?waited, "sink connection wait expired");
                        return (guard, Err(Error::ConnectTimeout(waited)));
                    }
                    let (g, _) = mainloop.wait_timeout(guard, deadline - now);
                    guard = g;
                }
            }
        }
    }

    /// Drop the connection and its callback registration. Idempotent.
    pub(crate) fn teardown(&mut self, state: &mut LinkState) {
        state.set_connection_callback(None);
        if let Some(mut conn) = self.conn.take() {
            conn.disconnect();
            tracing::debug!("sink connection closed");
        }
        state.set_connection_state(ConnectionState::Unconnected);
    }
}
