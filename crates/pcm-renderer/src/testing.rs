//! Scripted sink backend for tests.
//!
//! [`ScriptedSink`] plays a configurable sequence of connection and stream
//! states when asked to connect, records every operation and write it sees,
//! and can inject arbitrary events later through the injector it captured.
//! Clones share state, so a test keeps one clone for control and assertions
//! while the renderer owns another as its connector.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::format::SampleSpec;
use crate::mainloop::EventInjector;
use crate::sink::{
    ConnectionState, SinkConnection, SinkConnector, SinkEvent, SinkStream, StreamState,
};

struct ScriptedShared {
    connect_states: Mutex<Vec<ConnectionState>>,
    stream_states: Mutex<Vec<StreamState>>,
    fail_connect: AtomicBool,
    fail_create: AtomicBool,
    fail_writes: AtomicBool,
    write_injection: Mutex<Option<SinkEvent>>,
    connects: AtomicUsize,
    creates: AtomicUsize,
    writes: Mutex<Vec<Vec<u8>>>,
    ops: Mutex<Vec<String>>,
    injector: Mutex<Option<EventInjector>>,
}

impl ScriptedShared {
    fn op(&self, name: &str) {
        self.ops.lock().unwrap().push(name.to_string());
    }
}

/// Scripted [`SinkConnector`] with shared recording state.
#[derive(Clone)]
pub struct ScriptedSink {
    shared: Arc<ScriptedShared>,
}

impl ScriptedSink {
    /// Defaults: connections walk `Connecting → Ready`, streams walk
    /// `Creating → Ready`, nothing fails.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ScriptedShared {
                connect_states: Mutex::new(vec![
                    ConnectionState::Connecting,
                    ConnectionState::Ready,
                ]),
                stream_states: Mutex::new(vec![StreamState::Creating, StreamState::Ready]),
                fail_connect: AtomicBool::new(false),
                fail_create: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                write_injection: Mutex::new(None),
                connects: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                writes: Mutex::new(Vec::new()),
                ops: Mutex::new(Vec::new()),
                injector: Mutex::new(None),
            }),
        }
    }

    /// States posted on every connect, in order.
    pub fn set_connect_states(&self, states: &[ConnectionState]) {
        *self.shared.connect_states.lock().unwrap() = states.to_vec();
    }

    /// States posted on every stream creation, in order.
    pub fn set_stream_states(&self, states: &[StreamState]) {
        *self.shared.stream_states.lock().unwrap() = states.to_vec();
    }

    /// Make the next connect attempt return an error.
    pub fn fail_next_connect(&self) {
        self.shared.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Make the next stream creation return an error.
    pub fn fail_next_create(&self) {
        self.shared.fail_create.store(true, Ordering::SeqCst);
    }

    /// Make stream writes fail (sticky until turned off again).
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Post one event from inside the next stream write, as a server
    /// delivering a callback mid-render would.
    pub fn inject_on_first_write(&self, event: SinkEvent) {
        *self.shared.write_injection.lock().unwrap() = Some(event);
    }

    /// Post an event through the injector captured at connect time.
    /// Returns false when no connect has happened yet.
    pub fn inject(&self, event: SinkEvent) -> bool {
        let injector = self.shared.injector.lock().unwrap().clone();
        match injector {
            Some(injector) => {
                injector.post(event);
                true
            }
            None => false,
        }
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.shared.creates.load(Ordering::SeqCst)
    }

    /// Payloads accepted by stream writes (failed writes excluded).
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared.writes.lock().unwrap().clone()
    }

    /// Every operation seen so far, in call order.
    pub fn ops(&self) -> Vec<String> {
        self.shared.ops.lock().unwrap().clone()
    }
}

impl Default for ScriptedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkConnector for ScriptedSink {
    fn connect(
        &mut self,
        _app_name: &str,
        _media_role: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkConnection>> {
        self.shared.op("connect");
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_connect.swap(false, Ordering::SeqCst) {
            return Err(Error::Resource("scripted connect failure".into()));
        }
        *self.shared.injector.lock().unwrap() = Some(events.clone());
        for state in self.shared.connect_states.lock().unwrap().iter() {
            events.post(SinkEvent::Connection(*state));
        }
        Ok(Box::new(ScriptedConnection {
            shared: self.shared.clone(),
        }))
    }
}

struct ScriptedConnection {
    shared: Arc<ScriptedShared>,
}

impl SinkConnection for ScriptedConnection {
    fn create_stream(
        &mut self,
        _name: &str,
        _spec: &SampleSpec,
        _sink: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkStream>> {
        self.shared.op("create_stream");
        self.shared.creates.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_create.swap(false, Ordering::SeqCst) {
            return Err(Error::Resource("scripted stream failure".into()));
        }
        *self.shared.injector.lock().unwrap() = Some(events.clone());
        for state in self.shared.stream_states.lock().unwrap().iter() {
            events.post(SinkEvent::Stream(*state));
        }
        Ok(Box::new(ScriptedStream {
            shared: self.shared.clone(),
        }))
    }

    fn disconnect(&mut self) {
        self.shared.op("connection.disconnect");
    }
}

struct ScriptedStream {
    shared: Arc<ScriptedShared>,
}

impl SinkStream for ScriptedStream {
    fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.shared.op("write");
        if let Some(event) = self.shared.write_injection.lock().unwrap().take() {
            if let Some(injector) = self.shared.injector.lock().unwrap().as_ref() {
                injector.post(event);
            }
        }
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Resource("scripted write failure".into()));
        }
        self.shared.writes.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.shared.op("stream.disconnect");
    }
}
