//! Event loop serializing sink server callbacks.
//!
//! Backends run on their own threads (device callbacks, probe threads) and
//! post [`SinkEvent`]s through a cloneable [`EventInjector`]. A dedicated
//! dispatch thread applies each event to the shared [`LinkState`] under the
//! loop lock, invokes the callback registered for it, then notifies the
//! condition variable.
//!
//! ## Cooperative wait protocol
//! - The renderer worker takes the lock with [`Mainloop::lock`] and keeps it
//!   across setup/teardown sequences and stream writes.
//! - [`Mainloop::wait`] / [`Mainloop::wait_timeout`] release the lock while
//!   blocked and re-acquire it before returning; callers re-check their
//!   predicate in a loop (wakeups may be spurious).
//! - [`Mainloop::stop`] halts and joins the dispatch thread. Events still
//!   queued at that point are dropped, and events posted afterwards go
//!   nowhere; both match the degradation of tearing down a live link.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::sink::{ConnectionState, SinkEvent, StreamState};

pub(crate) type ConnectionCallback = Box<dyn FnMut(ConnectionState) + Send>;
pub(crate) type StreamCallback = Box<dyn FnMut(StreamState) + Send>;
pub(crate) type WriteCallback = Box<dyn FnMut(usize) + Send>;
pub(crate) type SuspendedCallback = Box<dyn FnMut(bool) + Send>;

/// Link state guarded by the loop lock: the server-reported connection and
/// stream states plus the registered callback slots.
pub struct LinkState {
    conn_state: ConnectionState,
    stream_state: StreamState,
    on_connection: Option<ConnectionCallback>,
    on_stream: Option<StreamCallback>,
    on_write: Option<WriteCallback>,
    on_suspended: Option<SuspendedCallback>,
}

impl LinkState {
    fn new() -> Self {
        Self {
            conn_state: ConnectionState::Unconnected,
            stream_state: StreamState::Unconnected,
            on_connection: None,
            on_stream: None,
            on_write: None,
            on_suspended: None,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn_state
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream_state
    }

    pub(crate) fn set_connection_state(&mut self, state: ConnectionState) {
        self.conn_state = state;
    }

    pub(crate) fn set_stream_state(&mut self, state: StreamState) {
        self.stream_state = state;
    }

    pub(crate) fn set_connection_callback(&mut self, cb: Option<ConnectionCallback>) {
        self.on_connection = cb;
    }

    pub(crate) fn set_stream_callback(&mut self, cb: Option<StreamCallback>) {
        self.on_stream = cb;
    }

    pub(crate) fn set_write_callback(&mut self, cb: Option<WriteCallback>) {
        self.on_write = cb;
    }

    pub(crate) fn set_suspended_callback(&mut self, cb: Option<SuspendedCallback>) {
        self.on_suspended = cb;
    }

    /// Apply one event and fire its registered callback. Runs on the
    /// dispatch thread with the lock held.
    fn apply(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::Connection(state) => {
                self.conn_state = state;
                if let Some(cb) = self.on_connection.as_mut() {
                    cb(state);
                }
            }
            SinkEvent::Stream(state) => {
                self.stream_state = state;
                if let Some(cb) = self.on_stream.as_mut() {
                    cb(state);
                }
            }
            SinkEvent::WriteRequested(bytes) => {
                if let Some(cb) = self.on_write.as_mut() {
                    cb(bytes);
                }
            }
            SinkEvent::Suspended(suspended) => {
                if let Some(cb) = self.on_suspended.as_mut() {
                    cb(suspended);
                } else {
                    tracing::trace!(suspended, "sink suspension (unhandled)");
                }
            }
        }
    }
}

enum LoopMsg {
    Event(SinkEvent),
    Stop,
}

/// Handle backends use to post events into the loop. Cheap to clone; posting
/// after the loop stopped is a no-op.
#[derive(Clone)]
pub struct EventInjector {
    tx: Sender<LoopMsg>,
}

impl EventInjector {
    pub fn post(&self, event: SinkEvent) {
        let _ = self.tx.send(LoopMsg::Event(event));
    }
}

struct LoopShared {
    state: Mutex<LinkState>,
    cv: Condvar,
}

/// The event loop: lock, condition variable, and dispatch thread.
pub struct Mainloop {
    shared: Arc<LoopShared>,
    tx: Sender<LoopMsg>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Mainloop {
    /// Create the loop and start its dispatch thread.
    pub fn start() -> Self {
        let shared = Arc::new(LoopShared {
            state: Mutex::new(LinkState::new()),
            cv: Condvar::new(),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = std::thread::spawn({
            let shared = shared.clone();
            move || dispatch_main(shared, rx)
        });
        Self {
            shared,
            tx,
            thread: Some(thread),
        }
    }

    /// New injector for handing to a backend.
    pub fn injector(&self) -> EventInjector {
        EventInjector {
            tx: self.tx.clone(),
        }
    }

    /// Take the loop lock.
    pub fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.shared.state.lock().unwrap()
    }

    /// Release the lock and block until signaled, then re-acquire it.
    pub fn wait<'l>(&'l self, guard: MutexGuard<'l, LinkState>) -> MutexGuard<'l, LinkState> {
        self.shared.cv.wait(guard).unwrap()
    }

    /// Like [`wait`](Self::wait) with an upper bound. The bool is true when
    /// the bound elapsed without a signal.
    pub fn wait_timeout<'l>(
        &'l self,
        guard: MutexGuard<'l, LinkState>,
        timeout: Duration,
    ) -> (MutexGuard<'l, LinkState>, bool) {
        let (guard, res) = self.shared.cv.wait_timeout(guard, timeout).unwrap();
        (guard, res.timed_out())
    }

    /// Wake all waiters.
    pub fn signal(&self) {
        self.shared.cv.notify_all();
    }

    /// Halt and join the dispatch thread. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.tx.send(LoopMsg::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            tracing::debug!("sink event loop stopped");
        }
    }
}

impl Drop for Mainloop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_main(shared: Arc<LoopShared>, rx: Receiver<LoopMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            LoopMsg::Stop => break,
            LoopMsg::Event(event) => {
                tracing::trace!(?event, "sink event");
                let mut state = shared.state.lock().unwrap();
                state.apply(event);
                drop(state);
                shared.cv.notify_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn wait_for_conn_state(lp: &Mainloop, want: ConnectionState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut g = lp.lock();
        while g.connection_state() != want {
            if Instant::now() > deadline {
                return false;
            }
            let (g2, _) = lp.wait_timeout(g, Duration::from_millis(50));
            g = g2;
        }
        true
    }

    #[test]
    fn applies_events_and_fires_callbacks() {
        let mut lp = Mainloop::start();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = seen.clone();
            let mut g = lp.lock();
            g.set_connection_callback(Some(Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })));
        }
        let inj = lp.injector();
        inj.post(SinkEvent::Connection(ConnectionState::Connecting));
        inj.post(SinkEvent::Connection(ConnectionState::Ready));
        assert!(wait_for_conn_state(&lp, ConnectionState::Ready));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        lp.stop();
    }

    #[test]
    fn wait_timeout_reports_elapsed_bound() {
        let lp = Mainloop::start();
        let g = lp.lock();
        let (_g, timed_out) = lp.wait_timeout(g, Duration::from_millis(20));
        assert!(timed_out);
    }

    #[test]
    fn waiter_wakes_on_event() {
        let lp = Arc::new(Mainloop::start());
        let waiter = std::thread::spawn({
            let lp = lp.clone();
            move || wait_for_conn_state(&lp, ConnectionState::Ready)
        });
        lp.injector()
            .post(SinkEvent::Connection(ConnectionState::Ready));
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn events_after_stop_are_dropped() {
        let mut lp = Mainloop::start();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = seen.clone();
            let mut g = lp.lock();
            g.set_stream_callback(Some(Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })));
        }
        let inj = lp.injector();
        inj.post(SinkEvent::Stream(StreamState::Creating));
        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        lp.stop();
        inj.post(SinkEvent::Stream(StreamState::Ready));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(lp.lock().stream_state(), StreamState::Creating);
    }

    #[test]
    fn write_requests_do_not_disturb_states() {
        let mut lp = Mainloop::start();
        let last = Arc::new(AtomicUsize::new(0));
        {
            let last = last.clone();
            let mut g = lp.lock();
            g.set_write_callback(Some(Box::new(move |n| {
                last.store(n, Ordering::SeqCst);
            })));
        }
        lp.injector().post(SinkEvent::WriteRequested(4096));
        let deadline = Instant::now() + Duration::from_secs(2);
        while last.load(Ordering::SeqCst) != 4096 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(last.load(Ordering::SeqCst), 4096);
        let g = lp.lock();
        assert_eq!(g.connection_state(), ConnectionState::Unconnected);
        assert_eq!(g.stream_state(), StreamState::Unconnected);
        drop(g);
        lp.stop();
    }
}
