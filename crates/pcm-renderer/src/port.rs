//! Producer-side buffer port.
//!
//! The renderer pulls filled PCM buffers from an [`InputPort`] and hands
//! them back once written out. Buffers move **by value** through claim and
//! release, so a claimed buffer cannot be forgotten without giving it back.
//!
//! [`QueuePort`] is the reference implementation used by the demo binary and
//! the test suite: hosts queue filled buffers on one side, the renderer
//! claims them on the other, and released buffers return to a free pool for
//! recycling.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::format::PcmPortParams;

/// Index of the single PCM input port.
pub const INPUT_PORT_INDEX: u32 = 0;

/// A producer buffer handed over for rendering.
///
/// Valid payload is `data[offset .. offset + filled]`. The renderer zeroes
/// `filled` once the payload has been written and resets `offset` before the
/// buffer is released.
#[derive(Debug)]
pub struct FilledBuffer {
    pub data: Vec<u8>,
    pub offset: usize,
    pub filled: usize,
    /// Marks the last buffer of the stream.
    pub eos: bool,
}

impl FilledBuffer {
    /// Buffer whose whole `data` is payload.
    pub fn new(data: Vec<u8>) -> Self {
        let filled = data.len();
        Self {
            data,
            offset: 0,
            filled,
            eos: false,
        }
    }

    /// The bytes still to be written.
    pub fn payload(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.filled]
    }

    /// Mark the payload fully written.
    pub fn mark_consumed(&mut self) {
        self.filled = 0;
    }
}

/// Out-of-band notifications raised towards the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortEvent {
    /// A buffer carrying the EOS mark was fully rendered.
    EndOfStream,
}

/// What the renderer needs from the hosting producer.
pub trait InputPort: Send + Sync {
    /// Take the next filled buffer, if any. Must not block.
    fn claim_buffer(&self, port: u32) -> Option<FilledBuffer>;

    /// Return a buffer whose payload has been consumed.
    fn release_buffer(&self, port: u32, buffer: FilledBuffer);

    /// Current PCM mode parameters of the port.
    fn pcm_params(&self, port: u32) -> Result<PcmPortParams>;

    /// Deliver an out-of-band notification.
    fn notify(&self, event: PortEvent);
}

/// Claim/release accounting exposed by [`QueuePort`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    /// Buffers handed to the renderer so far.
    pub claims: u64,
    /// Buffers given back so far.
    pub releases: u64,
    /// Filled buffers still waiting to be claimed.
    pub queued: usize,
    /// Released buffers available for recycling.
    pub free: usize,
}

struct QueueInner {
    filled: VecDeque<FilledBuffer>,
    free: Vec<FilledBuffer>,
    events: VecDeque<PortEvent>,
    claims: u64,
    releases: u64,
}

/// Thread-safe [`InputPort`] backed by a buffer queue.
pub struct QueuePort {
    params: PcmPortParams,
    inner: Mutex<QueueInner>,
    cv: Condvar,
}

impl QueuePort {
    pub fn new(params: PcmPortParams) -> Self {
        Self {
            params,
            inner: Mutex::new(QueueInner {
                filled: VecDeque::new(),
                free: Vec::new(),
                events: VecDeque::new(),
                claims: 0,
                releases: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Queue a filled buffer for the renderer.
    pub fn queue_buffer(&self, buffer: FilledBuffer) {
        let mut g = self.inner.lock().unwrap();
        g.filled.push_back(buffer);
        drop(g);
        self.cv.notify_all();
    }

    /// Take a released buffer for refilling, if one is available.
    pub fn take_free(&self) -> Option<FilledBuffer> {
        self.inner.lock().unwrap().free.pop()
    }

    /// Block until a released buffer can be refilled or `timeout` elapses.
    pub fn wait_free(&self, timeout: Duration) -> Option<FilledBuffer> {
        let deadline = Instant::now() + timeout;
        let mut g = self.inner.lock().unwrap();
        loop {
            if let Some(buffer) = g.free.pop() {
                return Some(buffer);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (g2, _) = self.cv.wait_timeout(g, deadline - now).unwrap();
            g = g2;
        }
    }

    /// Block until a port event arrives or `timeout` elapses.
    pub fn wait_event(&self, timeout: Duration) -> Option<PortEvent> {
        let deadline = Instant::now() + timeout;
        let mut g = self.inner.lock().unwrap();
        loop {
            if let Some(ev) = g.events.pop_front() {
                return Some(ev);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (g2, _) = self.cv.wait_timeout(g, deadline - now).unwrap();
            g = g2;
        }
    }

    pub fn stats(&self) -> PortStats {
        let g = self.inner.lock().unwrap();
        PortStats {
            claims: g.claims,
            releases: g.releases,
            queued: g.filled.len(),
            free: g.free.len(),
        }
    }
}

impl InputPort for QueuePort {
    fn claim_buffer(&self, _port: u32) -> Option<FilledBuffer> {
        let mut g = self.inner.lock().unwrap();
        let buffer = g.filled.pop_front()?;
        g.claims += 1;
        Some(buffer)
    }

    fn release_buffer(&self, _port: u32, buffer: FilledBuffer) {
        let mut g = self.inner.lock().unwrap();
        g.releases += 1;
        g.free.push(buffer);
        drop(g);
        self.cv.notify_all();
    }

    fn pcm_params(&self, _port: u32) -> Result<PcmPortParams> {
        Ok(self.params)
    }

    fn notify(&self, event: PortEvent) {
        tracing::debug!(?event, "port notification");
        let mut g = self.inner.lock().unwrap();
        g.events.push_back(event);
        drop(g);
        self.cv.notify_all();
    }
}

impl std::fmt::Debug for QueuePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("QueuePort")
            .field("params", &self.params)
            .field("stats", &stats)
            .finish()
    }
}

/// Placeholder port for contexts that must fail parameter queries.
#[cfg(test)]
pub(crate) struct BrokenPort;

#[cfg(test)]
impl InputPort for BrokenPort {
    fn claim_buffer(&self, _port: u32) -> Option<FilledBuffer> {
        None
    }

    fn release_buffer(&self, _port: u32, _buffer: FilledBuffer) {}

    fn pcm_params(&self, _port: u32) -> Result<PcmPortParams> {
        Err(crate::error::Error::Port("no parameters configured".into()))
    }

    fn notify(&self, _event: PortEvent) {}
}
