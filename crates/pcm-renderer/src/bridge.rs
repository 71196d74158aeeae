//! Marshals loop-thread stream callbacks into the renderer context.
//!
//! Stream state changes and write-readiness hints must not be acted on from
//! the dispatch thread; the callback slots instead allocate an [`Envelope`]
//! (payload plus handler) and post it to the renderer's task channel. The
//! worker later runs the handler against its own state. If the renderer is
//! gone the envelope is dropped silently, which is the same degradation as
//! a callback firing after teardown.

use crossbeam_channel::Sender;

use crate::render::RenderCore;
use crate::renderer::RenderTask;
use crate::sink::StreamState;

/// Data carried by a bridged callback.
#[derive(Debug)]
pub(crate) enum EventPayload {
    StreamState(StreamState),
    WriteRequest(usize),
}

type EventHandler = fn(&mut RenderCore, &EventPayload);

/// One bridged callback: which handler to run and with what payload.
pub(crate) struct Envelope {
    handler: EventHandler,
    payload: EventPayload,
}

impl Envelope {
    pub(crate) fn dispatch(self, core: &mut RenderCore) {
        (self.handler)(core, &self.payload);
    }
}

/// Posting side of the bridge, cloned into the loop callback slots.
#[derive(Clone)]
pub(crate) struct EventBridge {
    tx: Sender<RenderTask>,
}

impl EventBridge {
    pub(crate) fn new(tx: Sender<RenderTask>) -> Self {
        Self { tx }
    }

    pub(crate) fn post_stream_state(&self, state: StreamState) {
        self.post(Envelope {
            handler: on_stream_state,
            payload: EventPayload::StreamState(state),
        });
    }

    pub(crate) fn post_write_request(&self, bytes: usize) {
        self.post(Envelope {
            handler: on_write_request,
            payload: EventPayload::WriteRequest(bytes),
        });
    }

    fn post(&self, envelope: Envelope) {
        if self.tx.send(RenderTask::Event(Box::new(envelope))).is_err() {
            tracing::trace!("renderer gone, dropping bridged event");
        }
    }
}

fn on_stream_state(core: &mut RenderCore, payload: &EventPayload) {
    if let EventPayload::StreamState(state) = payload {
        core.apply_stream_state(*state);
    }
}

fn on_write_request(core: &mut RenderCore, payload: &EventPayload) {
    if let EventPayload::WriteRequest(bytes) = payload {
        core.apply_write_request(*bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::format::PcmPortParams;
    use crate::port::QueuePort;
    use crate::renderer::RenderTask;
    use crate::testing::ScriptedSink;
    use std::sync::Arc;

    fn core_with_bridge() -> (RenderCore, crossbeam_channel::Receiver<RenderTask>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let port = Arc::new(QueuePort::new(PcmPortParams {
            bits_per_sample: 16,
            channels: 2,
            sample_rate: 44_100,
        }));
        let core = RenderCore::new(
            RendererConfig::default(),
            Box::new(ScriptedSink::new()),
            port,
            EventBridge::new(tx),
        );
        (core, rx)
    }

    #[test]
    fn stream_state_envelope_updates_shadow_when_link_is_live() {
        let (mut core, rx) = core_with_bridge();
        core.allocate().unwrap();

        core.bridge().post_stream_state(StreamState::Failed);
        // Drain tasks the setup already queued, then ours.
        let mut saw_failed = false;
        while let Ok(task) = rx.try_recv() {
            if let RenderTask::Event(env) = task {
                env.dispatch(&mut core);
                if core.shadow_stream_state() == StreamState::Failed {
                    saw_failed = true;
                }
            }
        }
        assert!(saw_failed);
        core.teardown();
    }

    #[test]
    fn envelopes_are_ignored_without_a_live_link() {
        let (mut core, rx) = core_with_bridge();
        core.bridge().post_stream_state(StreamState::Ready);
        core.bridge().post_write_request(512);
        while let Ok(task) = rx.try_recv() {
            if let RenderTask::Event(env) = task {
                env.dispatch(&mut core);
            }
        }
        assert_eq!(core.shadow_stream_state(), StreamState::Unconnected);
        assert_eq!(core.pending_write_bytes(), 0);
    }

    #[test]
    fn posting_to_a_dropped_renderer_is_silent() {
        let (tx, rx) = crossbeam_channel::unbounded::<RenderTask>();
        let bridge = EventBridge::new(tx);
        drop(rx);
        bridge.post_write_request(128);
        bridge.post_stream_state(StreamState::Ready);
    }
}
