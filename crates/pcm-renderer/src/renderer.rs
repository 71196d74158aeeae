//! Public renderer handle and its worker thread.
//!
//! The renderer runs as a single worker owning a [`RenderCore`]; everything
//! reaches it through one task channel, which is what serializes lifecycle
//! hooks, producer notifications, and bridged sink events. Lifecycle hooks
//! block on a rendezvous reply so callers get synchronous results, while
//! [`PcmRenderer::on_buffers_ready`] is fire-and-forget and never blocks the
//! producer on server progress.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::bridge::{Envelope, EventBridge};
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::port::InputPort;
use crate::render::RenderCore;
use crate::sink::SinkConnector;
use crate::status::RendererStatus;

pub(crate) enum RenderTask {
    Allocate(Sender<Result<()>>),
    Deallocate(Sender<Result<()>>),
    PrepareToTransfer(Sender<Result<()>>),
    TransferAndProcess(Sender<Result<()>>),
    StopAndReturn(Sender<Result<()>>),
    BuffersReady,
    SetPortDisabled(bool),
    Event(Box<Envelope>),
    Status(Sender<RendererStatus>),
    Shutdown,
}

/// Handle to a PCM renderer worker.
///
/// Dropping the handle tears down sink resources and joins the worker.
pub struct PcmRenderer {
    tasks: Sender<RenderTask>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl PcmRenderer {
    /// Spawn the renderer worker. The worker stays idle until
    /// [`allocate_resources`](Self::allocate_resources).
    pub fn new(
        config: RendererConfig,
        connector: Box<dyn SinkConnector>,
        port: Arc<dyn InputPort>,
    ) -> Self {
        let (tasks, rx) = crossbeam_channel::unbounded();
        let bridge = EventBridge::new(tasks.clone());
        let worker = std::thread::spawn(move || {
            renderer_thread_main(config, connector, port, bridge, rx);
        });
        Self {
            tasks,
            worker: Some(worker),
        }
    }

    /// Establish the event loop, server connection, and playback stream.
    /// Safe to call again; existing pieces are reused.
    pub fn allocate_resources(&self) -> Result<()> {
        self.call(RenderTask::Allocate)
    }

    /// Tear everything down again. Safe to call at any time.
    pub fn deallocate_resources(&self) -> Result<()> {
        self.call(RenderTask::Deallocate)
    }

    /// Transition hook kept for lifecycle symmetry; nothing to prepare.
    pub fn prepare_to_transfer(&self) -> Result<()> {
        self.call(RenderTask::PrepareToTransfer)
    }

    /// Transition hook kept for lifecycle symmetry; rendering is driven by
    /// buffer arrival.
    pub fn transfer_and_process(&self) -> Result<()> {
        self.call(RenderTask::TransferAndProcess)
    }

    /// Transition hook kept for lifecycle symmetry; buffers in flight are
    /// settled by [`deallocate_resources`](Self::deallocate_resources).
    pub fn stop_and_return(&self) -> Result<()> {
        self.call(RenderTask::StopAndReturn)
    }

    /// Tell the renderer that buffers are waiting on the port. Triggers a
    /// render pass if the stream is ready; otherwise a no-op. Never blocks.
    pub fn on_buffers_ready(&self) -> Result<()> {
        self.tasks
            .send(RenderTask::BuffersReady)
            .map_err(|_| Error::Worker)
    }

    /// Disable or re-enable rendering from the input port.
    pub fn set_port_disabled(&self, disabled: bool) -> Result<()> {
        self.tasks
            .send(RenderTask::SetPortDisabled(disabled))
            .map_err(|_| Error::Worker)
    }

    /// Snapshot of the renderer's current state and counters.
    pub fn status(&self) -> Result<RendererStatus> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tasks
            .send(RenderTask::Status(reply_tx))
            .map_err(|_| Error::Worker)?;
        reply_rx.recv().map_err(|_| Error::Worker)
    }

    fn call(&self, make: impl FnOnce(Sender<Result<()>>) -> RenderTask) -> Result<()> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tasks
            .send(make(reply_tx))
            .map_err(|_| Error::Worker)?;
        reply_rx.recv().map_err(|_| Error::Worker)?
    }
}

impl Drop for PcmRenderer {
    fn drop(&mut self) {
        let _ = self.tasks.send(RenderTask::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn renderer_thread_main(
    config: RendererConfig,
    connector: Box<dyn SinkConnector>,
    port: Arc<dyn InputPort>,
    bridge: EventBridge,
    rx: Receiver<RenderTask>,
) {
    let mut core = RenderCore::new(config, connector, port, bridge);
    while let Ok(task) = rx.recv() {
        match task {
            RenderTask::Allocate(reply) => {
                let _ = reply.send(core.allocate());
            }
            RenderTask::Deallocate(reply) => {
                core.teardown();
                let _ = reply.send(Ok(()));
            }
            RenderTask::PrepareToTransfer(reply)
            | RenderTask::TransferAndProcess(reply)
            | RenderTask::StopAndReturn(reply) => {
                let _ = reply.send(Ok(()));
            }
            RenderTask::BuffersReady => core.render_pass(),
            RenderTask::SetPortDisabled(disabled) => core.set_port_disabled(disabled),
            RenderTask::Event(envelope) => {
                envelope.dispatch(&mut core);
                // State flips and write-readiness both unblock rendering;
                // the pass is a no-op unless the stream is ready.
                core.render_pass();
            }
            RenderTask::Status(reply) => {
                let _ = reply.send(core.status());
            }
            RenderTask::Shutdown => {
                core.teardown();
                break;
            }
        }
    }
    tracing::debug!("renderer worker exited");
}
