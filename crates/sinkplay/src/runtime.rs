//! Wires a PCM source into the renderer and drives it to end of stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cpal::traits::{DeviceTrait, HostTrait};
use pcm_renderer::backend::cpal::CpalSink;
use pcm_renderer::backend::null::NullSink;
use pcm_renderer::config::RendererConfig;
use pcm_renderer::port::{FilledBuffer, PortEvent, QueuePort};
use pcm_renderer::renderer::PcmRenderer;
use pcm_renderer::sink::SinkConnector;

use crate::source::PcmSource;

pub struct RunOptions {
    pub device: Option<String>,
    pub null: bool,
    pub connect_timeout: Duration,
    pub buffer_bytes: usize,
    pub queue_depth: usize,
}

pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

/// Play one source through the renderer: allocate, feed buffers with
/// recycling, wait for the end-of-stream notification, and tear down.
pub fn play(source: PcmSource, opts: &RunOptions) -> Result<()> {
    if source.bytes.is_empty() {
        bail!("source holds no PCM payload");
    }
    tracing::info!(
        spec = %source.spec(),
        bytes = source.bytes.len(),
        secs = source.duration_secs(),
        "queueing PCM"
    );

    let port = Arc::new(QueuePort::new(source.params));
    let config = RendererConfig {
        app_name: "sinkplay".into(),
        stream_name: "sinkplay playback".into(),
        sink: opts.device.clone(),
        connect_timeout: Some(opts.connect_timeout),
        ..RendererConfig::default()
    };
    let connector: Box<dyn SinkConnector> = if opts.null {
        Box::new(NullSink::new())
    } else {
        Box::new(CpalSink::new())
    };

    let renderer = PcmRenderer::new(config, connector, port.clone());
    renderer
        .allocate_resources()
        .context("allocate renderer resources")?;
    renderer.prepare_to_transfer()?;
    renderer.transfer_and_process()?;

    feed(&renderer, &port, &source, opts)?;

    let deadline = Duration::from_secs_f64(source.duration_secs() * 2.0 + 5.0);
    match port.wait_event(deadline) {
        Some(PortEvent::EndOfStream) => tracing::info!("end of stream"),
        None => tracing::warn!("timed out waiting for end of stream"),
    }

    let status = renderer.status()?;
    tracing::info!(
        bytes = status.bytes_written,
        buffers = status.buffers_rendered,
        write_failures = status.write_failures,
        "render finished"
    );

    renderer.stop_and_return()?;
    renderer.deallocate_resources()?;
    Ok(())
}

/// Split the payload into port buffers, recycling released ones once
/// `queue_depth` are in flight. The last buffer carries the EOS mark.
fn feed(
    renderer: &PcmRenderer,
    port: &QueuePort,
    source: &PcmSource,
    opts: &RunOptions,
) -> Result<()> {
    let chunk_size = opts.buffer_bytes.max(source.spec().frame_size());
    let total = source.bytes.len().div_ceil(chunk_size);
    let mut allocated = 0usize;

    for (i, chunk) in source.bytes.chunks(chunk_size).enumerate() {
        let mut buffer = if allocated < opts.queue_depth.max(1) {
            allocated += 1;
            FilledBuffer::new(vec![0; chunk_size])
        } else {
            port.wait_free(Duration::from_secs(10))
                .context("renderer stopped returning buffers")?
        };
        buffer.data[..chunk.len()].copy_from_slice(chunk);
        buffer.offset = 0;
        buffer.filled = chunk.len();
        buffer.eos = i + 1 == total;
        port.queue_buffer(buffer);
        renderer.on_buffers_ready()?;
    }

    tracing::debug!(buffers = total, "all payload queued");
    Ok(())
}
