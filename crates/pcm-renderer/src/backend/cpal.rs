//! Playback backend on the local audio host (cpal).
//!
//! The stream side keeps a byte ring between the renderer and the device
//! callback: [`SinkStream::write`] appends raw payload without blocking (the
//! ring absorbs whatever the renderer pushes, like a server-side buffer
//! would), the callback drains whole samples, decodes them per the stream's
//! [`SampleFormat`], and converts to the device sample type. Underruns are
//! filled with silence. Write-readiness events carry the ring's free space
//! below the watermark, and device errors surface as a `Failed` stream
//! state. Disconnecting lets queued payload play out before pausing.
//!
//! Device and config selection requires an exact rate and channel match;
//! there is no resampler behind this seam.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{Error, Result};
use crate::format::{SampleFormat, SampleSpec};
use crate::mainloop::EventInjector;
use crate::sink::{
    ConnectionState, SinkConnection, SinkConnector, SinkEvent, SinkStream, StreamState,
};

/// Connector backed by the host's default audio backend.
pub struct CpalSink;

impl CpalSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkConnector for CpalSink {
    fn connect(
        &mut self,
        app_name: &str,
        media_role: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkConnection>> {
        events.post(SinkEvent::Connection(ConnectionState::Connecting));
        let host = cpal::default_host();
        let has_output = host
            .output_devices()
            .map(|mut devices| devices.next().is_some())
            .unwrap_or(false)
            || host.default_output_device().is_some();
        if !has_output {
            events.post(SinkEvent::Connection(ConnectionState::Failed));
            return Err(Error::Resource("host has no output devices".into()));
        }
        tracing::debug!(
            app = app_name,
            role = media_role.unwrap_or(""),
            "audio host opened"
        );
        events.post(SinkEvent::Connection(ConnectionState::Ready));
        Ok(Box::new(CpalConnection { host, events }))
    }
}

struct CpalConnection {
    host: cpal::Host,
    events: EventInjector,
}

impl SinkConnection for CpalConnection {
    fn create_stream(
        &mut self,
        name: &str,
        spec: &SampleSpec,
        sink: Option<&str>,
        events: EventInjector,
    ) -> Result<Box<dyn SinkStream>> {
        events.post(SinkEvent::Stream(StreamState::Creating));
        match open_stream(&self.host, name, spec, sink, &events) {
            Ok(stream) => Ok(stream),
            Err(e) => {
                events.post(SinkEvent::Stream(StreamState::Failed));
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.events
            .post(SinkEvent::Connection(ConnectionState::Terminated));
    }
}

struct RingInner {
    bytes: VecDeque<u8>,
    closed: bool,
    underrun_callbacks: u64,
}

struct PayloadRing {
    inner: Mutex<RingInner>,
    capacity: usize,
}

struct CpalStream {
    stream: cpal::Stream,
    ring: Arc<PayloadRing>,
    /// Payload bytes the device consumes per second; sizes the drain wait.
    drain_rate: usize,
    events: EventInjector,
}

impl SinkStream for CpalStream {
    fn write(&mut self, payload: &[u8]) -> Result<()> {
        let mut ring = self.ring.inner.lock().unwrap();
        if ring.closed {
            return Err(Error::Resource("output stream closed".into()));
        }
        ring.bytes.extend(payload.iter().copied());
        Ok(())
    }

    fn disconnect(&mut self) {
        let (queued, underruns) = {
            let mut ring = self.ring.inner.lock().unwrap();
            ring.closed = true;
            (ring.bytes.len(), ring.underrun_callbacks)
        };

        // Orderly close: give the callback time to play what is queued, with
        // a margin in case the device has stalled.
        let secs = queued as f64 / self.drain_rate.max(1) as f64;
        let deadline = Instant::now() + Duration::from_secs_f64(secs + 2.0);
        while Instant::now() < deadline {
            if self.ring.inner.lock().unwrap().bytes.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let _ = self.stream.pause();
        tracing::debug!(underruns, "output stream closed");
        self.events.post(SinkEvent::Stream(StreamState::Terminated));
    }
}

fn open_stream(
    host: &cpal::Host,
    name: &str,
    spec: &SampleSpec,
    sink: Option<&str>,
    events: &EventInjector,
) -> Result<Box<dyn SinkStream>> {
    let device = pick_device(host, sink)?;
    let description = device
        .description()
        .map(|d| d.to_string())
        .unwrap_or_else(|_| "unknown".into());
    let chosen = pick_stream_config(&device, spec)?;
    let stream_config = chosen.config();

    // Watermark for write-readiness hints: half a second of payload.
    let capacity = (spec.bytes_per_second() / 2).max(spec.frame_size());
    let ring = Arc::new(PayloadRing {
        inner: Mutex::new(RingInner {
            bytes: VecDeque::with_capacity(capacity),
            closed: false,
            underrun_callbacks: 0,
        }),
        capacity,
    });

    let stream = match chosen.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &stream_config, spec.format, &ring, events.clone())
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &stream_config, spec.format, &ring, events.clone())
        }
        cpal::SampleFormat::I32 => {
            build_stream::<i32>(&device, &stream_config, spec.format, &ring, events.clone())
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &stream_config, spec.format, &ring, events.clone())
        }
        other => Err(Error::Resource(format!(
            "unsupported device sample format {other:?}"
        ))),
    }?;
    stream
        .play()
        .map_err(|e| Error::Resource(format!("output stream start failed: {e}")))?;

    tracing::info!(name, spec = %spec, device = %description, "playback stream running");
    events.post(SinkEvent::Stream(StreamState::Ready));
    events.post(SinkEvent::WriteRequested(capacity));
    Ok(Box::new(CpalStream {
        stream,
        ring,
        drain_rate: spec.bytes_per_second(),
        events: events.clone(),
    }))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: SampleFormat,
    ring: &Arc<PayloadRing>,
    events: EventInjector,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let ring_cb = ring.clone();
    let events_cb = events.clone();
    let err_fn = move |err| {
        tracing::warn!("output stream error: {err}");
        events.post(SinkEvent::Stream(StreamState::Failed));
    };

    let bytes_per_sample = format.bytes_per_sample();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let mut ring = ring_cb.inner.lock().unwrap();
                let available = ring.bytes.len() / bytes_per_sample;
                let produced = available.min(data.len());
                let mut raw = [0u8; 4];
                for slot in data.iter_mut().take(produced) {
                    for b in raw.iter_mut().take(bytes_per_sample) {
                        *b = ring.bytes.pop_front().unwrap_or(0);
                    }
                    let sample = format.sample_to_f32(&raw[..bytes_per_sample]);
                    *slot = <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                if produced < data.len() && !ring.closed {
                    ring.underrun_callbacks += 1;
                }
                let free = ring_cb.capacity.saturating_sub(ring.bytes.len());
                drop(ring);

                for slot in data.iter_mut().skip(produced) {
                    *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
                }
                if free > 0 {
                    events_cb.post(SinkEvent::WriteRequested(free));
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::Resource(format!("output stream build failed: {e}")))
}

/// First output device whose name contains `needle` (case-insensitive), or
/// the host default when no needle is given.
fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .map_err(|e| Error::Resource(format!("output device enumeration failed: {e}")))?
        .collect();

    if let Some(needle) = needle {
        if let Some(device) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.to_string(), needle))
                .unwrap_or(false)
        }) {
            return Ok(device);
        }
        return Err(Error::Resource(format!(
            "no output device matched \"{needle}\""
        )));
    }

    host.default_output_device()
        .ok_or_else(|| Error::Resource("no default output device".into()))
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// Cheapest supported config that plays `spec` without conversion: exact
/// rate, exact channel count, best-ranked device sample format.
fn pick_stream_config(
    device: &cpal::Device,
    spec: &SampleSpec,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| Error::Resource(format!("output config query failed: {e}")))?;

    let mut best: Option<(u8, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        if u32::from(range.channels()) != spec.channels {
            continue;
        }
        if spec.rate < range.min_sample_rate() || spec.rate > range.max_sample_rate() {
            continue;
        }
        let rank = sample_format_rank(range.sample_format());
        if rank == u8::MAX {
            continue;
        }
        if best.as_ref().map(|(r, _)| rank < *r).unwrap_or(true) {
            best = Some((rank, range.with_sample_rate(spec.rate)));
        }
    }
    best.map(|(_, config)| config).ok_or_else(|| {
        Error::Resource(format!("no output config for {spec} on this device"))
    })
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => u8::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_name_matching_is_case_insensitive() {
        assert!(matches_device_name("Family 17h HD Audio", "hd audio"));
        assert!(matches_device_name("USB DAC", "usb"));
        assert!(!matches_device_name("USB DAC", "hdmi"));
    }

    #[test]
    fn float_formats_outrank_integer_ones() {
        assert!(
            sample_format_rank(cpal::SampleFormat::F32)
                < sample_format_rank(cpal::SampleFormat::I32)
        );
        assert!(
            sample_format_rank(cpal::SampleFormat::I32)
                < sample_format_rank(cpal::SampleFormat::U16)
        );
        assert_eq!(sample_format_rank(cpal::SampleFormat::I8), u8::MAX);
    }
}
