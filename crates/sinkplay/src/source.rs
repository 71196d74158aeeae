//! PCM sources: WAV files and generated tones.

use std::path::Path;

use anyhow::{Context, Result, bail};
use pcm_renderer::format::{PcmPortParams, SampleSpec};

/// Interleaved native-endian PCM plus the port parameters describing it.
pub struct PcmSource {
    pub params: PcmPortParams,
    pub bytes: Vec<u8>,
}

impl PcmSource {
    pub fn spec(&self) -> SampleSpec {
        SampleSpec::from_port_params(&self.params)
    }

    pub fn duration_secs(&self) -> f64 {
        self.bytes.len() as f64 / self.spec().bytes_per_second() as f64
    }
}

/// Load a PCM WAV file into renderer-ready bytes.
///
/// 16-bit and 24-bit integer samples keep their width. 32-bit integer and
/// 32-bit float samples both land as signed 32-bit native, which is how a
/// 32-bit port is rendered.
pub fn load_wav(path: &Path) -> Result<PcmSource> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();

    let mut bytes = Vec::new();
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            for s in reader.samples::<i16>() {
                bytes.extend_from_slice(&s?.to_ne_bytes());
            }
        }
        (hound::SampleFormat::Int, 24) => {
            for s in reader.samples::<i32>() {
                push_s24(&mut bytes, s?);
            }
        }
        (hound::SampleFormat::Int, 32) => {
            for s in reader.samples::<i32>() {
                bytes.extend_from_slice(&s?.to_ne_bytes());
            }
        }
        (hound::SampleFormat::Float, 32) => {
            for s in reader.samples::<f32>() {
                bytes.extend_from_slice(&float_to_i32(s?).to_ne_bytes());
            }
        }
        (format, bits) => bail!(
            "unsupported WAV encoding {format:?}/{bits} in {}",
            path.display()
        ),
    }

    Ok(PcmSource {
        params: PcmPortParams {
            bits_per_sample: u32::from(spec.bits_per_sample),
            channels: u32::from(spec.channels),
            sample_rate: spec.sample_rate,
        },
        bytes,
    })
}

/// Stereo 16-bit sine tone at moderate volume.
pub fn tone(freq: f32, secs: f32, rate: u32) -> PcmSource {
    let frames = (f64::from(secs.max(0.0)) * f64::from(rate)) as usize;
    let step = f64::from(freq) * std::f64::consts::TAU / f64::from(rate);
    let mut bytes = Vec::with_capacity(frames * 4);
    for n in 0..frames {
        let sample = ((n as f64 * step).sin() * 0.3 * f64::from(i16::MAX)) as i16;
        for _ in 0..2 {
            bytes.extend_from_slice(&sample.to_ne_bytes());
        }
    }
    PcmSource {
        params: PcmPortParams {
            bits_per_sample: 16,
            channels: 2,
            sample_rate: rate,
        },
        bytes,
    }
}

fn push_s24(out: &mut Vec<u8>, sample: i32) {
    if cfg!(target_endian = "little") {
        out.extend_from_slice(&sample.to_le_bytes()[..3]);
    } else {
        out.extend_from_slice(&sample.to_be_bytes()[1..]);
    }
}

fn float_to_i32(sample: f32) -> i32 {
    (f64::from(sample.clamp(-1.0, 1.0)) * f64::from(i32::MAX)) as i32
}
