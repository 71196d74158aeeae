//! PCM sample description and the port-parameter mapping used when a stream
//! is created. Payload stays raw bytes end to end; only the cpal backend
//! decodes samples (to feed an `f32` device stream).

use std::fmt;

/// Highest sample rate accepted as sane.
pub const RATE_MAX: u32 = 384_000;
/// Highest channel count accepted as sane.
pub const CHANNELS_MAX: u32 = 32;

/// Native-endian integer sample encodings carried by producer buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit.
    S16Ne,
    /// Signed 24-bit, packed in 3 bytes.
    S24Ne,
    /// Signed 32-bit.
    S32Ne,
}

impl SampleFormat {
    /// Bytes occupied by one sample of one channel.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Ne => 2,
            SampleFormat::S24Ne => 3,
            SampleFormat::S32Ne => 4,
        }
    }

    /// Decode one sample from `raw` into `[-1.0, 1.0)`.
    ///
    /// `raw` must be exactly [`bytes_per_sample`](Self::bytes_per_sample)
    /// bytes, in native byte order.
    pub fn sample_to_f32(self, raw: &[u8]) -> f32 {
        debug_assert_eq!(raw.len(), self.bytes_per_sample());
        match self {
            SampleFormat::S16Ne => {
                let v = i16::from_ne_bytes([raw[0], raw[1]]);
                f32::from(v) / 32768.0
            }
            SampleFormat::S24Ne => {
                let v = if cfg!(target_endian = "little") {
                    (i32::from(raw[2] as i8) << 16) | (i32::from(raw[1]) << 8) | i32::from(raw[0])
                } else {
                    (i32::from(raw[0] as i8) << 16) | (i32::from(raw[1]) << 8) | i32::from(raw[2])
                };
                v as f32 / 8_388_608.0
            }
            SampleFormat::S32Ne => {
                let v = i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]);
                v as f32 / 2_147_483_648.0
            }
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::S16Ne => "s16ne",
            SampleFormat::S24Ne => "s24ne",
            SampleFormat::S32Ne => "s32ne",
        };
        f.write_str(name)
    }
}

/// PCM mode parameters reported by the input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmPortParams {
    /// Bits per sample of one channel (16, 24, 32, ...).
    pub bits_per_sample: u32,
    /// Interleaved channel count.
    pub channels: u32,
    /// Sampling rate in Hz.
    pub sample_rate: u32,
}

/// Sample description handed to the sink when the stream is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u32,
}

impl SampleSpec {
    /// Derive the stream's sample spec from port PCM parameters.
    ///
    /// 24-bit payload maps to [`SampleFormat::S24Ne`]. 32-bit payload maps to
    /// [`SampleFormat::S32Ne`] without inspecting numeric type, which lets
    /// float-producing decoders pass their payload through as raw 32-bit
    /// samples. Every other depth falls back to [`SampleFormat::S16Ne`].
    pub fn from_port_params(params: &PcmPortParams) -> Self {
        let format = match params.bits_per_sample {
            24 => SampleFormat::S24Ne,
            32 => SampleFormat::S32Ne,
            _ => SampleFormat::S16Ne,
        };
        Self {
            format,
            rate: params.sample_rate,
            channels: params.channels,
        }
    }

    /// Whether rate and channel count are inside sane bounds.
    pub fn is_valid(&self) -> bool {
        self.rate > 0
            && self.rate <= RATE_MAX
            && self.channels > 0
            && self.channels <= CHANNELS_MAX
    }

    /// Bytes per interleaved frame (all channels, one sample each).
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Payload bytes consumed per second of playback.
    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.rate as usize
    }
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}ch {}Hz", self.format, self.channels, self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(bits: u32) -> PcmPortParams {
        PcmPortParams {
            bits_per_sample: bits,
            channels: 2,
            sample_rate: 44_100,
        }
    }

    #[test]
    fn maps_24_bit_to_packed_s24() {
        let spec = SampleSpec::from_port_params(&params(24));
        assert_eq!(spec.format, SampleFormat::S24Ne);
        assert_eq!(spec.rate, 44_100);
        assert_eq!(spec.channels, 2);
    }

    #[test]
    fn maps_32_bit_to_s32() {
        assert_eq!(
            SampleSpec::from_port_params(&params(32)).format,
            SampleFormat::S32Ne
        );
    }

    #[test]
    fn unusual_depths_fall_back_to_s16() {
        for bits in [8, 16, 20, 64] {
            assert_eq!(
                SampleSpec::from_port_params(&params(bits)).format,
                SampleFormat::S16Ne,
                "bits={bits}"
            );
        }
    }

    #[test]
    fn frame_and_throughput_sizes() {
        let spec = SampleSpec {
            format: SampleFormat::S24Ne,
            rate: 48_000,
            channels: 2,
        };
        assert_eq!(spec.frame_size(), 6);
        assert_eq!(spec.bytes_per_second(), 288_000);
    }

    #[test]
    fn validity_bounds() {
        let mut spec = SampleSpec {
            format: SampleFormat::S16Ne,
            rate: 48_000,
            channels: 2,
        };
        assert!(spec.is_valid());
        spec.rate = 0;
        assert!(!spec.is_valid());
        spec.rate = RATE_MAX + 1;
        assert!(!spec.is_valid());
        spec.rate = 48_000;
        spec.channels = 0;
        assert!(!spec.is_valid());
        spec.channels = CHANNELS_MAX + 1;
        assert!(!spec.is_valid());
    }

    #[test]
    fn decodes_s16_extremes_and_zero() {
        let f = SampleFormat::S16Ne;
        assert_eq!(f.sample_to_f32(&0i16.to_ne_bytes()), 0.0);
        assert_eq!(f.sample_to_f32(&i16::MIN.to_ne_bytes()), -1.0);
        let max = f.sample_to_f32(&i16::MAX.to_ne_bytes());
        assert!(max > 0.999 && max < 1.0);
    }

    #[test]
    fn decodes_packed_s24() {
        let f = SampleFormat::S24Ne;
        // -8388608 (min) packs as 0x00 0x00 0x80 little-endian.
        let min = if cfg!(target_endian = "little") {
            [0x00, 0x00, 0x80]
        } else {
            [0x80, 0x00, 0x00]
        };
        assert_eq!(f.sample_to_f32(&min), -1.0);
        assert_eq!(f.sample_to_f32(&[0x00, 0x00, 0x00]), 0.0);
        let one = if cfg!(target_endian = "little") {
            [0x01, 0x00, 0x00]
        } else {
            [0x00, 0x00, 0x01]
        };
        assert!(f.sample_to_f32(&one) > 0.0);
    }

    #[test]
    fn decodes_s32_extremes() {
        let f = SampleFormat::S32Ne;
        assert_eq!(f.sample_to_f32(&i32::MIN.to_ne_bytes()), -1.0);
        assert_eq!(f.sample_to_f32(&0i32.to_ne_bytes()), 0.0);
        let max = f.sample_to_f32(&i32::MAX.to_ne_bytes());
        assert!(max > 0.999_999 && max <= 1.0);
    }
}
