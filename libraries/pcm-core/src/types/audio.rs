/// Audio-related types
use serde::{Deserialize, Serialize};

/// Generic sample format understood by the host
///
/// Each variant names width, signedness and byte order. Backends map these
/// onto whatever their hardware calls the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Unsigned 8-bit
    U8,
    /// Signed 8-bit
    S8,
    /// Signed 16-bit, little endian
    S16Le,
    /// Signed 16-bit, big endian
    S16Be,
    /// Signed 32-bit, little endian
    S32Le,
    /// Signed 32-bit, big endian
    S32Be,
    /// 32-bit IEEE float, little endian
    F32Le,
    /// 32-bit IEEE float, big endian
    F32Be,
}

use AudioFormat::{F32Be, F32Le, S16Be, S16Le, S32Be, S32Le, S8, U8};

const CLOSEST_U8: [AudioFormat; 8] = [U8, S8, S16Le, S16Be, S32Le, S32Be, F32Le, F32Be];
const CLOSEST_S8: [AudioFormat; 8] = [S8, U8, S16Le, S16Be, S32Le, S32Be, F32Le, F32Be];
const CLOSEST_S16LE: [AudioFormat; 8] = [S16Le, S16Be, S32Le, S32Be, F32Le, F32Be, S8, U8];
const CLOSEST_S16BE: [AudioFormat; 8] = [S16Be, S16Le, S32Be, S32Le, F32Be, F32Le, S8, U8];
const CLOSEST_S32LE: [AudioFormat; 8] = [S32Le, S32Be, F32Le, F32Be, S16Le, S16Be, S8, U8];
const CLOSEST_S32BE: [AudioFormat; 8] = [S32Be, S32Le, F32Be, F32Le, S16Be, S16Le, S8, U8];
const CLOSEST_F32LE: [AudioFormat; 8] = [F32Le, F32Be, S32Le, S32Be, S16Le, S16Be, S8, U8];
const CLOSEST_F32BE: [AudioFormat; 8] = [F32Be, F32Le, S32Be, S32Le, S16Be, S16Le, S8, U8];

impl AudioFormat {
    /// Every generic format, in declaration order
    pub const ALL: [AudioFormat; 8] = [U8, S8, S16Le, S16Be, S32Le, S32Be, F32Le, F32Be];

    /// Signed 16-bit in the byte order of the running machine
    #[cfg(target_endian = "little")]
    pub const S16: Self = S16Le;
    /// Signed 16-bit in the byte order of the running machine
    #[cfg(target_endian = "big")]
    pub const S16: Self = S16Be;

    /// Signed 32-bit in the byte order of the running machine
    #[cfg(target_endian = "little")]
    pub const S32: Self = S32Le;
    /// Signed 32-bit in the byte order of the running machine
    #[cfg(target_endian = "big")]
    pub const S32: Self = S32Be;

    /// 32-bit float in the byte order of the running machine
    #[cfg(target_endian = "little")]
    pub const F32: Self = F32Le;
    /// 32-bit float in the byte order of the running machine
    #[cfg(target_endian = "big")]
    pub const F32: Self = F32Be;

    /// Bits per sample
    pub fn bits(&self) -> u16 {
        match self {
            U8 | S8 => 8,
            S16Le | S16Be => 16,
            S32Le | S32Be | F32Le | F32Be => 32,
        }
    }

    /// Bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits() / 8)
    }

    /// Whether samples are signed
    pub fn is_signed(&self) -> bool {
        !matches!(self, U8)
    }

    /// Whether samples are IEEE floats
    pub fn is_float(&self) -> bool {
        matches!(self, F32Le | F32Be)
    }

    /// Whether multi-byte samples are stored most significant byte first
    pub fn is_big_endian(&self) -> bool {
        matches!(self, S16Be | S32Be | F32Be)
    }

    /// Byte value that encodes silence in this format
    ///
    /// Unsigned 8-bit audio is centred on 0x80; everything else is centred on zero.
    pub fn silence_value(&self) -> u8 {
        match self {
            U8 => 0x80,
            _ => 0x00,
        }
    }

    /// The host's fallback chain for this format
    ///
    /// The first entry is always the format itself, followed by the formats
    /// that lose the least when substituted for it.
    pub fn closest_formats(&self) -> &'static [AudioFormat] {
        match self {
            U8 => &CLOSEST_U8,
            S8 => &CLOSEST_S8,
            S16Le => &CLOSEST_S16LE,
            S16Be => &CLOSEST_S16BE,
            S32Le => &CLOSEST_S32LE,
            S32Be => &CLOSEST_S32BE,
            F32Le => &CLOSEST_F32LE,
            F32Be => &CLOSEST_F32BE,
        }
    }

    /// Short lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            U8 => "u8",
            S8 => "s8",
            S16Le => "s16le",
            S16Be => "s16be",
            S32Le => "s32le",
            S32Be => "s32be",
            F32Le => "f32le",
            F32Be => "f32be",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sample format, channel count and rate of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioSpec {
    /// Sample format
    pub format: AudioFormat,

    /// Number of interleaved channels (1 = mono, 2 = stereo, ...)
    pub channels: u8,

    /// Sample frames per second
    pub freq: u32,
}

impl AudioSpec {
    /// Create a new spec
    pub fn new(format: AudioFormat, channels: u8, freq: u32) -> Self {
        Self {
            format,
            channels,
            freq,
        }
    }

    /// CD quality stereo (44.1kHz, native-endian 16-bit, stereo)
    pub fn cd_quality() -> Self {
        Self::new(AudioFormat::S16, 2, 44_100)
    }

    /// Bytes in one sample frame (one sample for every channel)
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * usize::from(self.channels)
    }

    /// Bytes needed to hold `sample_frames` frames
    pub fn buffer_size(&self, sample_frames: usize) -> usize {
        self.frame_size() * sample_frames
    }
}

impl std::fmt::Display for AudioSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}ch {}Hz", self.format, self.channels, self.freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_midpoint_for_unsigned() {
        assert_eq!(AudioFormat::U8.silence_value(), 0x80);
        for format in AudioFormat::ALL.iter().filter(|f| **f != AudioFormat::U8) {
            assert_eq!(format.silence_value(), 0, "{format}");
        }
    }

    #[test]
    fn closest_formats_start_with_self() {
        for format in AudioFormat::ALL {
            let chain = format.closest_formats();
            assert_eq!(chain[0], format);
            assert_eq!(chain.len(), AudioFormat::ALL.len());
        }
    }

    #[test]
    fn closest_formats_cover_every_format_once() {
        for format in AudioFormat::ALL {
            let chain = format.closest_formats();
            for candidate in AudioFormat::ALL {
                assert_eq!(
                    chain.iter().filter(|f| **f == candidate).count(),
                    1,
                    "{candidate} in chain for {format}"
                );
            }
        }
    }

    #[test]
    fn s16_prefers_other_endianness_before_widening() {
        assert_eq!(AudioFormat::S16Le.closest_formats()[1], AudioFormat::S16Be);
        assert_eq!(AudioFormat::F32Be.closest_formats()[1], AudioFormat::F32Le);
    }

    #[test]
    fn format_widths() {
        assert_eq!(AudioFormat::U8.bytes_per_sample(), 1);
        assert_eq!(AudioFormat::S16Be.bytes_per_sample(), 2);
        assert_eq!(AudioFormat::F32Le.bytes_per_sample(), 4);
        assert!(AudioFormat::F32Le.is_float());
        assert!(!AudioFormat::U8.is_signed());
        assert!(AudioFormat::S32Be.is_big_endian());
    }

    #[test]
    fn spec_buffer_size() {
        let spec = AudioSpec::new(AudioFormat::S16Le, 2, 48_000);
        assert_eq!(spec.frame_size(), 4);
        // 1024 frames * 2 channels * 2 bytes
        assert_eq!(spec.buffer_size(1024), 4096);
    }

    #[test]
    fn spec_serializes_lowercase_format() {
        let json = serde_json::to_string(&AudioSpec::new(AudioFormat::F32Le, 1, 8000)).unwrap();
        assert!(json.contains("\"f32le\""), "{json}");
    }
}
