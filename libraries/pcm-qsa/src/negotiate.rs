//! Format negotiation
//!
//! Picks the first format in the host's fallback chain that the table can
//! express, submits it with the requested channel count and rate, then reads
//! the channel setup back to learn the period size the hardware settled on.

use crate::config::ChannelDefaults;
use crate::error::{QsaError, Result};
use crate::format::FormatTable;
use crate::sys::{ChannelParams, Direction, PcmChannel};
use pcm_core::{AudioSpec, DeviceFormat};
use tracing::debug;

/// Outcome of a successful negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Accepted spec
    pub spec: AudioSpec,
    /// Sample frames per period, as reported by the channel setup
    pub sample_frames: usize,
    /// Bytes per period
    pub buffer_size: usize,
}

impl From<Negotiated> for DeviceFormat {
    fn from(n: Negotiated) -> Self {
        DeviceFormat {
            spec: n.spec,
            sample_frames: n.sample_frames,
            buffer_size: n.buffer_size,
        }
    }
}

/// Negotiate a format for `desired` on an opened channel
pub fn negotiate<P: PcmChannel>(
    pcm: &mut P,
    direction: Direction,
    desired: &AudioSpec,
    table: &FormatTable,
    defaults: &ChannelDefaults,
) -> Result<Negotiated> {
    let mut params = ChannelParams::new(direction, defaults);

    let selected = table
        .select(desired.format.closest_formats())
        .ok_or(QsaError::NoCompatibleFormat)?;

    if selected.generic != desired.format {
        debug!(
            "{} not available, falling back to {}",
            desired.format, selected.generic
        );
    }

    params.format.format = selected.native;
    params.format.voices = u32::from(desired.channels);
    params.format.rate = desired.freq;

    pcm.plugin_params(&params)
        .map_err(QsaError::from_call("snd_pcm_plugin_params"))?;

    // Parameters being accepted does not guarantee the setup can be read
    let setup = pcm
        .plugin_setup(direction)
        .map_err(|_| QsaError::ChannelSetup)?;

    let sample_frames = setup.buf.frag_size as usize;
    if sample_frames == 0 {
        return Err(QsaError::ChannelSetup);
    }

    let spec = AudioSpec::new(selected.generic, desired.channels, desired.freq);
    let buffer_size = spec.buffer_size(sample_frames);

    debug!(
        "negotiated {} with {} frames per period ({} bytes)",
        spec, sample_frames, buffer_size
    );

    Ok(Negotiated {
        spec,
        sample_frames,
        buffer_size,
    })
}

/// Allocate a period buffer filled with `silence`
///
/// Allocation failure is reported rather than aborting the process.
pub fn allocate_buffer(size: usize, silence: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| QsaError::OutOfMemory(size))?;
    buffer.resize(size, silence);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FormatMapEntry, NativeFormat};
    use crate::sys::{BlockGeometry, ChannelMode, ChannelSetup, FormatBlock, MockPcmChannel};
    use mockall::predicate::*;
    use nix::errno::Errno;
    use pcm_core::AudioFormat;

    fn setup_with(frag_size: u32) -> ChannelSetup {
        ChannelSetup {
            direction: Direction::Playback,
            mode: ChannelMode::Block,
            format: FormatBlock {
                format: NativeFormat::S16_LE,
                interleave: true,
                rate: 48_000,
                voices: 2,
            },
            buf: BlockGeometry {
                frag_size,
                frags_min: 1,
                frags_max: 1,
            },
        }
    }

    #[test]
    fn submits_mapped_format_and_requested_geometry() {
        let mut pcm = MockPcmChannel::new();
        pcm.expect_plugin_params()
            .withf(|p| {
                p.format.format == NativeFormat::FLOAT_LE
                    && p.format.voices == 2
                    && p.format.rate == 48_000
                    && p.buf.frag_size == 4096
            })
            .times(1)
            .returning(|_| Ok(()));
        pcm.expect_plugin_setup()
            .with(eq(Direction::Playback))
            .times(1)
            .returning(|_| Ok(setup_with(512)));

        let desired = AudioSpec::new(AudioFormat::F32Le, 2, 48_000);
        let negotiated = negotiate(
            &mut pcm,
            Direction::Playback,
            &desired,
            &FormatTable::QSA,
            &ChannelDefaults::default(),
        )
        .unwrap();

        assert_eq!(negotiated.spec, desired);
        assert_eq!(negotiated.sample_frames, 512);
        assert_eq!(negotiated.buffer_size, 512 * 2 * 4);
    }

    #[test]
    fn falls_back_along_the_chain() {
        static S32BE_ONLY: [FormatMapEntry; 1] = [FormatMapEntry {
            generic: AudioFormat::S32Be,
            native: NativeFormat::S32_BE,
        }];

        let mut pcm = MockPcmChannel::new();
        pcm.expect_plugin_params()
            .withf(|p| p.format.format == NativeFormat::S32_BE)
            .returning(|_| Ok(()));
        pcm.expect_plugin_setup().returning(|_| Ok(setup_with(256)));

        let desired = AudioSpec::new(AudioFormat::S16Le, 1, 22_050);
        let negotiated = negotiate(
            &mut pcm,
            Direction::Playback,
            &desired,
            &FormatTable::new(&S32BE_ONLY),
            &ChannelDefaults::default(),
        )
        .unwrap();

        assert_eq!(negotiated.spec.format, AudioFormat::S32Be);
        assert_eq!(negotiated.spec.channels, 1);
        assert_eq!(negotiated.spec.freq, 22_050);
        assert_eq!(negotiated.buffer_size, 256 * 4);
    }

    #[test]
    fn no_mappable_format_never_touches_hardware() {
        static EMPTY: [FormatMapEntry; 0] = [];

        let mut pcm = MockPcmChannel::new();
        pcm.expect_plugin_params().never();
        pcm.expect_plugin_setup().never();

        let result = negotiate(
            &mut pcm,
            Direction::Playback,
            &AudioSpec::cd_quality(),
            &FormatTable::new(&EMPTY),
            &ChannelDefaults::default(),
        );
        assert!(matches!(result, Err(QsaError::NoCompatibleFormat)));
    }

    #[test]
    fn rejected_params_carry_native_error() {
        let mut pcm = MockPcmChannel::new();
        pcm.expect_plugin_params().returning(|_| Err(Errno::EINVAL));
        pcm.expect_plugin_setup().never();

        let result = negotiate(
            &mut pcm,
            Direction::Playback,
            &AudioSpec::cd_quality(),
            &FormatTable::QSA,
            &ChannelDefaults::default(),
        );
        assert!(matches!(
            result,
            Err(QsaError::Native {
                call: "snd_pcm_plugin_params",
                errno: Errno::EINVAL
            })
        ));
    }

    #[test]
    fn failed_setup_read_is_configuration_error() {
        let mut pcm = MockPcmChannel::new();
        pcm.expect_plugin_params().returning(|_| Ok(()));
        pcm.expect_plugin_setup().returning(|_| Err(Errno::EIO));

        let result = negotiate(
            &mut pcm,
            Direction::Playback,
            &AudioSpec::cd_quality(),
            &FormatTable::QSA,
            &ChannelDefaults::default(),
        );
        assert!(matches!(result, Err(QsaError::ChannelSetup)));
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut pcm = MockPcmChannel::new();
        pcm.expect_plugin_params().returning(|_| Ok(()));
        pcm.expect_plugin_setup().returning(|_| Ok(setup_with(0)));

        let result = negotiate(
            &mut pcm,
            Direction::Playback,
            &AudioSpec::cd_quality(),
            &FormatTable::QSA,
            &ChannelDefaults::default(),
        );
        assert!(matches!(result, Err(QsaError::ChannelSetup)));
    }

    #[test]
    fn buffer_is_filled_with_silence() {
        let buffer = allocate_buffer(64, 0x80).unwrap();
        assert_eq!(buffer.len(), 64);
        assert!(buffer.iter().all(|b| *b == 0x80));
    }

    #[test]
    fn impossible_allocation_is_out_of_memory() {
        let result = allocate_buffer(usize::MAX, 0);
        assert!(matches!(result, Err(QsaError::OutOfMemory(usize::MAX))));
    }
}
