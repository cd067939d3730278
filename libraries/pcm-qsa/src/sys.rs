//! Native subsystem seam
//!
//! These traits describe exactly the QSA calls the backend makes. Native
//! errors are reported as [`Errno`] values; a call that transfers data
//! reports how much it moved.

use crate::config::ChannelDefaults;
use crate::format::NativeFormat;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use serde::{Deserialize, Serialize};
use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Stream direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Host → hardware
    Playback,
    /// Hardware → host
    Capture,
}

impl Direction {
    /// Direction for a host `recording` flag
    pub fn from_recording(recording: bool) -> Self {
        if recording {
            Self::Capture
        } else {
            Self::Playback
        }
    }

    /// Whether this is the capture direction
    pub fn is_capture(&self) -> bool {
        matches!(self, Self::Capture)
    }
}

/// Transfer mode of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Fixed-size fragments
    Block,
    /// Byte stream
    Stream,
}

/// When the hardware starts consuming data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartMode {
    /// On an explicit go call
    Go,
    /// As soon as data is written
    Data,
    /// As soon as one fragment is full
    Full,
}

/// What the hardware does when it runs out of data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopMode {
    /// Stop the channel (reported as underrun)
    Stop,
    /// Keep running, playing whatever is in the buffer
    Rollover,
}

/// Sample layout of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatBlock {
    /// Native sample format
    pub format: NativeFormat,
    /// Interleaved samples
    pub interleave: bool,
    /// Sample rate
    pub rate: u32,
    /// Channel count
    pub voices: u32,
}

/// Fragment geometry in block mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGeometry {
    /// Fragment size
    pub frag_size: u32,
    /// Minimum fragments queued before the hardware starts
    pub frags_min: u32,
    /// Maximum fragments queued
    pub frags_max: u32,
}

/// Parameters submitted to `snd_pcm_plugin_params`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub direction: Direction,
    pub mode: ChannelMode,
    pub start_mode: StartMode,
    pub stop_mode: StopMode,
    pub format: FormatBlock,
    pub buf: BlockGeometry,
}

impl ChannelParams {
    /// Block-mode parameters with the configured defaults
    ///
    /// Starts on first data, stops on underrun, 16-bit little endian
    /// interleaved until negotiation fills in the real values.
    pub fn new(direction: Direction, defaults: &ChannelDefaults) -> Self {
        Self {
            direction,
            mode: ChannelMode::Block,
            start_mode: StartMode::Data,
            stop_mode: StopMode::Stop,
            format: FormatBlock {
                format: NativeFormat::S16_LE,
                interleave: true,
                rate: defaults.rate,
                voices: defaults.voices,
            },
            buf: BlockGeometry {
                frag_size: defaults.frag_size,
                frags_min: defaults.frags_min,
                frags_max: defaults.frags_max,
            },
        }
    }
}

/// Configuration the hardware actually applied, from `snd_pcm_plugin_setup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSetup {
    pub direction: Direction,
    pub mode: ChannelMode,
    pub format: FormatBlock,
    pub buf: BlockGeometry,
}

/// Channel state from `snd_pcm_plugin_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    NotReady,
    Ready,
    Prepared,
    Running,
    Underrun,
    Overrun,
    Unsecure,
    Paused,
    Error,
    Change,
}

impl ChannelStatus {
    /// Whether re-preparing the channel brings it back
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Underrun | Self::Ready)
    }
}

/// Card numbers returned by `snd_cards_list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardList {
    /// Card numbers that fit in the caller's buffer
    pub cards: Vec<i32>,
    /// Cards present at the time of the call; may exceed `cards.len()`
    pub total: usize,
}

/// An opened PCM handle
///
/// Dropping a handle without calling [`close`](PcmChannel::close) leaks it
/// on real hardware; the backend always closes explicitly.
#[cfg_attr(test, mockall::automock)]
pub trait PcmChannel: Send {
    /// `snd_pcm_plugin_params`
    fn plugin_params(&mut self, params: &ChannelParams) -> nix::Result<()>;

    /// `snd_pcm_plugin_setup`
    fn plugin_setup(&mut self, direction: Direction) -> nix::Result<ChannelSetup>;

    /// `snd_pcm_file_descriptor`
    fn file_descriptor(&self, direction: Direction) -> nix::Result<RawFd>;

    /// `snd_pcm_plugin_prepare`
    fn plugin_prepare(&mut self, direction: Direction) -> nix::Result<()>;

    /// `snd_pcm_plugin_write`
    ///
    /// `Ok(n)` with `n < data.len()` is a short write that made progress;
    /// `Err` means nothing was transferred.
    fn plugin_write(&mut self, data: &[u8]) -> nix::Result<usize>;

    /// `snd_pcm_plugin_status`
    fn plugin_status(&mut self, direction: Direction) -> nix::Result<ChannelStatus>;

    /// `snd_pcm_plugin_flush`
    fn plugin_flush(&mut self, direction: Direction) -> nix::Result<()>;

    /// `snd_pcm_close`
    fn close(self) -> nix::Result<()>;
}

/// The sound subsystem: card discovery and PCM open
pub trait SoundSystem: Send + Sync {
    /// Handle type returned by the open calls
    type Pcm: PcmChannel;

    /// Subsystem version, e.g. 710 for 7.1.0
    fn api_version(&self) -> u32;

    /// `snd_cards_list(NULL, 0, &total)`
    fn card_count(&self) -> usize;

    /// `snd_cards_list(buf, max, &total)`
    fn list_cards(&self, max: usize) -> CardList;

    /// `snd_card_get_longname`
    fn card_long_name(&self, card: i32) -> nix::Result<String>;

    /// `snd_pcm_open`
    fn open(&self, card: i32, device: u32, direction: Direction) -> nix::Result<Self::Pcm>;

    /// `snd_pcm_open_preferred`; returns the handle with its card and device
    fn open_preferred(&self, direction: Direction) -> nix::Result<(Self::Pcm, i32, u32)>;

    /// Raise the calling thread's priority by `delta`
    fn raise_thread_priority(&self, delta: i32) -> nix::Result<()> {
        let _ = delta;
        Err(Errno::ENOSYS)
    }

    /// Wait until `fd` is ready in `direction` or `timeout` passes
    ///
    /// Returns `Ok(false)` on timeout.
    fn poll_descriptor(
        &self,
        fd: RawFd,
        direction: Direction,
        timeout: Duration,
    ) -> io::Result<bool> {
        poll_fd(fd, direction, timeout)
    }
}

/// `poll(2)` on one descriptor, restarting after signals
pub fn poll_fd(fd: RawFd, direction: Direction, timeout: Duration) -> io::Result<bool> {
    let events = match direction {
        Direction::Playback => PollFlags::POLLOUT,
        Direction::Capture => PollFlags::POLLIN,
    };
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX);
        let mut fds = [PollFd::new(fd, events)];

        match poll(&mut fds, millis) {
            Ok(0) => return Ok(false),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
                if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("descriptor {fd} reported {revents:?}"),
                    ));
                }
                return Ok(true);
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from(errno)),
        }
    }
}
