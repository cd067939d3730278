//! In-memory sound subsystem
//!
//! [`SimSoundSystem`] behaves like a QSA installation with a fixed set of
//! cards. Every native call is counted, written samples are kept, and the
//! results of writes, status queries, prepares and polls can be scripted so
//! fault paths can be exercised without hardware.
//!
//! The system is a cheap handle over shared state: clone it before handing
//! it to a driver to keep inspecting it afterwards.

use crate::format::NativeFormat;
use crate::sys::{
    BlockGeometry, CardList, ChannelMode, ChannelParams, ChannelSetup, ChannelStatus, Direction,
    FormatBlock, PcmChannel, SoundSystem,
};
use nix::errno::Errno;
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Descriptor numbers handed out by simulated handles start here
const FIRST_DESCRIPTOR: RawFd = 1000;

/// Scripted outcome of one `plugin_write`
#[derive(Debug, Clone)]
pub enum WriteStep {
    /// Accept the whole buffer
    Accept,
    /// Accept at most this many bytes
    Partial(usize),
    /// Accept at most this many bytes, then raise the flag
    PartialThenSignal(usize, Arc<AtomicBool>),
    /// Transfer nothing and fail
    Fail(Errno),
}

/// Number of times each native call was made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub opens: usize,
    pub closes: usize,
    pub params: usize,
    pub setups: usize,
    pub descriptors: usize,
    pub prepares: usize,
    pub writes: usize,
    pub statuses: usize,
    pub flushes: usize,
    pub polls: usize,
    pub priority_raises: usize,
}

impl CallCounts {
    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.opens.saturating_sub(self.closes)
    }
}

#[derive(Debug, Clone)]
struct SimEndpoint {
    open_error: Option<Errno>,
    close_error: Option<Errno>,
    setup: Option<ChannelSetup>,
}

impl Default for SimEndpoint {
    fn default() -> Self {
        Self {
            open_error: None,
            close_error: None,
            setup: Some(hardware_setup(NativeFormat::S16_LE, 2, 48_000)),
        }
    }
}

#[derive(Debug, Clone)]
struct SimCard {
    number: i32,
    name: Result<String, Errno>,
    endpoints: Vec<SimEndpoint>,
}

#[derive(Debug, Default)]
struct SimState {
    cards: Vec<SimCard>,
    card_count: Option<usize>,
    listed_total: Option<usize>,
    preferred_playback: Option<(i32, u32)>,
    preferred_capture: Option<(i32, u32)>,
    api_version: u32,
    period_frames: Option<u32>,
    params_error: Option<Errno>,
    setup_error: Option<Errno>,
    descriptor_error: Option<Errno>,
    writes: VecDeque<WriteStep>,
    statuses: VecDeque<nix::Result<ChannelStatus>>,
    prepares: VecDeque<nix::Result<()>>,
    polls: VecDeque<Result<bool, io::ErrorKind>>,
    counts: CallCounts,
    written: Vec<u8>,
    last_params: Option<ChannelParams>,
    last_priority_delta: Option<i32>,
    next_descriptor: RawFd,
}

/// Builder for [`SimSoundSystem`]
#[derive(Debug, Default)]
pub struct SimBuilder {
    state: SimState,
}

impl SimBuilder {
    /// Add a card with `devices` playback sub-devices
    ///
    /// Each sub-device reports 16-bit stereo at 48 kHz until configured.
    #[must_use]
    pub fn card(mut self, number: i32, name: &str, devices: u32) -> Self {
        self.state.cards.push(SimCard {
            number,
            name: Ok(name.to_string()),
            endpoints: (0..devices).map(|_| SimEndpoint::default()).collect(),
        });
        self
    }

    /// Make the long-name query for `card` fail
    #[must_use]
    pub fn card_name_error(mut self, card: i32, errno: Errno) -> Self {
        if let Some(c) = self.state.cards.iter_mut().find(|c| c.number == card) {
            c.name = Err(errno);
        }
        self
    }

    /// Make opening a sub-device fail
    #[must_use]
    pub fn open_error(self, card: i32, device: u32, errno: Errno) -> Self {
        self.endpoint(card, device, |e| e.open_error = Some(errno))
    }

    /// Make closing a sub-device fail
    #[must_use]
    pub fn close_error(self, card: i32, device: u32, errno: Errno) -> Self {
        self.endpoint(card, device, |e| e.close_error = Some(errno))
    }

    /// Configuration a sub-device reports before negotiation
    #[must_use]
    pub fn hardware_format(
        self,
        card: i32,
        device: u32,
        format: NativeFormat,
        voices: u32,
        rate: u32,
    ) -> Self {
        self.endpoint(card, device, |e| {
            e.setup = Some(hardware_setup(format, voices, rate));
        })
    }

    /// Make the setup query fail on a sub-device that was not negotiated
    #[must_use]
    pub fn unreadable_setup(self, card: i32, device: u32) -> Self {
        self.endpoint(card, device, |e| e.setup = None)
    }

    /// Endpoint returned by the preferred playback open
    #[must_use]
    pub fn preferred_playback(mut self, card: i32, device: u32) -> Self {
        self.state.preferred_playback = Some((card, device));
        self
    }

    /// Endpoint returned by the preferred capture open
    #[must_use]
    pub fn preferred_capture(mut self, card: i32, device: u32) -> Self {
        self.state.preferred_capture = Some((card, device));
        self
    }

    /// Override the card count reported before listing
    #[must_use]
    pub fn card_count(mut self, count: usize) -> Self {
        self.state.card_count = Some(count);
        self
    }

    /// Override the total reported by the listing call
    #[must_use]
    pub fn listed_total(mut self, total: usize) -> Self {
        self.state.listed_total = Some(total);
        self
    }

    /// Subsystem version
    #[must_use]
    pub fn api_version(mut self, version: u32) -> Self {
        self.state.api_version = version;
        self
    }

    /// Period size the hardware settles on, instead of the requested one
    #[must_use]
    pub fn period_frames(mut self, frames: u32) -> Self {
        self.state.period_frames = Some(frames);
        self
    }

    /// Reject channel parameters
    #[must_use]
    pub fn params_error(mut self, errno: Errno) -> Self {
        self.state.params_error = Some(errno);
        self
    }

    /// Fail the setup read-back after parameters were accepted
    #[must_use]
    pub fn setup_error(mut self, errno: Errno) -> Self {
        self.state.setup_error = Some(errno);
        self
    }

    /// Fail the descriptor query
    #[must_use]
    pub fn descriptor_error(mut self, errno: Errno) -> Self {
        self.state.descriptor_error = Some(errno);
        self
    }

    /// Finish building
    pub fn build(self) -> SimSoundSystem {
        let mut state = self.state;
        state.next_descriptor = FIRST_DESCRIPTOR;
        SimSoundSystem {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn endpoint(mut self, card: i32, device: u32, f: impl FnOnce(&mut SimEndpoint)) -> Self {
        if let Some(endpoint) = self
            .state
            .cards
            .iter_mut()
            .find(|c| c.number == card)
            .and_then(|c| c.endpoints.get_mut(device as usize))
        {
            f(endpoint);
        }
        self
    }
}

fn hardware_setup(format: NativeFormat, voices: u32, rate: u32) -> ChannelSetup {
    ChannelSetup {
        direction: Direction::Playback,
        mode: ChannelMode::Block,
        format: FormatBlock {
            format,
            interleave: true,
            rate,
            voices,
        },
        buf: BlockGeometry {
            frag_size: 4096,
            frags_min: 1,
            frags_max: 1,
        },
    }
}

/// Simulated QSA installation
#[derive(Debug, Clone)]
pub struct SimSoundSystem {
    state: Arc<Mutex<SimState>>,
}

impl SimSoundSystem {
    /// Start describing a subsystem
    pub fn builder() -> SimBuilder {
        SimBuilder::default()
    }

    /// Queue results for upcoming writes; an empty queue accepts everything
    pub fn script_writes(&self, steps: impl IntoIterator<Item = WriteStep>) {
        self.lock().writes.extend(steps);
    }

    /// Queue results for upcoming status queries; an empty queue reports `Running`
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = nix::Result<ChannelStatus>>) {
        self.lock().statuses.extend(statuses);
    }

    /// Queue results for upcoming prepares; an empty queue succeeds
    pub fn script_prepares(&self, results: impl IntoIterator<Item = nix::Result<()>>) {
        self.lock().prepares.extend(results);
    }

    /// Queue results for upcoming polls; an empty queue reports ready
    pub fn script_polls(&self, results: impl IntoIterator<Item = Result<bool, io::ErrorKind>>) {
        self.lock().polls.extend(results);
    }

    /// Native call counters so far
    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }

    /// Every byte accepted by writes so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Parameters of the most recent `plugin_params`
    pub fn last_params(&self) -> Option<ChannelParams> {
        self.lock().last_params
    }

    /// Delta of the most recent priority raise
    pub fn last_priority_delta(&self) -> Option<i32> {
        self.lock().last_priority_delta
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_endpoint(&self, card: i32, device: u32) -> nix::Result<SimPcm> {
        let mut state = self.lock();

        let endpoint = state
            .cards
            .iter()
            .find(|c| c.number == card)
            .ok_or(Errno::ENODEV)?
            .endpoints
            .get(device as usize)
            .cloned()
            .ok_or(Errno::ENOENT)?;

        if let Some(errno) = endpoint.open_error {
            return Err(errno);
        }

        state.counts.opens += 1;
        let fd = state.next_descriptor;
        state.next_descriptor += 1;

        Ok(SimPcm {
            state: Arc::clone(&self.state),
            fd,
            endpoint,
            params: None,
        })
    }
}

impl SoundSystem for SimSoundSystem {
    type Pcm = SimPcm;

    fn api_version(&self) -> u32 {
        self.lock().api_version
    }

    fn card_count(&self) -> usize {
        let state = self.lock();
        state.card_count.unwrap_or(state.cards.len())
    }

    fn list_cards(&self, max: usize) -> CardList {
        let state = self.lock();
        CardList {
            cards: state.cards.iter().take(max).map(|c| c.number).collect(),
            total: state.listed_total.unwrap_or(state.cards.len()),
        }
    }

    fn card_long_name(&self, card: i32) -> nix::Result<String> {
        self.lock()
            .cards
            .iter()
            .find(|c| c.number == card)
            .ok_or(Errno::ENODEV)?
            .name
            .clone()
    }

    fn open(&self, card: i32, device: u32, direction: Direction) -> nix::Result<SimPcm> {
        if direction.is_capture() {
            return Err(Errno::ENOTSUP);
        }
        self.open_endpoint(card, device)
    }

    fn open_preferred(&self, direction: Direction) -> nix::Result<(SimPcm, i32, u32)> {
        let preferred = {
            let state = self.lock();
            match direction {
                Direction::Playback => state.preferred_playback,
                Direction::Capture => state.preferred_capture,
            }
        };

        let (card, device) = preferred.ok_or(Errno::ENODEV)?;
        let pcm = self.open_endpoint(card, device)?;
        Ok((pcm, card, device))
    }

    fn raise_thread_priority(&self, delta: i32) -> nix::Result<()> {
        let mut state = self.lock();
        state.counts.priority_raises += 1;
        state.last_priority_delta = Some(delta);
        Ok(())
    }

    fn poll_descriptor(
        &self,
        _fd: RawFd,
        _direction: Direction,
        _timeout: Duration,
    ) -> io::Result<bool> {
        let mut state = self.lock();
        state.counts.polls += 1;
        match state.polls.pop_front() {
            None => Ok(true),
            Some(Ok(ready)) => Ok(ready),
            Some(Err(kind)) => Err(io::Error::from(kind)),
        }
    }
}

/// Handle opened on a [`SimSoundSystem`]
#[derive(Debug)]
pub struct SimPcm {
    state: Arc<Mutex<SimState>>,
    fd: RawFd,
    endpoint: SimEndpoint,
    params: Option<ChannelParams>,
}

impl SimPcm {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PcmChannel for SimPcm {
    fn plugin_params(&mut self, params: &ChannelParams) -> nix::Result<()> {
        let mut state = self.lock();
        state.counts.params += 1;
        state.last_params = Some(*params);
        if let Some(errno) = state.params_error {
            return Err(errno);
        }
        drop(state);

        self.params = Some(*params);
        Ok(())
    }

    fn plugin_setup(&mut self, direction: Direction) -> nix::Result<ChannelSetup> {
        let mut state = self.lock();
        state.counts.setups += 1;

        match self.params {
            Some(params) => {
                if let Some(errno) = state.setup_error {
                    return Err(errno);
                }
                Ok(ChannelSetup {
                    direction,
                    mode: params.mode,
                    format: params.format,
                    buf: BlockGeometry {
                        frag_size: state.period_frames.unwrap_or(params.buf.frag_size),
                        ..params.buf
                    },
                })
            }
            None => self.endpoint.setup.ok_or(Errno::EIO),
        }
    }

    fn file_descriptor(&self, _direction: Direction) -> nix::Result<RawFd> {
        let mut state = self.lock();
        state.counts.descriptors += 1;
        match state.descriptor_error {
            Some(errno) => Err(errno),
            None => Ok(self.fd),
        }
    }

    fn plugin_prepare(&mut self, _direction: Direction) -> nix::Result<()> {
        let mut state = self.lock();
        state.counts.prepares += 1;
        state.prepares.pop_front().unwrap_or(Ok(()))
    }

    fn plugin_write(&mut self, data: &[u8]) -> nix::Result<usize> {
        let mut state = self.lock();
        state.counts.writes += 1;

        let accepted = match state.writes.pop_front().unwrap_or(WriteStep::Accept) {
            WriteStep::Accept => data.len(),
            WriteStep::Partial(n) => n.min(data.len()),
            WriteStep::PartialThenSignal(n, flag) => {
                flag.store(true, Ordering::Release);
                n.min(data.len())
            }
            WriteStep::Fail(errno) => return Err(errno),
        };

        state.written.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn plugin_status(&mut self, _direction: Direction) -> nix::Result<ChannelStatus> {
        let mut state = self.lock();
        state.counts.statuses += 1;
        state
            .statuses
            .pop_front()
            .unwrap_or(Ok(ChannelStatus::Running))
    }

    fn plugin_flush(&mut self, _direction: Direction) -> nix::Result<()> {
        self.lock().counts.flushes += 1;
        Ok(())
    }

    fn close(self) -> nix::Result<()> {
        let mut state = self.lock();
        state.counts.closes += 1;
        match self.endpoint.close_error {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_past_last_device_is_enoent() {
        let sys = SimSoundSystem::builder().card(0, "Sim", 2).build();
        assert!(sys.open(0, 1, Direction::Playback).is_ok());
        assert!(matches!(
            sys.open(0, 2, Direction::Playback),
            Err(Errno::ENOENT)
        ));
        assert!(matches!(
            sys.open(7, 0, Direction::Playback),
            Err(Errno::ENODEV)
        ));
    }

    #[test]
    fn counts_track_handles() {
        let sys = SimSoundSystem::builder().card(0, "Sim", 1).build();
        let pcm = sys.open(0, 0, Direction::Playback).unwrap();
        assert_eq!(sys.counts().open_handles(), 1);
        pcm.close().unwrap();
        assert_eq!(sys.counts().open_handles(), 0);
        assert_eq!(sys.counts().opens, 1);
        assert_eq!(sys.counts().closes, 1);
    }

    #[test]
    fn close_error_still_counts() {
        let sys = SimSoundSystem::builder()
            .card(0, "Sim", 1)
            .close_error(0, 0, Errno::EBUSY)
            .build();
        let pcm = sys.open(0, 0, Direction::Playback).unwrap();
        assert_eq!(pcm.close(), Err(Errno::EBUSY));
        assert_eq!(sys.counts().closes, 1);
    }

    #[test]
    fn setup_reflects_hardware_until_negotiated() {
        let sys = SimSoundSystem::builder()
            .card(0, "Sim", 1)
            .hardware_format(0, 0, NativeFormat::FLOAT_LE, 6, 96_000)
            .period_frames(256)
            .build();
        let mut pcm = sys.open(0, 0, Direction::Playback).unwrap();

        let before = pcm.plugin_setup(Direction::Playback).unwrap();
        assert_eq!(before.format.format, NativeFormat::FLOAT_LE);
        assert_eq!(before.format.voices, 6);

        let mut params = ChannelParams::new(Direction::Playback, &Default::default());
        params.format.voices = 2;
        pcm.plugin_params(&params).unwrap();

        let after = pcm.plugin_setup(Direction::Playback).unwrap();
        assert_eq!(after.format.format, NativeFormat::S16_LE);
        assert_eq!(after.format.voices, 2);
        assert_eq!(after.buf.frag_size, 256);
        pcm.close().unwrap();
    }

    #[test]
    fn scripted_writes_then_accept() {
        let sys = SimSoundSystem::builder().card(0, "Sim", 1).build();
        sys.script_writes([WriteStep::Partial(2), WriteStep::Fail(Errno::EAGAIN)]);
        let mut pcm = sys.open(0, 0, Direction::Playback).unwrap();

        assert_eq!(pcm.plugin_write(&[1, 2, 3, 4]), Ok(2));
        assert_eq!(pcm.plugin_write(&[3, 4]), Err(Errno::EAGAIN));
        assert_eq!(pcm.plugin_write(&[3, 4]), Ok(2));
        assert_eq!(sys.written(), vec![1, 2, 3, 4]);
        pcm.close().unwrap();
    }

    #[test]
    fn capture_open_is_rejected_but_preferred_capture_resolves() {
        let sys = SimSoundSystem::builder()
            .card(0, "Sim", 1)
            .preferred_capture(0, 0)
            .build();
        assert!(matches!(
            sys.open(0, 0, Direction::Capture),
            Err(Errno::ENOTSUP)
        ));

        let (pcm, card, device) = sys.open_preferred(Direction::Capture).unwrap();
        assert_eq!((card, device), (0, 0));
        pcm.close().unwrap();
        assert!(sys.open_preferred(Direction::Playback).is_err());
    }
}
