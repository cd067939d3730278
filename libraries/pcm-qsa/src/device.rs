//! Per-device state and lifecycle
//!
//! A [`QsaDevice`] starts empty, is filled in by [`QsaDevice::open`] and
//! emptied again by [`QsaDevice::close`]. Close works on a device in any
//! state, including one left half-built by a failed open, and runs again
//! from `Drop` so the native handle is never leaked.

use crate::config::BackendConfig;
use crate::error::{QsaError, Result};
use crate::format::FormatTable;
use crate::negotiate::{allocate_buffer, negotiate, Negotiated};
use crate::stream::{self, PlayOutcome, WaitOutcome, WriteContext};
use crate::sys::{Direction, PcmChannel, SoundSystem};
use nix::errno::Errno;
use pcm_core::{AudioSpec, DeviceFormat, DeviceHandle};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One open (or openable) endpoint
pub struct QsaDevice<S: SoundSystem> {
    system: Arc<S>,
    config: Arc<BackendConfig>,
    table: FormatTable,
    handle: DeviceHandle,
    direction: Direction,
    pcm: Option<S::Pcm>,
    fd: Option<RawFd>,
    buffer: Vec<u8>,
    negotiated: Option<Negotiated>,
    timeout_on_wait: bool,
    shutdown: Arc<AtomicBool>,
}

impl<S: SoundSystem> QsaDevice<S> {
    /// Empty state for `handle`; nothing native is touched until [`open`](Self::open)
    pub fn new(
        system: Arc<S>,
        config: Arc<BackendConfig>,
        table: FormatTable,
        handle: DeviceHandle,
        recording: bool,
    ) -> Self {
        Self {
            system,
            config,
            table,
            handle,
            direction: Direction::from_recording(recording),
            pcm: None,
            fd: None,
            buffer: Vec::new(),
            negotiated: None,
            timeout_on_wait: false,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the endpoint and negotiate the closest format to `desired`
    ///
    /// On error the device may hold some resources; [`close`](Self::close)
    /// releases them.
    pub fn open(&mut self, desired: &AudioSpec) -> Result<()> {
        if self.direction.is_capture() {
            return Err(QsaError::RecordingUnsupported);
        }

        if self.pcm.is_some() {
            self.close();
        }

        let direction = self.direction;
        let pcm = self
            .system
            .open(self.handle.card() as i32, self.handle.device(), direction)
            .map_err(|errno| match errno {
                Errno::ENODEV => QsaError::InvalidHandle(self.handle),
                errno => QsaError::native("snd_pcm_open", errno),
            })?;
        let pcm = self.pcm.insert(pcm);

        let negotiated = negotiate(
            pcm,
            direction,
            desired,
            &self.table,
            &self.config.channel,
        )?;

        self.buffer = allocate_buffer(
            negotiated.buffer_size,
            negotiated.spec.format.silence_value(),
        )?;
        self.negotiated = Some(negotiated);

        let fd = pcm
            .file_descriptor(direction)
            .map_err(QsaError::from_call("snd_pcm_file_descriptor"))?;
        self.fd = Some(fd);

        pcm.plugin_prepare(direction)
            .map_err(QsaError::from_call("snd_pcm_plugin_prepare"))?;

        self.timeout_on_wait = false;
        self.shutdown.store(false, Ordering::Release);

        info!(
            "opened {} as {} ({} frames per period)",
            self.handle, negotiated.spec, negotiated.sample_frames
        );
        Ok(())
    }

    /// Release the native handle and the buffer
    ///
    /// Pending samples are flushed first on subsystem versions that
    /// support it. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut pcm) = self.pcm.take() {
            if self.system.api_version() < self.config.flush_version_limit {
                if let Err(errno) = pcm.plugin_flush(self.direction) {
                    warn!("flushing {} failed: {}", self.handle, errno.desc());
                }
            }

            if let Err(errno) = pcm.close() {
                warn!("closing {} failed: {}", self.handle, errno.desc());
            }

            info!("closed {}", self.handle);
        }

        self.buffer = Vec::new();
        self.fd = None;
        self.negotiated = None;
        self.timeout_on_wait = false;
    }

    /// Block until the device accepts data or the configured timeout passes
    ///
    /// A timeout is not an error; it is remembered so the next `play` gives
    /// up on a stalled device instead of spinning.
    pub fn wait_ready(&mut self) -> Result<WaitOutcome> {
        let fd = self.fd.ok_or(QsaError::NotOpen)?;
        let outcome = stream::wait_ready(
            self.system.as_ref(),
            fd,
            self.direction,
            self.config.wait_timeout(),
        )?;
        self.timeout_on_wait = outcome == WaitOutcome::TimedOut;
        Ok(outcome)
    }

    /// Write `data` to the hardware
    pub fn play(&mut self, data: &[u8]) -> Result<PlayOutcome> {
        if self.shutdown.load(Ordering::Acquire) {
            return Ok(PlayOutcome::Interrupted { written: 0 });
        }

        let pcm = self.pcm.as_mut().ok_or(QsaError::NotOpen)?;
        let ctx = WriteContext {
            direction: self.direction,
            shutdown: &self.shutdown,
            timeout_on_wait: self.timeout_on_wait,
            retry_delay: self.config.retry_delay(),
        };
        stream::write_all(pcm, data, &ctx)
    }

    /// Write the first `len` bytes of the device's own buffer
    ///
    /// Asking for more than the buffer holds is an error; nothing is written.
    pub fn play_buffer(&mut self, len: usize) -> Result<PlayOutcome> {
        if len > self.buffer.len() {
            return Err(QsaError::LengthExceedsBuffer {
                requested: len,
                capacity: self.buffer.len(),
            });
        }

        if self.shutdown.load(Ordering::Acquire) {
            return Ok(PlayOutcome::Interrupted { written: 0 });
        }

        let pcm = self.pcm.as_mut().ok_or(QsaError::NotOpen)?;
        let ctx = WriteContext {
            direction: self.direction,
            shutdown: &self.shutdown,
            timeout_on_wait: self.timeout_on_wait,
            retry_delay: self.config.retry_delay(),
        };
        stream::write_all(pcm, &self.buffer[..len], &ctx)
    }

    /// The period buffer, for the host to fill
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// The period buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Flag the host sets to stop an in-progress `play`
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Ask any in-progress `play` to return
    pub fn request_shutdown(&self) {
        debug!("shutdown requested for {}", self.handle);
        self.shutdown.store(true, Ordering::Release);
    }

    /// Raise the calling thread's priority; failure is ignored
    pub fn thread_init(&self) {
        if let Err(errno) = self
            .system
            .raise_thread_priority(self.config.thread_priority_boost)
        {
            debug!("thread priority unchanged: {}", errno.desc());
        }
    }

    /// Accepted format, once open
    pub fn format(&self) -> Option<DeviceFormat> {
        self.negotiated.map(DeviceFormat::from)
    }

    /// Accepted spec, once open
    pub fn spec(&self) -> Option<AudioSpec> {
        self.negotiated.map(|n| n.spec)
    }

    /// Whether a native handle is held
    pub fn is_open(&self) -> bool {
        self.pcm.is_some()
    }

    /// Whether the last wait timed out
    pub fn timed_out_on_wait(&self) -> bool {
        self.timeout_on_wait
    }

    /// Descriptor used for waiting, once open
    pub fn descriptor(&self) -> Option<RawFd> {
        self.fd
    }

    /// Endpoint this state belongs to
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Direction of the endpoint
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl<S: SoundSystem> Drop for QsaDevice<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: SoundSystem> std::fmt::Debug for QsaDevice<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QsaDevice")
            .field("handle", &self.handle)
            .field("direction", &self.direction)
            .field("open", &self.pcm.is_some())
            .field("fd", &self.fd)
            .field("buffer_len", &self.buffer.len())
            .field("negotiated", &self.negotiated)
            .field("timeout_on_wait", &self.timeout_on_wait)
            .finish()
    }
}
