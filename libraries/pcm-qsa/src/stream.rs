//! Streaming engine
//!
//! The write loop is a small state machine:
//!
//! ```text
//!            ┌──────── EAGAIN / short write ───────┐
//!            ▼                                     │
//!   ──► Writing ──── full write / stop ──► Done    │
//!        │   ▲ └──────────────────────────────────┘
//!  EINVAL│   │prepared
//!   /EIO ▼   │
//!   RecoveringUnderrun ──── bad status / failed call ──► Failed
//! ```
//!
//! Transient conditions and a single underrun recovery are handled here and
//! never reach the caller; everything else ends in `Failed`.

use crate::error::{QsaError, Result};
use crate::sys::{Direction, PcmChannel, SoundSystem};
use nix::errno::Errno;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Result of waiting for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The device can take more data
    Ready,
    /// Nothing happened within the timeout; the device looks stalled
    TimedOut,
}

/// How a successful `play` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Every byte was handed to the hardware
    Complete,
    /// The device is stalled; the rest of the buffer was abandoned
    Dropped {
        /// Bytes written before giving up
        written: usize,
    },
    /// Shutdown was requested before the buffer was finished
    Interrupted {
        /// Bytes written before the request was seen
        written: usize,
    },
}

/// Per-call inputs to [`write_all`]
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    /// Direction of the channel, used for status and prepare
    pub direction: Direction,
    /// Set by the host to stop retrying
    pub shutdown: &'a AtomicBool,
    /// The previous wait timed out
    pub timeout_on_wait: bool,
    /// Pause between attempts while the device is busy
    pub retry_delay: Duration,
}

enum WriteState {
    Writing,
    RecoveringUnderrun,
    Failed(QsaError),
    Done(PlayOutcome),
}

fn is_would_block(errno: Errno) -> bool {
    errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK
}

/// Write all of `data`, retrying through transient conditions
///
/// The shutdown flag is checked before every attempt. An I/O fault is
/// answered by one status query and re-prepare; a second fault with no
/// progress in between is fatal.
pub fn write_all<P: PcmChannel>(
    pcm: &mut P,
    data: &[u8],
    ctx: &WriteContext<'_>,
) -> Result<PlayOutcome> {
    let mut written = 0usize;
    let mut recovered = false;
    let mut state = WriteState::Writing;

    loop {
        state = match state {
            WriteState::Writing => {
                if ctx.shutdown.load(Ordering::Acquire) {
                    debug!("shutdown requested with {} bytes left", data.len() - written);
                    WriteState::Done(PlayOutcome::Interrupted { written })
                } else if written == data.len() {
                    WriteState::Done(PlayOutcome::Complete)
                } else {
                    let remaining = &data[written..];
                    match pcm.plugin_write(remaining) {
                        Ok(n) if n >= remaining.len() => {
                            written = data.len();
                            WriteState::Done(PlayOutcome::Complete)
                        }
                        Ok(0) if ctx.timeout_on_wait => {
                            warn!("device stalled, dropping {} bytes", remaining.len());
                            WriteState::Done(PlayOutcome::Dropped { written })
                        }
                        Ok(n) => {
                            if n > 0 {
                                recovered = false;
                            }
                            written += n;
                            thread::sleep(ctx.retry_delay);
                            WriteState::Writing
                        }
                        Err(errno) if is_would_block(errno) && ctx.timeout_on_wait => {
                            warn!("device stalled, dropping {} bytes", remaining.len());
                            WriteState::Done(PlayOutcome::Dropped { written })
                        }
                        Err(errno) if is_would_block(errno) => {
                            thread::sleep(ctx.retry_delay);
                            WriteState::Writing
                        }
                        Err(errno @ (Errno::EINVAL | Errno::EIO)) => {
                            if recovered {
                                WriteState::Failed(QsaError::native("snd_pcm_plugin_write", errno))
                            } else {
                                WriteState::RecoveringUnderrun
                            }
                        }
                        Err(errno) => {
                            WriteState::Failed(QsaError::native("snd_pcm_plugin_write", errno))
                        }
                    }
                }
            }
            WriteState::RecoveringUnderrun => match pcm.plugin_status(ctx.direction) {
                Err(errno) => WriteState::Failed(QsaError::native("snd_pcm_plugin_status", errno)),
                Ok(status) if status.is_recoverable() => {
                    match pcm.plugin_prepare(ctx.direction) {
                        Ok(()) => {
                            warn!("recovered channel from {:?}", status);
                            recovered = true;
                            WriteState::Writing
                        }
                        Err(errno) => {
                            WriteState::Failed(QsaError::native("snd_pcm_plugin_prepare", errno))
                        }
                    }
                }
                Ok(status) => WriteState::Failed(QsaError::UnrecoverableStatus(status)),
            },
            WriteState::Done(outcome) => return Ok(outcome),
            WriteState::Failed(err) => {
                error!("{}", err);
                return Err(err);
            }
        };
    }
}

/// Wait on the device descriptor
pub fn wait_ready<S: SoundSystem>(
    sys: &S,
    fd: RawFd,
    direction: Direction,
    timeout: Duration,
) -> Result<WaitOutcome> {
    match sys.poll_descriptor(fd, direction, timeout) {
        Ok(true) => Ok(WaitOutcome::Ready),
        Ok(false) => {
            warn!("no response from descriptor {} within {:?}", fd, timeout);
            Ok(WaitOutcome::TimedOut)
        }
        Err(err) => {
            error!("waiting on descriptor {} failed: {}", fd, err);
            Err(QsaError::Poll(err))
        }
    }
}
