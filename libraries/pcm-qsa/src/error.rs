//! Error types for the QSA backend

use crate::sys::ChannelStatus;
use nix::errno::Errno;
use pcm_core::{AudioError, DeviceHandle};
use thiserror::Error;

/// Result type for QSA operations
pub type Result<T> = std::result::Result<T, QsaError>;

/// Where in a device's life an error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Opening or configuring; the device is left closed
    Configuration,
    /// Streaming; recovery was exhausted
    Fatal,
}

/// Errors raised by the QSA backend
#[derive(Error, Debug)]
pub enum QsaError {
    /// A native call returned an error code
    #[error("QSA: {call}() failed: {}", .errno.desc())]
    Native {
        /// Name of the native function
        call: &'static str,
        /// Error reported by the subsystem
        errno: Errno,
    },

    /// No candidate in the fallback chain has a native equivalent
    #[error("QSA: Couldn't find any hardware audio formats")]
    NoCompatibleFormat,

    /// Parameters were accepted but the channel setup could not be read back
    #[error("QSA: Unable to setup channel")]
    ChannelSetup,

    /// Capture streams are not implemented
    #[error("QSA: recording support isn't available")]
    RecordingUnsupported,

    /// The period buffer could not be allocated
    #[error("QSA: out of memory allocating {0} byte buffer")]
    OutOfMemory(usize),

    /// An I/O fault left the channel in a state re-preparing cannot fix
    #[error("QSA: channel in unrecoverable state: {0:?}")]
    UnrecoverableStatus(ChannelStatus),

    /// Waiting on the device descriptor failed
    #[error("QSA: poll() failed: {0}")]
    Poll(#[source] std::io::Error),

    /// The device has no native handle
    #[error("QSA: device is not open")]
    NotOpen,

    /// The subsystem has no card for this handle
    #[error("QSA: no such device: {0}")]
    InvalidHandle(DeviceHandle),

    /// More bytes were requested than the period buffer holds
    #[error("QSA: requested {requested} bytes from a {capacity} byte buffer")]
    LengthExceedsBuffer {
        /// Bytes the host asked to play
        requested: usize,
        /// Size of the period buffer
        capacity: usize,
    },

    /// Configuration could not be loaded or is invalid
    #[error("QSA: invalid configuration: {0}")]
    Config(String),
}

impl QsaError {
    /// Build a [`QsaError::Native`] for `call`
    pub fn native(call: &'static str, errno: Errno) -> Self {
        Self::Native { call, errno }
    }

    /// Adapter for `map_err` on native calls
    pub(crate) fn from_call(call: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| Self::native(call, errno)
    }

    /// Convert into the host-facing error for the phase it surfaced in
    ///
    /// Allocation failure and unknown handles keep their own variants in
    /// either phase.
    pub fn into_audio_error(self, phase: ErrorPhase) -> AudioError {
        match (self, phase) {
            (Self::OutOfMemory(size), _) => AudioError::OutOfMemory(size),
            (Self::InvalidHandle(handle), _) => AudioError::InvalidHandle(handle.raw()),
            (err, ErrorPhase::Configuration) => AudioError::configuration(err.to_string()),
            (err, ErrorPhase::Fatal) => AudioError::fatal(err.to_string()),
        }
    }
}

impl From<config::ConfigError> for QsaError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_message_names_call() {
        let err = QsaError::native("snd_pcm_open", Errno::ENODEV);
        assert_eq!(
            err.to_string(),
            format!("QSA: snd_pcm_open() failed: {}", Errno::ENODEV.desc())
        );
    }

    #[test]
    fn open_failures_are_configuration_errors() {
        let err = QsaError::native("snd_pcm_plugin_params", Errno::EINVAL)
            .into_audio_error(ErrorPhase::Configuration);
        assert!(err.is_configuration());

        let err = QsaError::NoCompatibleFormat.into_audio_error(ErrorPhase::Configuration);
        assert!(err.is_configuration());
    }

    #[test]
    fn out_of_memory_is_distinct() {
        let err = QsaError::OutOfMemory(8192).into_audio_error(ErrorPhase::Configuration);
        assert!(matches!(err, AudioError::OutOfMemory(8192)));
    }

    #[test]
    fn unknown_handle_is_distinct() {
        let handle = DeviceHandle::new(7, 2).unwrap();
        let err = QsaError::InvalidHandle(handle).into_audio_error(ErrorPhase::Configuration);
        assert!(matches!(err, AudioError::InvalidHandle(raw) if raw == handle.raw()));
        assert!(err.is_configuration());
    }

    #[test]
    fn oversized_play_is_fatal_while_streaming() {
        let err = QsaError::LengthExceedsBuffer {
            requested: 256,
            capacity: 64,
        };
        assert_eq!(err.to_string(), "QSA: requested 256 bytes from a 64 byte buffer");
        assert!(err.into_audio_error(ErrorPhase::Fatal).is_fatal());
    }

    #[test]
    fn streaming_failures_are_fatal() {
        let err = QsaError::native("snd_pcm_plugin_prepare", Errno::EIO)
            .into_audio_error(ErrorPhase::Fatal);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("snd_pcm_plugin_prepare"));

        let err = QsaError::UnrecoverableStatus(ChannelStatus::Error)
            .into_audio_error(ErrorPhase::Fatal);
        assert!(err.is_fatal());
    }
}
