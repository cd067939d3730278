/// Host-facing error types for PCM backends
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Errors a backend reports to the host
#[derive(Error, Debug)]
pub enum AudioError {
    /// Opening or configuring a device failed; the device is left closed
    #[error("{0}")]
    Configuration(String),

    /// The per-device buffer could not be allocated
    #[error("Out of memory allocating {0} byte device buffer")]
    OutOfMemory(usize),

    /// Streaming failed and could not be recovered; the host should close the device
    #[error("{0}")]
    Fatal(String),

    /// The host passed a handle this backend never reported
    #[error("Invalid device handle: {0:#010x}")]
    InvalidHandle(u32),
}

impl AudioError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a fatal streaming error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether this error happened while opening/configuring a device
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::OutOfMemory(_) | Self::InvalidHandle(_)
        )
    }

    /// Whether this error ended a running stream
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
