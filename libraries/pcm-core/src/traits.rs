/// Backend capability trait
use crate::error::Result;
use crate::types::{AudioSpec, DetectedDevices, DeviceHandle};
use serde::{Deserialize, Serialize};

/// Static description of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    /// Short identifier, e.g. `"qsa"`
    pub name: &'static str,

    /// Human-readable description
    pub description: &'static str,
}

/// Format and geometry a device settled on when it was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFormat {
    /// Accepted spec
    pub spec: AudioSpec,

    /// Sample frames per period
    pub sample_frames: usize,

    /// Bytes per period (size of the device buffer)
    pub buffer_size: usize,
}

/// Platform half of an audio backend
///
/// The host owns the device registry, mixing, conversion and the streaming
/// thread. A backend only enumerates endpoints and moves bytes for the
/// devices it opened. For one device the host calls
/// [`wait_device`](AudioDriver::wait_device), fills
/// [`device_buffer`](AudioDriver::device_buffer), then calls
/// [`play_device`](AudioDriver::play_device), strictly in turn and from a
/// single thread.
pub trait AudioDriver: Send + Sync {
    /// Per-device state, exclusively owned by the host's streaming thread
    type Device: Send;

    /// Name and description of this backend
    fn info(&self) -> DriverInfo;

    /// Enumerate endpoints and the hardware's preferred defaults
    ///
    /// Never fails: endpoints that cannot be queried are left out.
    fn detect_devices(&self) -> DetectedDevices;

    /// Open a device, negotiating the closest supported format to `spec`
    ///
    /// # Errors
    /// Returns a configuration error if the device cannot be opened or
    /// configured. Nothing is left open on failure.
    fn open_device(
        &self,
        handle: DeviceHandle,
        recording: bool,
        spec: &AudioSpec,
    ) -> Result<Self::Device>;

    /// Called once on the streaming thread before the first wait
    ///
    /// Best effort; failures are ignored.
    fn thread_init(&self, device: &mut Self::Device) {
        let _ = device;
    }

    /// Block until the device can take another period
    ///
    /// # Errors
    /// Returns a fatal error if the wait itself failed.
    fn wait_device(&self, device: &mut Self::Device) -> Result<()>;

    /// Deliver the first `len` bytes of the device buffer
    ///
    /// # Errors
    /// Returns a fatal error when the stream cannot be recovered.
    fn play_device(&self, device: &mut Self::Device, len: usize) -> Result<()>;

    /// Buffer the host fills before calling [`play_device`](AudioDriver::play_device)
    fn device_buffer<'a>(&self, device: &'a mut Self::Device) -> &'a mut [u8];

    /// Accepted format of an open device
    fn device_format(&self, device: &Self::Device) -> Option<DeviceFormat>;

    /// Release everything the device holds; safe to call more than once
    fn close_device(&self, device: &mut Self::Device);

    /// Process-level teardown
    fn deinitialize(&self) {}
}
