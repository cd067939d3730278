//! Host-facing driver

use crate::config::BackendConfig;
use crate::device::QsaDevice;
use crate::enumerate::enumerate;
use crate::error::{ErrorPhase, Result};
use crate::format::FormatTable;
use crate::stream::PlayOutcome;
use crate::sys::SoundSystem;
use pcm_core::{
    AudioDriver, AudioSpec, DetectedDevices, DeviceFormat, DeviceHandle, DriverInfo,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// QSA backend for a host audio framework
///
/// # Example
///
/// ```
/// use pcm_core::{AudioDriver, AudioSpec};
/// use pcm_qsa::sim::SimSoundSystem;
/// use pcm_qsa::QsaDriver;
///
/// let system = SimSoundSystem::builder()
///     .card(0, "Simulated HDA", 1)
///     .preferred_playback(0, 0)
///     .build();
/// let driver = QsaDriver::new(system);
///
/// let detected = driver.detect_devices();
/// let handle = detected.default_playback.unwrap();
///
/// let mut device = driver
///     .open_device(handle, false, &AudioSpec::cd_quality())
///     .unwrap();
/// assert!(driver.device_format(&device).is_some());
/// driver.close_device(&mut device);
/// ```
pub struct QsaDriver<S: SoundSystem> {
    system: Arc<S>,
    config: Arc<BackendConfig>,
    table: FormatTable,
}

impl<S: SoundSystem> QsaDriver<S> {
    /// Driver with the default configuration
    pub fn new(system: S) -> Self {
        Self {
            system: Arc::new(system),
            config: Arc::new(BackendConfig::default()),
            table: FormatTable::QSA,
        }
    }

    /// Driver with a custom configuration
    pub fn with_config(system: S, config: BackendConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            system: Arc::new(system),
            config: Arc::new(config),
            table: FormatTable::QSA,
        })
    }

    /// Replace the format table
    #[must_use]
    pub fn with_format_table(mut self, table: FormatTable) -> Self {
        self.table = table;
        self
    }

    /// The underlying subsystem
    pub fn system(&self) -> &Arc<S> {
        &self.system
    }

    /// Active configuration
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Create and open a device, keeping the backend error
    pub fn open(
        &self,
        handle: DeviceHandle,
        recording: bool,
        spec: &AudioSpec,
    ) -> Result<QsaDevice<S>> {
        let mut device = QsaDevice::new(
            Arc::clone(&self.system),
            Arc::clone(&self.config),
            self.table,
            handle,
            recording,
        );

        if let Err(err) = device.open(spec) {
            device.close();
            return Err(err);
        }
        Ok(device)
    }
}

impl<S: SoundSystem> AudioDriver for QsaDriver<S> {
    type Device = QsaDevice<S>;

    fn info(&self) -> DriverInfo {
        DriverInfo {
            name: "qsa",
            description: "QNX QSA Audio",
        }
    }

    fn detect_devices(&self) -> DetectedDevices {
        enumerate(self.system.as_ref(), &self.config, &self.table)
    }

    fn open_device(
        &self,
        handle: DeviceHandle,
        recording: bool,
        spec: &AudioSpec,
    ) -> pcm_core::Result<Self::Device> {
        self.open(handle, recording, spec).map_err(|err| {
            warn!("opening {} failed: {}", handle, err);
            err.into_audio_error(ErrorPhase::Configuration)
        })
    }

    fn thread_init(&self, device: &mut Self::Device) {
        device.thread_init();
    }

    fn wait_device(&self, device: &mut Self::Device) -> pcm_core::Result<()> {
        device
            .wait_ready()
            .map(|_| ())
            .map_err(|err| err.into_audio_error(ErrorPhase::Fatal))
    }

    fn play_device(&self, device: &mut Self::Device, len: usize) -> pcm_core::Result<()> {
        match device.play_buffer(len) {
            Ok(PlayOutcome::Complete) => Ok(()),
            Ok(outcome) => {
                debug!("{}: {:?}", device.handle(), outcome);
                Ok(())
            }
            Err(err) => Err(err.into_audio_error(ErrorPhase::Fatal)),
        }
    }

    fn device_buffer<'a>(&self, device: &'a mut Self::Device) -> &'a mut [u8] {
        device.buffer_mut()
    }

    fn device_format(&self, device: &Self::Device) -> Option<DeviceFormat> {
        device.format()
    }

    fn close_device(&self, device: &mut Self::Device) {
        device.close();
    }
}

impl<S: SoundSystem> std::fmt::Debug for QsaDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QsaDriver")
            .field("config", &self.config)
            .field("table", &self.table)
            .finish()
    }
}
