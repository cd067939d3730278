//! QNX Sound Architecture (QSA) PCM backend
//!
//! Discovers playback endpoints, negotiates a sample format the hardware
//! accepts, and feeds period buffers to the device with a blocking write
//! loop that rides out transient busy conditions and hardware underruns.
//!
//! The native subsystem is reached through the [`SoundSystem`] and
//! [`PcmChannel`] traits. With the `sim` feature, `sim::SimSoundSystem`
//! implements them in memory; the examples below use it.
//!
//! # Example
//!
//! ```
//! use pcm_core::{AudioDriver, AudioSpec};
//! use pcm_qsa::sim::SimSoundSystem;
//! use pcm_qsa::QsaDriver;
//!
//! let driver = QsaDriver::new(SimSoundSystem::builder().card(0, "Sim", 2).build());
//! let detected = driver.detect_devices();
//! assert_eq!(detected.devices.len(), 2);
//! assert_eq!(detected.devices[1].name, "Sim d1");
//!
//! let mut device = driver
//!     .open_device(detected.devices[0].handle, false, &AudioSpec::cd_quality())
//!     .unwrap();
//! driver.wait_device(&mut device).unwrap();
//! let len = driver.device_buffer(&mut device).len();
//! driver.play_device(&mut device, len).unwrap();
//! driver.close_device(&mut device);
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod device;
pub mod driver;
pub mod enumerate;
pub mod error;
pub mod format;
pub mod negotiate;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod stream;
pub mod sys;

pub use config::{BackendConfig, ChannelDefaults};
pub use device::QsaDevice;
pub use driver::QsaDriver;
pub use enumerate::enumerate;
pub use error::{ErrorPhase, QsaError, Result};
pub use format::{FormatMapEntry, FormatTable, NativeFormat};
pub use negotiate::Negotiated;
pub use stream::{PlayOutcome, WaitOutcome};
pub use sys::{ChannelStatus, Direction, PcmChannel, SoundSystem};
