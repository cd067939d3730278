//! PCM Core
//!
//! Platform-agnostic types and the capability trait shared by PCM output
//! backends and the host that drives them.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Formats**: the generic [`AudioFormat`] enumeration, its fallback
//!   chains, and [`AudioSpec`]
//! - **Discovery**: [`DeviceHandle`], [`DeviceInfo`] and [`DetectedDevices`]
//! - **Capability trait**: [`AudioDriver`], implemented once per backend
//! - **Error Handling**: [`AudioError`] and [`Result`]
//!
//! # Example
//!
//! ```rust
//! use pcm_core::{AudioFormat, AudioSpec, DeviceHandle};
//!
//! let spec = AudioSpec::new(AudioFormat::S16Le, 2, 48_000);
//! assert_eq!(spec.buffer_size(1024), 4096);
//!
//! let handle = DeviceHandle::new(0, 1).unwrap();
//! assert_eq!(handle.raw(), 0x0001_0000);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AudioError, Result};
pub use traits::{AudioDriver, DeviceFormat, DriverInfo};
pub use types::{AudioFormat, AudioSpec, DetectedDevices, DeviceHandle, DeviceInfo};
