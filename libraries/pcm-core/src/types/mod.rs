mod audio;
mod device;

pub use audio::{AudioFormat, AudioSpec};
pub use device::{DetectedDevices, DeviceHandle, DeviceInfo};
