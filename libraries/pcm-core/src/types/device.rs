/// Device discovery types
use serde::{Deserialize, Serialize};

use super::audio::AudioSpec;

/// Opaque identifier of one native endpoint
///
/// Packs a card index into the low 16 bits and a sub-device index into the
/// high 16 bits, so the host can store and compare it without knowing what
/// it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    /// Largest card or sub-device index that fits in a handle
    pub const MAX_INDEX: u32 = 0xFFFF;

    /// Pack a card and sub-device index
    ///
    /// Returns `None` when either index does not fit in 16 bits.
    pub fn new(card: u32, device: u32) -> Option<Self> {
        if card > Self::MAX_INDEX || device > Self::MAX_INDEX {
            return None;
        }
        Some(Self(card | (device << 16)))
    }

    /// Reinterpret a raw value previously obtained from [`DeviceHandle::raw`]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed value
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Card index
    pub fn card(&self) -> u32 {
        self.0 & Self::MAX_INDEX
    }

    /// Sub-device index on the card
    pub fn device(&self) -> u32 {
        (self.0 >> 16) & Self::MAX_INDEX
    }
}

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "card {} device {}", self.card(), self.device())
    }
}

/// One endpoint reported by device discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Handle to pass back when opening the device
    pub handle: DeviceHandle,

    /// Recording endpoint rather than playback
    pub recording: bool,

    /// Display name
    pub name: String,

    /// Configuration the hardware currently reports, if it could be read
    pub spec: Option<AudioSpec>,
}

/// Result of a discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedDevices {
    /// Every endpoint found, in discovery order
    pub devices: Vec<DeviceInfo>,

    /// Endpoint the hardware prefers for playback
    pub default_playback: Option<DeviceHandle>,

    /// Endpoint the hardware prefers for recording
    pub default_recording: Option<DeviceHandle>,
}

impl DetectedDevices {
    /// Look up a reported device by handle
    pub fn find(&self, handle: DeviceHandle) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.handle == handle)
    }

    /// Playback endpoints only
    pub fn playback(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().filter(|d| !d.recording)
    }

    /// Recording endpoints only
    pub fn recording(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().filter(|d| d.recording)
    }

    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
