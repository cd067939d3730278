//! Device discovery
//!
//! Walks every card the subsystem lists and probes its sub-devices by
//! opening each one for playback. Probing never surfaces errors and never
//! leaves a handle open: every handle it opens is closed before moving on.

use crate::config::BackendConfig;
use crate::format::FormatTable;
use crate::sys::{Direction, PcmChannel, SoundSystem};
use nix::errno::Errno;
use pcm_core::{AudioSpec, DetectedDevices, DeviceHandle, DeviceInfo};
use tracing::{debug, warn};

/// Room reserved for the `" d<index>"` suffix on top of the card name
const SUFFIX_ROOM: usize = 32;

/// Discover playback endpoints and the preferred defaults
pub fn enumerate<S: SoundSystem>(
    system: &S,
    config: &BackendConfig,
    table: &FormatTable,
) -> DetectedDevices {
    let mut detected = DetectedDevices::default();

    let count = system.card_count();
    if count == 0 {
        debug!("no sound cards present");
        return detected;
    }

    let listed = system.list_cards(count);
    let usable = count.min(listed.total).min(listed.cards.len());

    for &card in &listed.cards[..usable] {
        let Some(card_index) = u32::try_from(card)
            .ok()
            .filter(|c| *c <= DeviceHandle::MAX_INDEX)
        else {
            warn!("skipping card {}: index does not fit a device handle", card);
            continue;
        };

        probe_card(system, config, table, card, card_index, &mut detected);
    }

    detected.default_playback = preferred(system, Direction::Playback, &detected);
    detected.default_recording = preferred(system, Direction::Capture, &detected);

    debug!(
        "found {} device(s), default playback {:?}, default recording {:?}",
        detected.devices.len(),
        detected.default_playback,
        detected.default_recording
    );
    detected
}

fn probe_card<S: SoundSystem>(
    system: &S,
    config: &BackendConfig,
    table: &FormatTable,
    card: i32,
    card_index: u32,
    detected: &mut DetectedDevices,
) {
    for device in 0..=DeviceHandle::MAX_INDEX {
        let long_name = match system.card_long_name(card) {
            Ok(name) => name,
            Err(errno) => {
                debug!("card {}: no name ({}), stopping", card, errno.desc());
                return;
            }
        };

        let mut pcm = match system.open(card, device, Direction::Playback) {
            Ok(pcm) => pcm,
            Err(Errno::ENOENT) => return,
            Err(errno) => {
                debug!("card {} device {}: {}", card, device, errno.desc());
                continue;
            }
        };

        let spec = current_spec(&mut pcm, table);

        if let Err(errno) = pcm.close() {
            warn!(
                "card {} device {}: close after probe failed: {}",
                card,
                device,
                errno.desc()
            );
            continue;
        }

        // Both indices are within MAX_INDEX here
        let Some(handle) = DeviceHandle::new(card_index, device) else {
            continue;
        };

        let name = display_name(&long_name, device, config.max_name_length);
        debug!("found {} ({})", name, handle);

        detected.devices.push(DeviceInfo {
            handle,
            recording: false,
            name,
            spec,
        });
    }
}

/// Spec the hardware currently reports, if it maps to a host format
fn current_spec<P: PcmChannel>(pcm: &mut P, table: &FormatTable) -> Option<AudioSpec> {
    let setup = pcm.plugin_setup(Direction::Playback).ok()?;
    let format = table.generic_of(setup.format.format)?;
    let channels = u8::try_from(setup.format.voices).ok()?;
    Some(AudioSpec::new(format, channels, setup.format.rate))
}

/// Resolve the subsystem's preferred endpoint to a reported handle
fn preferred<S: SoundSystem>(
    system: &S,
    direction: Direction,
    detected: &DetectedDevices,
) -> Option<DeviceHandle> {
    let (pcm, card, device) = match system.open_preferred(direction) {
        Ok(opened) => opened,
        Err(errno) => {
            debug!("no preferred {:?} device: {}", direction, errno.desc());
            return None;
        }
    };

    if let Err(errno) = pcm.close() {
        warn!("closing preferred {:?} device failed: {}", direction, errno.desc());
    }

    let handle = DeviceHandle::new(u32::try_from(card).ok()?, device)?;
    let info = detected.find(handle)?;
    if info.recording != direction.is_capture() {
        debug!(
            "preferred {:?} device {} was reported for the other direction",
            direction, handle
        );
        return None;
    }
    Some(info.handle)
}

/// `"<card name> d<index>"`, with the card name and the whole string capped
fn display_name(long_name: &str, device: u32, max_name_length: usize) -> String {
    let mut name: String = long_name
        .chars()
        .take(max_name_length.saturating_sub(1))
        .collect();
    name.push_str(&format!(" d{device}"));

    let limit = max_name_length + SUFFIX_ROOM - 1;
    if name.chars().count() > limit {
        name = name.chars().take(limit).collect();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_appends_index() {
        assert_eq!(display_name("Intel HDA", 3, 97), "Intel HDA d3");
    }

    #[test]
    fn display_name_caps_card_name() {
        let long = "x".repeat(200);
        let name = display_name(&long, 12, 97);
        assert_eq!(name, format!("{} d12", "x".repeat(96)));
    }

    #[test]
    fn display_name_respects_total_limit() {
        let name = display_name("abcdef", 65_535, 2);
        assert!(name.chars().count() <= 2 + SUFFIX_ROOM - 1);
        assert!(name.starts_with("a d"));
    }

    #[test]
    fn display_name_counts_characters_not_bytes() {
        let name = display_name("ÄÖÜäöü", 0, 4);
        assert_eq!(name, "ÄÖÜ d0");
    }
}
