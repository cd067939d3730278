//! Device discovery against the simulated subsystem
//!
//! Verifies:
//! - Nothing is opened when no cards are present
//! - Every probed handle is closed again
//! - Sub-device probing stops at the end of a card and skips broken entries
//! - Defaults resolve to the preferred card/device when it was reported for
//!   the same direction

mod test_helpers;

use nix::errno::Errno;
use pcm_core::{AudioDriver, AudioFormat, AudioSpec, DetectedDevices, DeviceHandle};
use pcm_qsa::sim::SimSoundSystem;
use pcm_qsa::{BackendConfig, FormatTable, NativeFormat, QsaDriver};

fn handle(card: u32, device: u32) -> DeviceHandle {
    DeviceHandle::new(card, device).unwrap()
}

fn detect(sys: &SimSoundSystem) -> DetectedDevices {
    test_helpers::init_logging();
    pcm_qsa::enumerate(sys, &BackendConfig::default(), &FormatTable::QSA)
}

// ============================================================================
// EMPTY SYSTEMS
// ============================================================================

#[test]
fn test_no_cards_reports_nothing() {
    let sys = SimSoundSystem::builder().build();
    let detected = detect(&sys);

    assert!(detected.is_empty());
    assert_eq!(detected.default_playback, None);
    assert_eq!(detected.default_recording, None);
    assert_eq!(sys.counts().opens, 0);
}

#[test]
fn test_zero_card_count_skips_listing() {
    let sys = SimSoundSystem::builder()
        .card(0, "Present but unreported", 2)
        .card_count(0)
        .preferred_playback(0, 0)
        .build();
    let detected = detect(&sys);

    assert!(detected.is_empty());
    assert_eq!(detected.default_playback, None);
    assert_eq!(sys.counts().opens, 0);
}

// ============================================================================
// PROBING
// ============================================================================

#[test]
fn test_devices_are_named_and_closed() {
    let sys = SimSoundSystem::builder()
        .card(0, "Intel HDA", 2)
        .card(1, "USB Audio", 1)
        .build();
    let driver = QsaDriver::new(sys.clone());
    let detected = driver.detect_devices();

    let names: Vec<_> = detected.devices.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["Intel HDA d0", "Intel HDA d1", "USB Audio d0"]);

    let handles: Vec<_> = detected.devices.iter().map(|d| d.handle).collect();
    assert_eq!(handles, [handle(0, 0), handle(0, 1), handle(1, 0)]);
    assert!(detected.devices.iter().all(|d| !d.recording));

    let counts = sys.counts();
    assert_eq!(counts.opens, counts.closes);
    assert_eq!(counts.open_handles(), 0);
}

#[test]
fn test_reported_spec_comes_from_probed_handle() {
    let sys = SimSoundSystem::builder()
        .card(0, "Sim", 3)
        .hardware_format(0, 0, NativeFormat::FLOAT_LE, 6, 96_000)
        .hardware_format(0, 1, NativeFormat::S24_LE, 2, 48_000)
        .unreadable_setup(0, 2)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.devices.len(), 3);
    assert_eq!(
        detected.devices[0].spec,
        Some(AudioSpec::new(AudioFormat::F32Le, 6, 96_000))
    );
    // 24-bit has no host format and is not approximated
    assert_eq!(detected.devices[1].spec, None);
    assert_eq!(detected.devices[2].spec, None);
}

#[test]
fn test_open_errors_skip_single_devices() {
    let sys = SimSoundSystem::builder()
        .card(0, "Sim", 3)
        .open_error(0, 1, Errno::EBUSY)
        .build();
    let detected = detect(&sys);

    let handles: Vec<_> = detected.devices.iter().map(|d| d.handle).collect();
    assert_eq!(handles, [handle(0, 0), handle(0, 2)]);
    assert_eq!(sys.counts().open_handles(), 0);
}

#[test]
fn test_failed_close_hides_device() {
    let sys = SimSoundSystem::builder()
        .card(0, "Sim", 2)
        .close_error(0, 0, Errno::EIO)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.devices.len(), 1);
    assert_eq!(detected.devices[0].handle, handle(0, 1));
    assert_eq!(sys.counts().closes, 2);
}

#[test]
fn test_unnamed_card_is_skipped() {
    let sys = SimSoundSystem::builder()
        .card(0, "Broken", 2)
        .card(1, "Working", 1)
        .card_name_error(0, Errno::EIO)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.devices.len(), 1);
    assert_eq!(detected.devices[0].name, "Working d0");
}

#[test]
fn test_listing_is_limited_by_reported_total() {
    let sys = SimSoundSystem::builder()
        .card(0, "First", 1)
        .card(1, "Second", 1)
        .card(2, "Third", 1)
        .listed_total(2)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.devices.len(), 2);
    assert!(detected.find(handle(2, 0)).is_none());
}

#[test]
fn test_card_outside_handle_range_is_skipped() {
    let sys = SimSoundSystem::builder()
        .card(0x1_0000, "Too far", 1)
        .card(-1, "Negative", 1)
        .card(3, "Fine", 1)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.devices.len(), 1);
    assert_eq!(detected.devices[0].handle, handle(3, 0));
    assert_eq!(sys.counts().opens, 1);
}

#[test]
fn test_long_card_names_are_capped() {
    let long_name = "n".repeat(300);
    let sys = SimSoundSystem::builder().card(0, &long_name, 1).build();
    let config = BackendConfig {
        max_name_length: 16,
        ..Default::default()
    };
    let detected = pcm_qsa::enumerate(&sys, &config, &FormatTable::QSA);

    assert_eq!(detected.devices[0].name, format!("{} d0", "n".repeat(15)));
}

// ============================================================================
// DEFAULTS
// ============================================================================

#[test]
fn test_defaults_use_preferred_card_and_device() {
    let sys = SimSoundSystem::builder()
        .card(0, "Onboard", 1)
        .card(1, "USB", 2)
        .preferred_playback(1, 1)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.default_playback, Some(handle(1, 1)));
    assert_eq!(sys.counts().open_handles(), 0);
}

#[test]
fn test_default_recording_never_names_playback_endpoint() {
    let sys = SimSoundSystem::builder()
        .card(0, "Onboard", 1)
        .preferred_playback(0, 0)
        .preferred_capture(0, 0)
        .build();
    let detected = detect(&sys);

    assert_eq!(detected.default_playback, Some(handle(0, 0)));
    assert_eq!(detected.recording().count(), 0);
    assert_eq!(detected.default_recording, None);
    // The preferred capture handle is still opened and closed
    assert_eq!(sys.counts().opens, 3);
    assert_eq!(sys.counts().open_handles(), 0);
}

#[test]
fn test_unreported_preferred_device_is_not_default() {
    let sys = SimSoundSystem::builder()
        .card(0, "Sim", 2)
        .close_error(0, 1, Errno::EIO)
        .preferred_playback(0, 1)
        .build();
    let detected = detect(&sys);

    assert!(detected.find(handle(0, 1)).is_none());
    assert_eq!(detected.default_playback, None);
}

#[test]
fn test_missing_preferred_device_leaves_defaults_empty() {
    let sys = SimSoundSystem::builder().card(0, "Sim", 1).build();
    let detected = detect(&sys);

    assert_eq!(detected.devices.len(), 1);
    assert_eq!(detected.default_playback, None);
    assert_eq!(detected.default_recording, None);
}
