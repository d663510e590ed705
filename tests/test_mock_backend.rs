//! Deterministic tests using the mock attribute backend
//!
//! These tests don't require NVIDIA hardware, a running X session or the
//! nvidia-settings binary.

use nvoptions::attributes::{FSAA_16X, FSAA_8XS};
use nvoptions::backend::{MockAttributeBackend, SetCall, create_mock_backend};
use nvoptions::control::AttributeControl;
use nvoptions::settings::SettingsStore;
use nvoptions::{Attribute, AttributeBackend, NvOptionsError};

fn scratch_store(tag: &str) -> SettingsStore {
    let dir = std::env::temp_dir().join(format!("nvoptions-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    SettingsStore::at(&dir).unwrap()
}

// ============================================================================
// Control lifecycle
// ============================================================================

#[test]
fn test_select_forward_maps_position_to_value() {
    let backend = MockAttributeBackend::single_display();
    let control = AttributeControl::probe(&backend, 0, Attribute::FsaaMode).unwrap();
    assert_eq!(control.display(), 0);
    assert_eq!(control.attribute(), Attribute::FsaaMode);

    // typical mask: position 2 is 2x2 supersampling (value 4)
    let applied = control.select(&backend, 2).unwrap();
    assert_eq!(applied, 4);
    assert_eq!(
        backend.set_calls(),
        vec![SetCall {
            display: 0,
            attribute: Attribute::FsaaMode,
            value: 4
        }]
    );
    assert_eq!(control.selected(&backend).unwrap(), Some(2));
}

#[test]
fn test_fsaa_selector_presents_8xs_before_16x() {
    let backend = MockAttributeBackend::single_display();
    let control = AttributeControl::probe(&backend, 0, Attribute::FsaaMode).unwrap();

    let table = control.table();
    assert_eq!(table.position_of(FSAA_8XS), 5);
    assert_eq!(table.position_of(FSAA_16X), 6);
}

#[test]
fn test_snapshot_labels_options_for_rendering() {
    let backend = MockAttributeBackend::desktop();
    let control = AttributeControl::probe(&backend, 1, Attribute::ColorSpace).unwrap();

    let snapshot = control.snapshot(&backend);
    assert!(snapshot.supported);
    assert_eq!(snapshot.options.len(), 3);
    assert_eq!(snapshot.options[0].label, "RGB");
    assert_eq!(snapshot.options[2].label, "YCbCr444");
    // nothing selected yet, so the automatic value is current
    assert!(snapshot.options[0].current);
}

#[test]
fn test_mock_factory_provides_two_display_desktop() {
    let backend = create_mock_backend();
    assert!(backend.is_available());

    let displays = backend.list_displays().unwrap();
    assert_eq!(displays.len(), 2);
    assert_eq!(displays[0].name, "DP-0");
    assert_eq!(displays[1].name, "HDMI-0");
}

// ============================================================================
// Degradation paths
// ============================================================================

#[test]
fn test_failed_valid_values_degrades_to_automatic_entry() {
    let backend = MockAttributeBackend::single_display()
        .with_failing_valid_values(0, Attribute::DitheringMode);
    let control = AttributeControl::probe(&backend, 0, Attribute::DitheringMode).unwrap();

    assert!(control.is_degraded());
    assert_eq!(
        control.table().values(),
        &[Attribute::DitheringMode.automatic_value()]
    );

    // the one remaining entry still applies cleanly
    let applied = control.select(&backend, 0).unwrap();
    assert_eq!(applied, Attribute::DitheringMode.automatic_value());
}

#[test]
fn test_attribute_missing_from_display_reports_unsupported() {
    let backend = MockAttributeBackend::single_display().with_display(4, "DVI-0", "DVI");
    let control = AttributeControl::probe(&backend, 4, Attribute::FsaaMode).unwrap();

    assert!(!control.is_supported());
    assert!(control.options(None).is_empty());
    assert!(matches!(
        control.select(&backend, 0),
        Err(NvOptionsError::Unsupported(_))
    ));
}

#[test]
fn test_headless_backend_fails_loudly() {
    let backend = MockAttributeBackend::headless();
    assert!(!backend.is_available());

    assert!(matches!(
        backend.list_displays(),
        Err(NvOptionsError::BackendUnavailable(_))
    ));
    assert!(matches!(
        AttributeControl::probe(&backend, 0, Attribute::ColorSpace),
        Err(NvOptionsError::DisplayDetectionFailed(_))
    ));
}

// ============================================================================
// Capability changes
// ============================================================================

#[test]
fn test_hot_plug_refresh_replaces_table_and_falls_back() {
    let backend = MockAttributeBackend::single_display();
    let mut control = AttributeControl::probe(&backend, 0, Attribute::ColorSpace).unwrap();
    assert_eq!(control.table().values(), &[0, 1, 2]);

    // new sink drops RGB; the driver still reports value 0 for a beat
    backend.replace_mask(0, Attribute::ColorSpace, 0b110);
    control.refresh(&backend).unwrap();
    assert_eq!(control.table().values(), &[1, 2]);
    assert_eq!(control.selected(&backend).unwrap(), Some(0));
}

// ============================================================================
// Profiles
// ============================================================================

#[test]
fn test_profile_round_trip_restores_values() {
    let backend = MockAttributeBackend::desktop();
    backend.set_value(0, Attribute::ColorSpace, 2).unwrap();

    let store = scratch_store("roundtrip");
    let profile = store.capture("gaming", &backend).unwrap();
    assert!(profile.settings.iter().any(|s| {
        s.display == "DP-0" && s.attribute == Attribute::ColorSpace && s.value == 2
    }));

    // user flips it away, apply restores
    backend.set_value(0, Attribute::ColorSpace, 0).unwrap();
    let skipped = store.apply("gaming", &backend).unwrap();
    assert!(skipped.is_empty());
    assert_eq!(backend.current_value(0, Attribute::ColorSpace).unwrap(), 2);
}

#[test]
fn test_profile_apply_skips_values_no_longer_valid() {
    let backend = MockAttributeBackend::desktop();
    backend.set_value(0, Attribute::DitheringMode, 3).unwrap();

    let store = scratch_store("stale");
    store.capture("bench", &backend).unwrap();

    // sink now only advertises Auto, so the captured Temporal is skipped
    backend.replace_mask(0, Attribute::DitheringMode, 0b0001);
    let skipped = store.apply("bench", &backend).unwrap();
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].contains("Dithering Mode"));
}
