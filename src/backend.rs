//! Attribute Backend Abstraction
//!
//! Provides a trait-based abstraction over attribute access for testability.
//! Real implementations talk to NVKMS or the nvidia-settings binary, the mock
//! implementation returns configurable data and records writes.

use crate::attributes::Attribute;
use crate::nvkms_backend::NvKmsBackend;
use crate::shell_backend::ShellBackend;
use crate::{NvOptionsError, NvResult};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A display output as the backend addresses it.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayHandle {
    pub id: u32,
    pub name: String,
    /// Connector type, e.g. "DP", "HDMI"
    pub kind: String,
}

/// Attribute access per display.
///
/// `valid_values` returns the driver's integer-bits mask: bit `i` set means
/// attribute value `i` is currently legal on that display. All three value
/// operations can fail independently; a display that answers `current_value`
/// can still refuse `valid_values` mid reconfiguration.
pub trait AttributeBackend: Send + Sync {
    /// Enumerate the displays this backend can address.
    fn list_displays(&self) -> NvResult<Vec<DisplayHandle>>;

    /// Valid-values bitmask for an attribute on a display.
    fn valid_values(&self, display: u32, attribute: Attribute) -> NvResult<u32>;

    /// Value the driver currently reports for an attribute.
    fn current_value(&self, display: u32, attribute: Attribute) -> NvResult<u32>;

    /// Request a new attribute value.
    fn set_value(&self, display: u32, attribute: Attribute, value: u32) -> NvResult<()>;

    /// Whether this backend can reach a driver at all.
    fn is_available(&self) -> bool;
}

/// Shared backend type for use across modules
pub type SharedAttributeBackend = Arc<dyn AttributeBackend>;

/// Which driver path to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// NVKMS when the open driver is up, nvidia-settings otherwise
    Auto,
    /// /dev/nvidia-modeset ioctls (open kernel modules)
    Nvkms,
    /// The nvidia-settings binary over NV-CONTROL
    Shell,
}

/// Create a shared backend of the requested kind.
pub fn create_backend(kind: BackendKind) -> NvResult<SharedAttributeBackend> {
    match kind {
        BackendKind::Nvkms => Ok(Arc::new(NvKmsBackend::new()?)),
        BackendKind::Shell => Ok(Arc::new(ShellBackend::new()?)),
        BackendKind::Auto => match NvKmsBackend::new() {
            Ok(backend) => Ok(Arc::new(backend)),
            Err(_) => Ok(Arc::new(ShellBackend::new()?)),
        },
    }
}

/// Create a shared mock backend for testing
pub fn create_mock_backend() -> SharedAttributeBackend {
    Arc::new(MockAttributeBackend::desktop())
}

/// One recorded write for mock assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCall {
    pub display: u32,
    pub attribute: Attribute,
    pub value: u32,
}

#[derive(Debug, Clone)]
struct MockAttributeState {
    /// `None` simulates a failing valid-values query while the attribute
    /// itself still exists (the fallback-table path).
    mask: Option<u32>,
    current: u32,
}

/// Mock attribute backend for testing
///
/// State is keyed by `(display, attribute)`. Attributes without an entry are
/// unsupported on that display; entries with `mask: None` fail the
/// valid-values query. Writes are validated against the mask, applied to the
/// stored current value, and logged so tests can assert on them.
pub struct MockAttributeBackend {
    displays: Vec<DisplayHandle>,
    state: Mutex<HashMap<(u32, Attribute), MockAttributeState>>,
    set_log: Mutex<Vec<SetCall>>,
    available: bool,
}

impl MockAttributeBackend {
    /// A desktop setup: one DisplayPort and one HDMI output with the masks a
    /// current GeForce typically advertises.
    pub fn desktop() -> Self {
        let mock = Self::single_display();
        mock.with_display(1, "HDMI-0", "HDMI")
            .with_mask(1, Attribute::ColorSpace, 0b111)
            .with_mask(1, Attribute::ColorRange, 0b11)
            .with_mask(1, Attribute::Dithering, 0b111)
            .with_mask(1, Attribute::DitheringMode, 0b1111)
            .with_mask(1, Attribute::DitheringDepth, 0b111)
            .with_mask(1, Attribute::FsaaMode, FSAA_MASK_TYPICAL)
            .with_mask(1, Attribute::StereoSwapMode, 0b001)
    }

    /// A single DisplayPort output.
    pub fn single_display() -> Self {
        let mock = Self {
            displays: vec![],
            state: Mutex::new(HashMap::new()),
            set_log: Mutex::new(Vec::new()),
            available: true,
        };
        mock.with_display(0, "DP-0", "DP")
            .with_mask(0, Attribute::ColorSpace, 0b111)
            .with_mask(0, Attribute::ColorRange, 0b11)
            .with_mask(0, Attribute::Dithering, 0b111)
            .with_mask(0, Attribute::DitheringMode, 0b1111)
            .with_mask(0, Attribute::DitheringDepth, 0b111)
            .with_mask(0, Attribute::FsaaMode, FSAA_MASK_TYPICAL)
            .with_mask(0, Attribute::StereoSwapMode, 0b111)
    }

    /// No displays, no driver.
    pub fn headless() -> Self {
        Self {
            displays: vec![],
            state: Mutex::new(HashMap::new()),
            set_log: Mutex::new(Vec::new()),
            available: false,
        }
    }

    /// Add a display with no attribute state yet.
    pub fn with_display(mut self, id: u32, name: &str, kind: &str) -> Self {
        self.displays.push(DisplayHandle {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
        });
        self
    }

    /// Set the valid-values mask for an attribute. Current value starts at
    /// the family's automatic value.
    pub fn with_mask(self, display: u32, attribute: Attribute, mask: u32) -> Self {
        let current = attribute.automatic_value();
        self.state.lock().unwrap().insert(
            (display, attribute),
            MockAttributeState {
                mask: Some(mask),
                current,
            },
        );
        self
    }

    /// Set the driver-reported current value without touching the mask.
    pub fn with_current(self, display: u32, attribute: Attribute, value: u32) -> Self {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entry((display, attribute))
            .or_insert(MockAttributeState {
                mask: Some(0),
                current: 0,
            });
        entry.current = value;
        drop(state);
        self
    }

    /// Make the valid-values query fail for an attribute that still accepts
    /// get/set, exercising the fallback-table path.
    pub fn with_failing_valid_values(self, display: u32, attribute: Attribute) -> Self {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entry((display, attribute))
            .or_insert(MockAttributeState {
                mask: None,
                current: attribute.automatic_value(),
            });
        entry.mask = None;
        drop(state);
        self
    }

    /// Replace the mask after construction, simulating a capability change
    /// (hot-plug, mode switch) underneath a live control.
    pub fn replace_mask(&self, display: u32, attribute: Attribute, mask: u32) {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entry((display, attribute))
            .or_insert(MockAttributeState {
                mask: Some(mask),
                current: attribute.automatic_value(),
            });
        entry.mask = Some(mask);
    }

    /// Writes recorded so far, oldest first.
    pub fn set_calls(&self) -> Vec<SetCall> {
        self.set_log.lock().unwrap().clone()
    }

    fn lookup(&self, display: u32, attribute: Attribute) -> NvResult<MockAttributeState> {
        if !self.displays.iter().any(|d| d.id == display) {
            return Err(NvOptionsError::DisplayDetectionFailed(format!(
                "no display with id {display}"
            )));
        }
        self.state
            .lock()
            .unwrap()
            .get(&(display, attribute))
            .cloned()
            .ok_or_else(|| {
                NvOptionsError::Unsupported(format!("{attribute} not exposed on display {display}"))
            })
    }
}

impl AttributeBackend for MockAttributeBackend {
    fn list_displays(&self) -> NvResult<Vec<DisplayHandle>> {
        if !self.available {
            return Err(NvOptionsError::BackendUnavailable(
                "mock configured headless".to_string(),
            ));
        }
        Ok(self.displays.clone())
    }

    fn valid_values(&self, display: u32, attribute: Attribute) -> NvResult<u32> {
        let state = self.lookup(display, attribute)?;
        state.mask.ok_or_else(|| {
            NvOptionsError::AttributeQueryFailed(format!(
                "simulated valid-values failure for {attribute}"
            ))
        })
    }

    fn current_value(&self, display: u32, attribute: Attribute) -> NvResult<u32> {
        Ok(self.lookup(display, attribute)?.current)
    }

    fn set_value(&self, display: u32, attribute: Attribute, value: u32) -> NvResult<()> {
        let state = self.lookup(display, attribute)?;
        if let Some(mask) = state.mask {
            if value >= u32::BITS || mask & (1 << value) == 0 {
                return Err(NvOptionsError::AttributeSetFailed(format!(
                    "{attribute} value {value} rejected (mask {mask:#x})"
                )));
            }
        }

        let mut all = self.state.lock().unwrap();
        if let Some(entry) = all.get_mut(&(display, attribute)) {
            entry.current = value;
        }
        drop(all);

        self.set_log.lock().unwrap().push(SetCall {
            display,
            attribute,
            value,
        });
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// A small non-negative range still describes a finite value set; wider or
/// negative ranges have no mask representation. Both real backends use this
/// when a driver reports a range where a value list was expected.
pub(crate) fn range_to_mask(min: i64, max: i64) -> Option<u32> {
    if min < 0 || max < min || max >= i64::from(u32::BITS) {
        return None;
    }
    let mut mask = 0u32;
    for value in min..=max {
        mask |= 1 << value;
    }
    Some(mask)
}

/// FSAA modes a desktop Ampere/Ada part typically advertises: Off, 2x, 2x2
/// supersampling, 4x, 8x, 16x, 8xS, 8xQ and 16xQ.
pub const FSAA_MASK_TYPICAL: u32 = (1 << 0)
    | (1 << 1)
    | (1 << 4)
    | (1 << 5)
    | (1 << 7)
    | (1 << 8)
    | (1 << 9)
    | (1 << 10)
    | (1 << 12);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_rejects_unknown_display() {
        let backend = MockAttributeBackend::single_display();
        assert!(backend.valid_values(9, Attribute::ColorSpace).is_err());
    }

    #[test]
    fn mock_records_and_applies_sets() {
        let backend = MockAttributeBackend::single_display();
        backend.set_value(0, Attribute::ColorRange, 1).unwrap();
        assert_eq!(backend.current_value(0, Attribute::ColorRange).unwrap(), 1);
        assert_eq!(
            backend.set_calls(),
            vec![SetCall {
                display: 0,
                attribute: Attribute::ColorRange,
                value: 1
            }]
        );
    }

    #[test]
    fn mock_rejects_value_outside_mask() {
        let backend = MockAttributeBackend::single_display();
        let err = backend.set_value(0, Attribute::ColorRange, 5).unwrap_err();
        assert!(matches!(err, NvOptionsError::AttributeSetFailed(_)));
        assert!(backend.set_calls().is_empty());
    }

    #[test]
    fn failing_valid_values_still_answers_current() {
        let backend = MockAttributeBackend::single_display()
            .with_failing_valid_values(0, Attribute::FsaaMode);
        assert!(backend.valid_values(0, Attribute::FsaaMode).is_err());
        assert!(backend.current_value(0, Attribute::FsaaMode).is_ok());
    }

    #[test]
    fn range_mask_covers_small_spans() {
        assert_eq!(range_to_mask(0, 2), Some(0b111));
        assert_eq!(range_to_mask(1, 3), Some(0b1110));
        assert_eq!(range_to_mask(0, 0), Some(0b1));
    }

    #[test]
    fn range_mask_rejects_unrepresentable_spans() {
        assert_eq!(range_to_mask(-1, 2), None);
        assert_eq!(range_to_mask(0, 32), None);
        assert_eq!(range_to_mask(5, 4), None);
    }
}
