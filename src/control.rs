//! Attribute controls
//!
//! The selector lifecycle around one (display, attribute) pair: query the
//! valid-values mask once at construction, own the resulting table, map the
//! driver's current value to a selector position, push selections back, and
//! rebuild the whole table when capabilities change. Mirrors how a settings
//! panel owns one dropdown per attribute.

use crate::attributes::Attribute;
use crate::backend::AttributeBackend;
use crate::table::TranslationTable;
use crate::{NvOptionsError, NvResult};
use serde::Serialize;

/// One selectable entry, in selector order.
#[derive(Debug, Clone, Serialize)]
pub struct OptionEntry {
    pub position: usize,
    pub value: u32,
    pub label: String,
    pub current: bool,
}

/// Full state of a control for structured output.
#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub display: u32,
    pub attribute: Attribute,
    pub supported: bool,
    pub degraded: bool,
    pub mask: u32,
    pub current_value: Option<u32>,
    pub current_position: Option<usize>,
    pub options: Vec<OptionEntry>,
}

/// Owner of one attribute's translation table.
///
/// The table is rebuilt wholesale by [`AttributeControl::refresh`]; nothing
/// ever patches it in place. An empty table means the attribute is not
/// selectable on this display and callers hide or disable the control. When
/// the valid-values query itself fails, the control degrades to a
/// single-entry table holding the family's automatic value so there is
/// always something valid to show.
#[derive(Debug, Clone)]
pub struct AttributeControl {
    display: u32,
    attribute: Attribute,
    table: TranslationTable,
    degraded: bool,
}

impl AttributeControl {
    /// Query valid values and build the control.
    ///
    /// Errors only when the display itself is gone or the backend is down;
    /// attribute-level trouble degrades instead (empty or fallback table).
    pub fn probe(
        backend: &dyn AttributeBackend,
        display: u32,
        attribute: Attribute,
    ) -> NvResult<Self> {
        let (table, degraded) = Self::build(backend, display, attribute)?;
        Ok(AttributeControl {
            display,
            attribute,
            table,
            degraded,
        })
    }

    /// Re-query valid values and replace the table wholesale. Called on
    /// capability-changed notifications (hot-plug, mode set).
    pub fn refresh(&mut self, backend: &dyn AttributeBackend) -> NvResult<()> {
        let (table, degraded) = Self::build(backend, self.display, self.attribute)?;
        self.table = table;
        self.degraded = degraded;
        Ok(())
    }

    fn build(
        backend: &dyn AttributeBackend,
        display: u32,
        attribute: Attribute,
    ) -> NvResult<(TranslationTable, bool)> {
        match backend.valid_values(display, attribute) {
            Ok(mask) => Ok((attribute.build_table(mask), false)),
            // cleanly absent: empty table, control reports unsupported
            Err(NvOptionsError::Unsupported(_)) => Ok((TranslationTable::default(), false)),
            Err(NvOptionsError::DisplayDetectionFailed(e)) => {
                Err(NvOptionsError::DisplayDetectionFailed(e))
            }
            Err(NvOptionsError::BackendUnavailable(e)) => {
                Err(NvOptionsError::BackendUnavailable(e))
            }
            // query failed but the attribute exists: keep one safe entry
            Err(_) => Ok((attribute.fallback_table(), true)),
        }
    }

    pub fn display(&self) -> u32 {
        self.display
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    /// False when the table is empty; the caller should hide the control.
    pub fn is_supported(&self) -> bool {
        !self.table.is_empty()
    }

    /// True when the current table is the fallback built after a failed
    /// valid-values query.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Selector position reflecting the driver's current value, fallback 0
    /// for values outside the table. `None` when unsupported.
    pub fn selected(&self, backend: &dyn AttributeBackend) -> NvResult<Option<usize>> {
        if self.table.is_empty() {
            return Ok(None);
        }
        let current = backend.current_value(self.display, self.attribute)?;
        Ok(Some(self.table.position_of(current)))
    }

    /// Apply the option at `position`: forward map, then write through the
    /// backend. Returns the attribute value that was set.
    pub fn select(&self, backend: &dyn AttributeBackend, position: usize) -> NvResult<u32> {
        let value = self.table.value_at(position).ok_or_else(|| {
            NvOptionsError::Unsupported(format!(
                "{} is not selectable on display {}",
                self.attribute, self.display
            ))
        })?;
        backend.set_value(self.display, self.attribute, value)?;
        Ok(value)
    }

    /// Apply a raw attribute value after checking it against the table, for
    /// callers holding values rather than positions (profiles, `set --value`).
    pub fn select_value(&self, backend: &dyn AttributeBackend, value: u32) -> NvResult<u32> {
        if !self.table.contains(value) {
            return Err(NvOptionsError::AttributeSetFailed(format!(
                "{} ({}) is not among the valid values for {} on display {}",
                self.attribute.label(value),
                value,
                self.attribute,
                self.display
            )));
        }
        backend.set_value(self.display, self.attribute, value)?;
        Ok(value)
    }

    /// Entries in selector order, with the one matching `current` marked.
    pub fn options(&self, current: Option<u32>) -> Vec<OptionEntry> {
        let current_position = current.map(|v| self.table.position_of(v));
        self.table
            .iter()
            .enumerate()
            .map(|(position, value)| OptionEntry {
                position,
                value,
                label: self.attribute.label(value),
                current: current_position == Some(position),
            })
            .collect()
    }

    /// Collect everything a renderer needs in one pass. Current-value query
    /// failures leave `current_value` empty rather than failing the whole
    /// snapshot.
    pub fn snapshot(&self, backend: &dyn AttributeBackend) -> ControlSnapshot {
        let current_value = if self.table.is_empty() {
            None
        } else {
            backend.current_value(self.display, self.attribute).ok()
        };
        let current_position = current_value.map(|v| self.table.position_of(v));
        ControlSnapshot {
            display: self.display,
            attribute: self.attribute,
            supported: self.is_supported(),
            degraded: self.degraded,
            mask: self.table.mask(),
            current_value,
            current_position,
            options: self.options(current_value),
        }
    }
}
