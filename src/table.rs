//! Valid-value translation tables
//!
//! NVKMS and NV-CONTROL report the selectable values of integer-bits display
//! attributes as a bitmask: bit `i` set means attribute value `i` is legal on
//! the current display. Selector widgets (dropdowns, sliders) want a dense
//! `0..N` position space instead. `TranslationTable` packs the mask into an
//! ordered list of attribute values and maps positions to values and back.

/// Dense, ordered list of the attribute values a display currently accepts.
///
/// Built from a valid-values bitmask, optionally permuted by display-order
/// swap pairs. Immutable once built; owners replace the whole table when the
/// capability set changes (hot-plug, mode change) rather than patching it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    mask: u32,
    entries: Vec<u32>,
}

impl TranslationTable {
    /// Pack `mask` into a table, ascending by attribute value.
    ///
    /// A zero mask yields an empty table, which callers treat as "attribute
    /// unsupported here" and hide or disable the control.
    pub fn from_mask(mask: u32) -> Self {
        let mut entries = Vec::with_capacity(mask.count_ones() as usize);
        for bit in 0..u32::BITS {
            if mask & (1 << bit) != 0 {
                entries.push(bit);
            }
        }
        TranslationTable { mask, entries }
    }

    /// Pack `mask`, then apply display-order swaps.
    ///
    /// For each `(a, b)` pair, the positions of `a` and `b` are exchanged if
    /// both values made it into the table; pairs with a missing side are
    /// skipped. Swaps change ordering only, never membership or length.
    pub fn from_mask_reordered(mask: u32, swap_pairs: &[(u32, u32)]) -> Self {
        let mut table = Self::from_mask(mask);
        for &(a, b) in swap_pairs {
            let pos_a = table.entries.iter().position(|&v| v == a);
            let pos_b = table.entries.iter().position(|&v| v == b);
            if let (Some(i), Some(j)) = (pos_a, pos_b) {
                table.entries.swap(i, j);
            }
        }
        table
    }

    /// The bitmask this table was built from.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attribute value at `position`, exact bounds check.
    pub fn get(&self, position: usize) -> Option<u32> {
        self.entries.get(position).copied()
    }

    /// Forward map: selector position to attribute value.
    ///
    /// Positions past the end clamp to the last entry instead of panicking;
    /// a widget can briefly hold a stale position while its table is being
    /// replaced. `None` only for an empty table.
    pub fn value_at(&self, position: usize) -> Option<u32> {
        let last = self.entries.len().checked_sub(1)?;
        Some(self.entries[position.min(last)])
    }

    /// Reverse map: attribute value to selector position.
    ///
    /// Values not in the table map to position 0. The driver can report a
    /// value outside the advertised set (capability change racing a query),
    /// and the selector then shows whichever entry callers put first, which
    /// for every attribute family here is the conservative/automatic one.
    pub fn position_of(&self, value: u32) -> usize {
        self.entries
            .iter()
            .position(|&v| v == value)
            .unwrap_or(0)
    }

    pub fn contains(&self, value: u32) -> bool {
        self.entries.contains(&value)
    }

    /// Table entries in selector order.
    pub fn values(&self) -> &[u32] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().copied()
    }
}
