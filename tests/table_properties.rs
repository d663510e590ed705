//! Translation table construction and mapping properties
//!
//! Exercises mask packing, forward/reverse mapping and display-order swaps
//! over representative masks. No hardware required.

use nvoptions::TranslationTable;
use nvoptions::attributes::{Attribute, FSAA_16X, FSAA_32X, FSAA_32XS, FSAA_8XS};

/// Mask shapes drivers actually report: empty, single bit, contiguous runs,
/// sparse spreads, high bits, everything.
const SAMPLE_MASKS: &[u32] = &[
    0,
    0b1,
    0b10,
    0b111,
    0b10110,
    0b1010_1010,
    0x0000_FFFF,
    0x8000_0001,
    0xAAAA_5555,
    0xFFFF_FFFF,
];

// ============================================================================
// Builder properties
// ============================================================================

#[test]
fn test_table_length_matches_popcount() {
    for &mask in SAMPLE_MASKS {
        let table = TranslationTable::from_mask(mask);
        assert_eq!(table.len(), mask.count_ones() as usize, "mask {mask:#x}");
    }
}

#[test]
fn test_entries_and_set_bits_correspond_one_to_one() {
    for &mask in SAMPLE_MASKS {
        let table = TranslationTable::from_mask(mask);
        for value in table.iter() {
            assert!(
                mask & (1 << value) != 0,
                "entry {value} not set in mask {mask:#x}"
            );
        }
        for bit in 0..u32::BITS {
            if mask & (1 << bit) != 0 {
                assert_eq!(
                    table.iter().filter(|&v| v == bit).count(),
                    1,
                    "bit {bit} of mask {mask:#x}"
                );
            }
        }
    }
}

#[test]
fn test_membership_survives_reordering() {
    for &mask in SAMPLE_MASKS {
        let plain = TranslationTable::from_mask(mask);
        let swapped = TranslationTable::from_mask_reordered(mask, &[(7, 9), (13, 14)]);
        let mut a = plain.values().to_vec();
        let mut b = swapped.values().to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b, "mask {mask:#x}");
        assert_eq!(plain.len(), swapped.len());
    }
}

#[test]
fn test_zero_mask_builds_empty_table() {
    let table = TranslationTable::from_mask(0);
    assert!(table.is_empty());
    assert_eq!(table.len(), 0);
    assert_eq!(table.value_at(0), None);
}

#[test]
fn test_builder_is_deterministic() {
    let pairs = &[(7u32, 9u32), (13, 14)];
    for &mask in SAMPLE_MASKS {
        assert_eq!(
            TranslationTable::from_mask(mask),
            TranslationTable::from_mask(mask)
        );
        assert_eq!(
            TranslationTable::from_mask_reordered(mask, pairs),
            TranslationTable::from_mask_reordered(mask, pairs)
        );
    }
}

// ============================================================================
// Mapping properties
// ============================================================================

#[test]
fn test_positions_round_trip_without_swaps() {
    for &mask in SAMPLE_MASKS {
        let table = TranslationTable::from_mask(mask);
        for position in 0..table.len() {
            let value = table.value_at(position).unwrap();
            assert_eq!(table.position_of(value), position, "mask {mask:#x}");
        }
    }
}

#[test]
fn test_unknown_value_maps_to_position_zero() {
    for &mask in SAMPLE_MASKS {
        let table = TranslationTable::from_mask(mask);
        if table.is_empty() {
            continue;
        }
        // 99 is outside the attribute value domain entirely
        assert_eq!(table.position_of(99), 0);
        // and a value whose bit is simply clear
        if let Some(absent) = (0..u32::BITS).find(|bit| mask & (1 << bit) == 0) {
            assert_eq!(table.position_of(absent), 0, "mask {mask:#x}");
        }
    }
}

#[test]
fn test_out_of_range_position_clamps_to_last_entry() {
    let table = TranslationTable::from_mask(0b10110);
    assert_eq!(table.value_at(2), Some(4));
    // stale position left over from a larger previous table
    assert_eq!(table.value_at(500), Some(4));
}

// ============================================================================
// Display-order swaps
// ============================================================================

#[test]
fn test_swap_pair_reverses_presentation_order() {
    // values 7 and 9 both advertised; dense order puts 7 first, the swap
    // pair presents 9 first
    let mask = (1 << 7) | (1 << 9) | (1 << 2);
    let table = TranslationTable::from_mask_reordered(mask, &[(7, 9)]);
    assert_eq!(table.len(), 3);
    assert!(table.position_of(7) > table.position_of(9));
    assert!(table.contains(2) && table.contains(7) && table.contains(9));
}

#[test]
fn test_swap_with_one_side_absent_leaves_order_alone() {
    // 9 not advertised, so the pair does nothing
    let mask = (1 << 7) | (1 << 2);
    let table = TranslationTable::from_mask_reordered(mask, &[(7, 9)]);
    assert_eq!(table.values(), &[2, 7]);
}

#[test]
fn test_fsaa_family_swaps_match_selector_order() {
    let mask = (1 << FSAA_16X) | (1 << FSAA_8XS) | (1 << FSAA_32XS) | (1 << FSAA_32X);
    let table = Attribute::FsaaMode.build_table(mask);
    assert!(table.position_of(FSAA_16X) > table.position_of(FSAA_8XS));
    assert!(table.position_of(FSAA_32XS) > table.position_of(FSAA_32X));
}

// ============================================================================
// Concrete example
// ============================================================================

#[test]
fn test_documented_example_mask() {
    // bits 1, 2 and 4
    let table = TranslationTable::from_mask(0b10110);
    assert_eq!(table.values(), &[1, 2, 4]);
    assert_eq!(table.value_at(0), Some(1));
    assert_eq!(table.value_at(2), Some(4));
    assert_eq!(table.position_of(2), 1);
    assert_eq!(table.position_of(99), 0);
}
