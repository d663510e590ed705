//! Display attribute families
//!
//! The integer-bits display attributes this crate can drive, with their
//! driver value constants (NVKMS / NV-CONTROL numbering), dropdown labels,
//! the conservative default used when a valid-values query fails, and the
//! display-order swaps applied on top of bit order.

use crate::table::TranslationTable;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Color space values =====
pub const COLOR_SPACE_RGB: u32 = 0;
pub const COLOR_SPACE_YCBCR422: u32 = 1;
pub const COLOR_SPACE_YCBCR444: u32 = 2;

// ===== Color range values =====
pub const COLOR_RANGE_FULL: u32 = 0;
pub const COLOR_RANGE_LIMITED: u32 = 1;

// ===== Dithering state values =====
pub const DITHERING_AUTO: u32 = 0;
pub const DITHERING_ENABLED: u32 = 1;
pub const DITHERING_DISABLED: u32 = 2;

// ===== Dithering mode values =====
pub const DITHERING_MODE_AUTO: u32 = 0;
pub const DITHERING_MODE_DYNAMIC_2X2: u32 = 1;
pub const DITHERING_MODE_STATIC_2X2: u32 = 2;
pub const DITHERING_MODE_TEMPORAL: u32 = 3;

// ===== Dithering depth values =====
pub const DITHERING_DEPTH_AUTO: u32 = 0;
pub const DITHERING_DEPTH_6_BITS: u32 = 1;
pub const DITHERING_DEPTH_8_BITS: u32 = 2;

// ===== FSAA mode values =====
pub const FSAA_NONE: u32 = 0;
pub const FSAA_2X: u32 = 1;
pub const FSAA_2X_QUINCUNX: u32 = 2;
pub const FSAA_15X15: u32 = 3;
pub const FSAA_2X2_SS: u32 = 4;
pub const FSAA_4X: u32 = 5;
pub const FSAA_4X_GAUSSIAN: u32 = 6;
pub const FSAA_8X: u32 = 7;
pub const FSAA_16X: u32 = 8;
pub const FSAA_8XS: u32 = 9;
pub const FSAA_8XQ: u32 = 10;
pub const FSAA_16XS: u32 = 11;
pub const FSAA_16XQ: u32 = 12;
pub const FSAA_32XS: u32 = 13;
pub const FSAA_32X: u32 = 14;
pub const FSAA_64XS: u32 = 15;

// ===== Stereo swap mode values =====
pub const STEREO_SWAP_APPLICATION_CONTROL: u32 = 0;
pub const STEREO_SWAP_PER_EYE: u32 = 1;
pub const STEREO_SWAP_PER_EYE_PAIR: u32 = 2;

/// 8xS and 32x were assigned higher bits than 16x and 32xS but belong
/// before them in the selector, so those positions are exchanged after
/// dense packing.
const FSAA_SWAP_PAIRS: &[(u32, u32)] = &[(FSAA_16X, FSAA_8XS), (FSAA_32XS, FSAA_32X)];

/// Integer-bits display attributes with a selectable value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Attribute {
    ColorSpace,
    ColorRange,
    Dithering,
    DitheringMode,
    DitheringDepth,
    FsaaMode,
    StereoSwapMode,
}

impl Attribute {
    pub fn all() -> &'static [Attribute] {
        &[
            Attribute::ColorSpace,
            Attribute::ColorRange,
            Attribute::Dithering,
            Attribute::DitheringMode,
            Attribute::DitheringDepth,
            Attribute::FsaaMode,
            Attribute::StereoSwapMode,
        ]
    }

    /// Build the selector table for this family from a valid-values mask,
    /// with the family's display-order swaps applied.
    pub fn build_table(&self, mask: u32) -> TranslationTable {
        TranslationTable::from_mask_reordered(mask, self.swap_pairs())
    }

    /// Single-entry table holding only the automatic value, used when the
    /// valid-values query itself fails so a control always has one entry.
    pub fn fallback_table(&self) -> TranslationTable {
        TranslationTable::from_mask(1 << self.automatic_value())
    }

    /// The conservative "let the driver decide" value for this family, by
    /// convention the entry selectors show at position 0.
    pub fn automatic_value(&self) -> u32 {
        match self {
            Attribute::ColorSpace => COLOR_SPACE_RGB,
            Attribute::ColorRange => COLOR_RANGE_FULL,
            Attribute::Dithering => DITHERING_AUTO,
            Attribute::DitheringMode => DITHERING_MODE_AUTO,
            Attribute::DitheringDepth => DITHERING_DEPTH_AUTO,
            Attribute::FsaaMode => FSAA_NONE,
            Attribute::StereoSwapMode => STEREO_SWAP_APPLICATION_CONTROL,
        }
    }

    /// Display-order swaps for this family. Empty everywhere except FSAA.
    pub fn swap_pairs(&self) -> &'static [(u32, u32)] {
        match self {
            Attribute::FsaaMode => FSAA_SWAP_PAIRS,
            _ => &[],
        }
    }

    /// Dropdown label for one attribute value. Values outside the known set
    /// still render (the driver can report one mid capability change).
    pub fn label(&self, value: u32) -> String {
        let known = match self {
            Attribute::ColorSpace => match value {
                COLOR_SPACE_RGB => Some("RGB"),
                COLOR_SPACE_YCBCR422 => Some("YCbCr422"),
                COLOR_SPACE_YCBCR444 => Some("YCbCr444"),
                _ => None,
            },
            Attribute::ColorRange => match value {
                COLOR_RANGE_FULL => Some("Full"),
                COLOR_RANGE_LIMITED => Some("Limited"),
                _ => None,
            },
            Attribute::Dithering => match value {
                DITHERING_AUTO => Some("Auto"),
                DITHERING_ENABLED => Some("Enabled"),
                DITHERING_DISABLED => Some("Disabled"),
                _ => None,
            },
            Attribute::DitheringMode => match value {
                DITHERING_MODE_AUTO => Some("Auto"),
                DITHERING_MODE_DYNAMIC_2X2 => Some("Dynamic 2x2"),
                DITHERING_MODE_STATIC_2X2 => Some("Static 2x2"),
                DITHERING_MODE_TEMPORAL => Some("Temporal"),
                _ => None,
            },
            Attribute::DitheringDepth => match value {
                DITHERING_DEPTH_AUTO => Some("Auto"),
                DITHERING_DEPTH_6_BITS => Some("6 bpc"),
                DITHERING_DEPTH_8_BITS => Some("8 bpc"),
                _ => None,
            },
            Attribute::FsaaMode => match value {
                FSAA_NONE => Some("Off"),
                FSAA_2X => Some("2x (2xMS)"),
                FSAA_2X_QUINCUNX => Some("2x Quincunx"),
                FSAA_15X15 => Some("1.5 x 1.5"),
                FSAA_2X2_SS => Some("2 x 2 Supersampling"),
                FSAA_4X => Some("4x (4xMS)"),
                FSAA_4X_GAUSSIAN => Some("4x Gaussian"),
                FSAA_8X => Some("8x (4xMS, 4xCS)"),
                FSAA_16X => Some("16x (4xMS, 12xCS)"),
                FSAA_8XS => Some("8x (4xSS, 2xMS)"),
                FSAA_8XQ => Some("8x (8xMS)"),
                FSAA_16XS => Some("16x (4xSS, 4xMS)"),
                FSAA_16XQ => Some("16x (8xMS, 8xCS)"),
                FSAA_32XS => Some("32x (4xSS, 8xMS)"),
                FSAA_32X => Some("32x (8xMS, 24xCS)"),
                FSAA_64XS => Some("64x (16xSS, 4xMS)"),
                _ => None,
            },
            Attribute::StereoSwapMode => match value {
                STEREO_SWAP_APPLICATION_CONTROL => Some("Application Controlled"),
                STEREO_SWAP_PER_EYE => Some("Per Eye"),
                STEREO_SWAP_PER_EYE_PAIR => Some("Per Eye-Pair"),
                _ => None,
            },
        };

        match known {
            Some(label) => label.to_string(),
            None => format!("Unknown ({value})"),
        }
    }

    /// Parse a user-supplied value name or bare integer for this family.
    pub fn parse_value(&self, input: &str) -> Option<u32> {
        let trimmed = input.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return Some(n);
        }

        let token = trimmed.to_lowercase().replace([' ', '_'], "-");
        match self {
            Attribute::ColorSpace => match token.as_str() {
                "rgb" => Some(COLOR_SPACE_RGB),
                "ycbcr422" => Some(COLOR_SPACE_YCBCR422),
                "ycbcr444" => Some(COLOR_SPACE_YCBCR444),
                _ => None,
            },
            Attribute::ColorRange => match token.as_str() {
                "full" => Some(COLOR_RANGE_FULL),
                "limited" => Some(COLOR_RANGE_LIMITED),
                _ => None,
            },
            Attribute::Dithering => match token.as_str() {
                "auto" => Some(DITHERING_AUTO),
                "enabled" | "on" => Some(DITHERING_ENABLED),
                "disabled" | "off" => Some(DITHERING_DISABLED),
                _ => None,
            },
            Attribute::DitheringMode => match token.as_str() {
                "auto" => Some(DITHERING_MODE_AUTO),
                "dynamic-2x2" | "dynamic" => Some(DITHERING_MODE_DYNAMIC_2X2),
                "static-2x2" | "static" => Some(DITHERING_MODE_STATIC_2X2),
                "temporal" => Some(DITHERING_MODE_TEMPORAL),
                _ => None,
            },
            Attribute::DitheringDepth => match token.as_str() {
                "auto" => Some(DITHERING_DEPTH_AUTO),
                "6bpc" | "6-bpc" | "6" => Some(DITHERING_DEPTH_6_BITS),
                "8bpc" | "8-bpc" | "8" => Some(DITHERING_DEPTH_8_BITS),
                _ => None,
            },
            Attribute::FsaaMode => match token.as_str() {
                "off" | "none" => Some(FSAA_NONE),
                "2x" => Some(FSAA_2X),
                "2xq" | "quincunx" => Some(FSAA_2X_QUINCUNX),
                "4x" => Some(FSAA_4X),
                "8x" => Some(FSAA_8X),
                "8xs" => Some(FSAA_8XS),
                "8xq" => Some(FSAA_8XQ),
                "16x" => Some(FSAA_16X),
                "16xs" => Some(FSAA_16XS),
                "16xq" => Some(FSAA_16XQ),
                "32x" => Some(FSAA_32X),
                "32xs" => Some(FSAA_32XS),
                "64xs" => Some(FSAA_64XS),
                _ => None,
            },
            Attribute::StereoSwapMode => match token.as_str() {
                "application" | "application-controlled" => {
                    Some(STEREO_SWAP_APPLICATION_CONTROL)
                }
                "per-eye" => Some(STEREO_SWAP_PER_EYE),
                "per-eye-pair" => Some(STEREO_SWAP_PER_EYE_PAIR),
                _ => None,
            },
        }
    }

    /// One-line summary for listings.
    pub fn description(&self) -> &'static str {
        match self {
            Attribute::ColorSpace => "Output color encoding sent to the display",
            Attribute::ColorRange => "Full or limited quantization range",
            Attribute::Dithering => "Whether the GPU dithers the output signal",
            Attribute::DitheringMode => "Dithering algorithm",
            Attribute::DitheringDepth => "Bit depth the dithering targets",
            Attribute::FsaaMode => "Full-scene antialiasing applied to GL rendering",
            Attribute::StereoSwapMode => "When stereo eyes may swap relative to vblank",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attribute::ColorSpace => "Color Space",
            Attribute::ColorRange => "Color Range",
            Attribute::Dithering => "Dithering",
            Attribute::DitheringMode => "Dithering Mode",
            Attribute::DitheringDepth => "Dithering Depth",
            Attribute::FsaaMode => "FSAA Mode",
            Attribute::StereoSwapMode => "Stereo Swap Mode",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsaa_table_reorders_16x_and_8xs() {
        // all modes up to 64xS advertised
        let table = Attribute::FsaaMode.build_table(0xFFFF);
        assert!(table.position_of(FSAA_16X) > table.position_of(FSAA_8XS));
        assert!(table.position_of(FSAA_32XS) > table.position_of(FSAA_32X));
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn fsaa_swaps_skip_partial_masks() {
        // 16x advertised without 8xS: bit order stands
        let mask = (1 << FSAA_NONE) | (1 << FSAA_8X) | (1 << FSAA_16X);
        let table = Attribute::FsaaMode.build_table(mask);
        assert_eq!(
            table.values(),
            &[FSAA_NONE, FSAA_8X, FSAA_16X]
        );
    }

    #[test]
    fn non_fsaa_families_keep_bit_order() {
        for attr in Attribute::all() {
            if *attr != Attribute::FsaaMode {
                assert!(attr.swap_pairs().is_empty(), "{attr} has swap pairs");
            }
        }
        let table = Attribute::DitheringMode.build_table(0b1111);
        assert_eq!(table.values(), &[0, 1, 2, 3]);
    }

    #[test]
    fn fallback_table_is_single_automatic_entry() {
        for attr in Attribute::all() {
            let table = attr.fallback_table();
            assert_eq!(table.len(), 1);
            assert_eq!(table.get(0), Some(attr.automatic_value()));
        }
    }

    #[test]
    fn labels_cover_unknown_values() {
        assert_eq!(Attribute::ColorSpace.label(COLOR_SPACE_RGB), "RGB");
        assert_eq!(Attribute::FsaaMode.label(FSAA_8XS), "8x (4xSS, 2xMS)");
        assert_eq!(Attribute::ColorRange.label(77), "Unknown (77)");
    }

    #[test]
    fn value_parsing_accepts_names_and_integers() {
        assert_eq!(
            Attribute::ColorSpace.parse_value("YCbCr444"),
            Some(COLOR_SPACE_YCBCR444)
        );
        assert_eq!(Attribute::FsaaMode.parse_value("16xS"), Some(FSAA_16XS));
        assert_eq!(
            Attribute::DitheringDepth.parse_value("6 bpc"),
            Some(DITHERING_DEPTH_6_BITS)
        );
        assert_eq!(
            Attribute::DitheringDepth.parse_value("8bpc"),
            Some(DITHERING_DEPTH_8_BITS)
        );
        assert_eq!(Attribute::Dithering.parse_value("2"), Some(DITHERING_DISABLED));
        assert_eq!(Attribute::ColorRange.parse_value("noise"), None);
    }
}
