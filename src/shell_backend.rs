//! nvidia-settings attribute backend
//!
//! Drives NV-CONTROL through the nvidia-settings binary for setups the NVKMS
//! path cannot serve: the closed kernel module, and the X-screen attributes
//! (FSAA, stereo swap) that only the X driver carries. Values are assigned
//! with `-a` and read back with terse `-q -t` queries; valid-value sets only
//! appear in the human query output, so those lines get parsed.

use crate::attributes::Attribute;
use crate::backend::{range_to_mask, AttributeBackend, DisplayHandle};
use crate::{NvOptionsError, NvResult};
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;

/// Attribute backend shelling out to nvidia-settings.
///
/// Displays are the connected xrandr outputs, addressed by enumeration
/// index; the output name doubles as the NV-CONTROL dpy name.
pub struct ShellBackend {
    binary: PathBuf,
    displays: Vec<DisplayHandle>,
    /// Explicit X display for -c, for runs outside the session (cron, TTY).
    ctrl_display: Option<String>,
}

impl ShellBackend {
    pub fn new() -> NvResult<Self> {
        let binary = which::which("nvidia-settings").map_err(|_| {
            NvOptionsError::BackendUnavailable("nvidia-settings not found in PATH".to_string())
        })?;
        let displays = detect_displays()?;
        Ok(ShellBackend {
            binary,
            displays,
            ctrl_display: None,
        })
    }

    pub fn with_ctrl_display(mut self, display: &str) -> Self {
        self.ctrl_display = Some(display.to_string());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(ctrl) = &self.ctrl_display {
            cmd.args(["-c", ctrl]);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> NvResult<std::process::Output> {
        self.command().args(args).output().map_err(|e| {
            NvOptionsError::BackendUnavailable(format!("nvidia-settings failed to run: {e}"))
        })
    }

    fn display_name(&self, display: u32) -> NvResult<&str> {
        self.displays
            .get(display as usize)
            .map(|d| d.name.as_str())
            .ok_or_else(|| {
                NvOptionsError::DisplayDetectionFailed(format!(
                    "no connected output with index {display}"
                ))
            })
    }

    /// NV-CONTROL query/assign target. Dpy attributes get a [dpy:] prefix,
    /// X-screen attributes go bare and land on the default screen.
    fn target(&self, display: u32, attribute: Attribute) -> NvResult<String> {
        let name = nvctrl_name(attribute);
        if screen_scoped(attribute) {
            Ok(name.to_string())
        } else {
            Ok(format!("[dpy:{}]/{name}", self.display_name(display)?))
        }
    }
}

impl AttributeBackend for ShellBackend {
    fn list_displays(&self) -> NvResult<Vec<DisplayHandle>> {
        Ok(self.displays.clone())
    }

    fn valid_values(&self, display: u32, attribute: Attribute) -> NvResult<u32> {
        let target = self.target(display, attribute)?;
        let output = self.run(&["-q", &target])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stderr.contains("Unknown attribute") {
            return Err(NvOptionsError::Unsupported(format!(
                "{attribute} is unknown to this driver"
            )));
        }
        if !output.status.success() {
            return Err(NvOptionsError::AttributeQueryFailed(format!(
                "nvidia-settings -q {target}: {}",
                stderr.trim()
            )));
        }

        parse_valid_values(&stdout).ok_or_else(|| {
            NvOptionsError::AttributeQueryFailed(format!(
                "no valid-values line in nvidia-settings output for {target}"
            ))
        })
    }

    fn current_value(&self, display: u32, attribute: Attribute) -> NvResult<u32> {
        let target = self.target(display, attribute)?;
        let output = self.run(&["-q", &target, "-t"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stderr.contains("Unknown attribute") {
            return Err(NvOptionsError::Unsupported(format!(
                "{attribute} is unknown to this driver"
            )));
        }

        let value = stdout
            .lines()
            .find_map(|line| line.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                NvOptionsError::AttributeQueryFailed(format!(
                    "nvidia-settings -q {target} -t returned no value: {}",
                    stderr.trim()
                ))
            })?;

        u32::try_from(value).map_err(|_| {
            NvOptionsError::AttributeQueryFailed(format!(
                "{attribute} reported {value}, outside the option value domain"
            ))
        })
    }

    fn set_value(&self, display: u32, attribute: Attribute, value: u32) -> NvResult<()> {
        let target = self.target(display, attribute)?;
        let assignment = format!("{target}={value}");
        let output = self.run(&["-a", &assignment])?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        // nvidia-settings exits zero on some assignment errors, so the
        // stderr check matters
        if !output.status.success() || stderr.contains("ERROR") {
            return Err(NvOptionsError::AttributeSetFailed(format!(
                "nvidia-settings -a {assignment}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.displays.is_empty()
    }
}

/// NV-CONTROL attribute names as nvidia-settings spells them.
fn nvctrl_name(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::ColorSpace => "ColorSpace",
        Attribute::ColorRange => "ColorRange",
        Attribute::Dithering => "Dithering",
        Attribute::DitheringMode => "DitheringMode",
        Attribute::DitheringDepth => "DitheringDepth",
        Attribute::FsaaMode => "FSAA",
        Attribute::StereoSwapMode => "StereoSwapMode",
    }
}

/// FSAA and stereo swap live on the X screen, everything else on the dpy.
fn screen_scoped(attribute: Attribute) -> bool {
    matches!(attribute, Attribute::FsaaMode | Attribute::StereoSwapMode)
}

/// Extract a valid-values mask from human query output. Integer-bits
/// attributes list their values, range attributes name the bounds (two
/// phrasings in the wild), booleans get called out as such.
fn parse_valid_values(output: &str) -> Option<u32> {
    let list = Regex::new(r"Valid values for '[^']+' are: ([^.]+)\.").unwrap();
    if let Some(caps) = list.captures(output) {
        let mut mask = 0u32;
        for token in caps[1].replace(" and ", ", ").split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let value: u32 = token.parse().ok()?;
            if value >= u32::BITS {
                return None;
            }
            mask |= 1 << value;
        }
        return Some(mask);
    }

    let range_forms = [
        Regex::new(r"in the range (-?\d+) - (-?\d+)").unwrap(),
        Regex::new(r"in the range \[(-?\d+), (-?\d+)\]").unwrap(),
    ];
    for form in &range_forms {
        if let Some(caps) = form.captures(output) {
            let min: i64 = caps[1].parse().ok()?;
            let max: i64 = caps[2].parse().ok()?;
            return range_to_mask(min, max);
        }
    }

    if output.contains("is a boolean attribute") {
        return Some(0b11);
    }

    None
}

fn detect_displays() -> NvResult<Vec<DisplayHandle>> {
    let output = Command::new("xrandr")
        .arg("--query")
        .output()
        .map_err(|e| NvOptionsError::DisplayDetectionFailed(format!("xrandr failed: {e}")))?;

    if !output.status.success() {
        return Err(NvOptionsError::DisplayDetectionFailed(
            "xrandr returned an error; is an X session running?".to_string(),
        ));
    }

    Ok(parse_connected_outputs(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

fn parse_connected_outputs(xrandr: &str) -> Vec<DisplayHandle> {
    let mut displays = Vec::new();
    for line in xrandr.lines() {
        if !line.contains(" connected") {
            continue;
        }
        if let Some(name) = line.split_whitespace().next() {
            displays.push(DisplayHandle {
                id: displays.len() as u32,
                name: name.to_string(),
                kind: connector_kind(name).to_string(),
            });
        }
    }
    displays
}

fn connector_kind(name: &str) -> &'static str {
    match name.split('-').next().unwrap_or("") {
        "DP" => "DP",
        "HDMI" => "HDMI",
        "DVI" => "DVI",
        "eDP" => "eDP",
        "VGA" => "VGA",
        "LVDS" => "LVDS",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_bits_value_list() {
        assert_eq!(
            parse_valid_values(MOCK_FSAA_QUERY_OUTPUT),
            Some((1 << 0) | (1 << 1) | (1 << 5) | (1 << 7) | (1 << 9))
        );
    }

    #[test]
    fn parses_single_valid_value() {
        let output = "  Valid values for 'StereoSwapMode' are: 0.\n";
        assert_eq!(parse_valid_values(output), Some(0b1));
    }

    #[test]
    fn parses_range_phrasings() {
        let inclusive =
            "    The valid values for 'Dithering' are in the range 0 - 2 (inclusive).\n";
        assert_eq!(parse_valid_values(inclusive), Some(0b111));

        let bracketed = "  Valid values for 'Dithering' are integers in the range [0, 2].\n";
        assert_eq!(parse_valid_values(bracketed), Some(0b111));
    }

    #[test]
    fn range_outside_mask_domain_is_rejected() {
        let vibrance =
            "  Valid values for 'DigitalVibrance' are integers in the range [-1024, 1023].\n";
        assert_eq!(parse_valid_values(vibrance), None);
    }

    #[test]
    fn boolean_attributes_yield_two_entry_mask() {
        let output =
            "  'ForceStereoFlipping' is a boolean attribute; valid values are: 1 (on/true) and 0 (off/false).\n";
        assert_eq!(parse_valid_values(output), Some(0b11));
    }

    #[test]
    fn connected_outputs_become_display_handles() {
        let displays = parse_connected_outputs(MOCK_XRANDR_OUTPUT);
        assert_eq!(displays.len(), 2);
        assert_eq!(displays[0].name, "DP-0");
        assert_eq!(displays[0].kind, "DP");
        assert_eq!(displays[1].name, "DVI-D-1");
        assert_eq!(displays[1].kind, "DVI");
        assert_eq!(displays[1].id, 1);
    }

    #[test]
    fn screen_attributes_skip_dpy_targeting() {
        assert!(screen_scoped(Attribute::FsaaMode));
        assert!(screen_scoped(Attribute::StereoSwapMode));
        assert!(!screen_scoped(Attribute::ColorSpace));
    }

    #[test]
    fn ctrl_display_is_passed_before_other_args() {
        let backend = ShellBackend {
            binary: PathBuf::from("nvidia-settings"),
            displays: Vec::new(),
            ctrl_display: None,
        }
        .with_ctrl_display(":0");

        let cmd = backend.command();
        let args: Vec<&str> = cmd.get_args().filter_map(|a| a.to_str()).collect();
        assert_eq!(args, ["-c", ":0"]);
    }

    // Mock output constants
    const MOCK_XRANDR_OUTPUT: &str = r#"Screen 0: minimum 8 x 8, current 2560 x 1440, maximum 32767 x 32767
DP-0 connected primary 2560x1440+0+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440     59.95*+ 143.91   119.88
   1920x1080    119.88    60.00
DVI-D-1 connected 1920x1080+2560+0 (normal left inverted right x axis y axis) 531mm x 298mm
   1920x1080     60.00*+
HDMI-0 disconnected (normal left inverted right x axis y axis)
"#;

    const MOCK_FSAA_QUERY_OUTPUT: &str = r#"
  Attribute 'FSAA' (ghost:0.0): 0.
    Valid values for 'FSAA' are: 0, 1, 5, 7 and 9.
    'FSAA' can use the following target types: X Screen, GPU.
"#;
}
