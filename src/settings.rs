//! Saved option profiles
//!
//! Snapshot the selected option values across displays into a named TOML
//! profile and re-apply them later. Application revalidates every value
//! against a freshly probed table, so a profile written against one monitor
//! never forces stale values onto another.

use crate::attributes::Attribute;
use crate::backend::AttributeBackend;
use crate::control::AttributeControl;
use crate::{NvOptionsError, NvResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionProfile {
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub settings: Vec<SavedSetting>,
}

/// One saved (display, attribute, value) triple. Displays are stored by
/// name because backend indices shuffle across replugs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSetting {
    pub display: String,
    pub attribute: Attribute,
    pub value: u32,
    /// What the value meant when saved, for humans reading the file.
    pub label: String,
}

pub struct SettingsStore {
    profiles_dir: PathBuf,
}

impl SettingsStore {
    pub fn new() -> NvResult<Self> {
        let profiles_dir = directories::ProjectDirs::from("com", "ghostkellz", "nvoptions")
            .ok_or_else(|| {
                NvOptionsError::ProfileError("could not resolve config directory".to_string())
            })?
            .config_dir()
            .join("profiles");
        Self::at(&profiles_dir)
    }

    /// Store rooted somewhere else, for tests and sandboxed runs.
    pub fn at(dir: &Path) -> NvResult<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            NvOptionsError::ProfileError(format!("failed to create profiles directory: {e}"))
        })?;
        Ok(SettingsStore {
            profiles_dir: dir.to_path_buf(),
        })
    }

    /// Snapshot the current value of every supported attribute on every
    /// display into a named profile and write it out.
    pub fn capture(&self, name: &str, backend: &dyn AttributeBackend) -> NvResult<OptionProfile> {
        let mut settings = Vec::new();
        for display in backend.list_displays()? {
            for attribute in Attribute::all() {
                let control = AttributeControl::probe(backend, display.id, *attribute)?;
                if !control.is_supported() {
                    continue;
                }
                let Ok(value) = backend.current_value(display.id, *attribute) else {
                    continue;
                };
                settings.push(SavedSetting {
                    display: display.name.clone(),
                    attribute: *attribute,
                    value,
                    label: attribute.label(value),
                });
            }
        }

        let profile = OptionProfile {
            name: name.to_string(),
            created_at: chrono::Utc::now(),
            settings,
        };
        self.save(&profile)?;
        Ok(profile)
    }

    /// Re-apply a profile. Returns the settings that could not be applied,
    /// one line each; a missing display or a value outside the current
    /// valid set skips that entry rather than failing the run.
    pub fn apply(&self, name: &str, backend: &dyn AttributeBackend) -> NvResult<Vec<String>> {
        let profile = self.load(name)?;
        let displays = backend.list_displays()?;
        let mut skipped = Vec::new();

        for setting in &profile.settings {
            let Some(display) = displays.iter().find(|d| d.name == setting.display) else {
                skipped.push(format!("{}: display not present", setting.display));
                continue;
            };
            let control = AttributeControl::probe(backend, display.id, setting.attribute)?;
            if let Err(e) = control.select_value(backend, setting.value) {
                skipped.push(format!(
                    "{} on {}: {e}",
                    setting.attribute, setting.display
                ));
            }
        }

        Ok(skipped)
    }

    pub fn save(&self, profile: &OptionProfile) -> NvResult<PathBuf> {
        let path = self.profile_path(&profile.name);
        let content = toml::to_string_pretty(profile).map_err(|e| {
            NvOptionsError::ProfileError(format!("failed to serialize profile: {e}"))
        })?;
        fs::write(&path, content)
            .map_err(|e| NvOptionsError::ProfileError(format!("failed to write profile: {e}")))?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> NvResult<OptionProfile> {
        let path = self.profile_path(name);
        let content = fs::read_to_string(&path).map_err(|e| {
            NvOptionsError::ProfileError(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| NvOptionsError::ProfileError(format!("failed to parse profile: {e}")))
    }

    pub fn list(&self) -> Vec<String> {
        if !self.profiles_dir.exists() {
            return Vec::new();
        }
        let Ok(entries) = fs::read_dir(&self.profiles_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension()? == "toml" {
                    path.file_stem()?.to_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }

    pub fn delete(&self, name: &str) -> NvResult<()> {
        let path = self.profile_path(name);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                NvOptionsError::ProfileError(format!("failed to delete profile: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir
            .join(format!("{}.toml", sanitize_filename(name)))
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAttributeBackend;

    fn scratch_store(tag: &str) -> SettingsStore {
        let dir = std::env::temp_dir().join(format!("nvoptions-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        SettingsStore::at(&dir).unwrap()
    }

    #[test]
    fn save_load_round_trip() {
        let store = scratch_store("roundtrip");
        let profile = OptionProfile {
            name: "evening".to_string(),
            created_at: chrono::Utc::now(),
            settings: vec![SavedSetting {
                display: "DP-0".to_string(),
                attribute: Attribute::ColorRange,
                value: 1,
                label: "Limited".to_string(),
            }],
        };

        store.save(&profile).unwrap();
        let loaded = store.load("evening").unwrap();
        assert_eq!(loaded.name, "evening");
        assert_eq!(loaded.settings.len(), 1);
        assert_eq!(loaded.settings[0].attribute, Attribute::ColorRange);
        assert_eq!(loaded.settings[0].value, 1);
        assert_eq!(store.list(), vec!["evening".to_string()]);

        store.delete("evening").unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn capture_covers_supported_attributes_only() {
        let store = scratch_store("capture");
        // DVI-0 exists but exposes no attribute state
        let backend = MockAttributeBackend::single_display().with_display(3, "DVI-0", "DVI");

        let profile = store.capture("snapshot", &backend).unwrap();
        assert_eq!(profile.settings.len(), Attribute::all().len());
        assert!(profile.settings.iter().all(|s| s.display == "DP-0"));

        store.delete("snapshot").unwrap();
    }

    #[test]
    fn apply_revalidates_and_reports_skips() {
        let store = scratch_store("apply");
        let backend = MockAttributeBackend::single_display();
        let profile = OptionProfile {
            name: "mixed".to_string(),
            created_at: chrono::Utc::now(),
            settings: vec![
                SavedSetting {
                    display: "DP-0".to_string(),
                    attribute: Attribute::ColorSpace,
                    value: 2,
                    label: "YCbCr444".to_string(),
                },
                // 1.5 x 1.5 is never in the typical mask
                SavedSetting {
                    display: "DP-0".to_string(),
                    attribute: Attribute::FsaaMode,
                    value: 3,
                    label: "1.5 x 1.5".to_string(),
                },
                SavedSetting {
                    display: "HDMI-9".to_string(),
                    attribute: Attribute::Dithering,
                    value: 1,
                    label: "Enabled".to_string(),
                },
            ],
        };
        store.save(&profile).unwrap();

        let skipped = store.apply("mixed", &backend).unwrap();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().any(|s| s.contains("HDMI-9")));

        let calls = backend.set_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].attribute, Attribute::ColorSpace);
        assert_eq!(calls[0].value, 2);

        store.delete("mixed").unwrap();
    }
}
