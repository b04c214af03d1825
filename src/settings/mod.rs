//! Settings module - user preferences stored as one JSON document

mod feedback;

pub use feedback::{COMPLETION_PATTERN, Feedback, Sound, SoundAssets, TerminalFeedback};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::db::Database;

pub const KEY_SETTINGS: &str = "fitness-app-settings";

/// Defaults used when creating exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkoutDefaults {
    pub exercise_time: u32, // seconds per set
    pub rest_time: u32,     // seconds between sets
}

impl Default for WorkoutDefaults {
    fn default() -> Self {
        Self {
            exercise_time: 40,
            rest_time: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub default_settings: WorkoutDefaults,
    pub theme_color: String,
    pub is_dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            vibration_enabled: true,
            default_settings: WorkoutDefaults::default(),
            theme_color: "#1989fa".to_string(),
            is_dark_mode: false,
        }
    }
}

impl Settings {
    /// Load settings; missing or unreadable data yields defaults
    pub fn load(db: &Database) -> Self {
        let raw = match db.get_item(KEY_SETTINGS) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No saved settings, using defaults");
                return Self::default();
            }
            Err(e) => {
                error!("Failed to read settings: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) if parse_hex_color(&settings.theme_color).is_some() => settings,
            Ok(settings) => {
                error!("Ignoring invalid theme color '{}'", settings.theme_color);
                Self {
                    theme_color: Self::default().theme_color,
                    ..settings
                }
            }
            Err(e) => {
                error!("Failed to parse settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, db: &Database) -> Result<()> {
        db.set_item(KEY_SETTINGS, &serde_json::to_string(self)?)?;
        debug!("Saved settings");
        Ok(())
    }

    /// Set the theme color, accepting only `#rrggbb`
    pub fn set_theme_color(&mut self, color: &str) -> Result<()> {
        if parse_hex_color(color).is_none() {
            bail!("theme color must look like #rrggbb, got '{}'", color);
        }
        self.theme_color = color.to_lowercase();
        Ok(())
    }

    /// Theme color as RGB
    pub fn theme_rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.theme_color).unwrap_or((0x19, 0x89, 0xfa))
    }
}

/// Parse `#rrggbb`
pub fn parse_hex_color(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_saved_data() {
        let db = Database::open_in_memory().unwrap();
        let settings = Settings::load(&db);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_settings.exercise_time, 40);
        assert_eq!(settings.default_settings.rest_time, 30);
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = Settings::default();
        settings.sound_enabled = false;
        settings.is_dark_mode = true;
        settings.default_settings.rest_time = 45;
        settings.set_theme_color("#FF8800").unwrap();
        settings.save(&db).unwrap();

        let loaded = Settings::load(&db);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.theme_color, "#ff8800");
    }

    #[test]
    fn test_stored_shape() {
        let db = Database::open_in_memory().unwrap();
        Settings::default().save(&db).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&db.get_item(KEY_SETTINGS).unwrap().unwrap()).unwrap();
        assert_eq!(value["soundEnabled"], true);
        assert_eq!(value["defaultSettings"]["exerciseTime"], 40);
        assert_eq!(value["themeColor"], "#1989fa");
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.set_item(KEY_SETTINGS, r#"{"soundEnabled": false, "defaultSettings": {"restTime": 10}}"#)
            .unwrap();
        let settings = Settings::load(&db);
        assert!(!settings.sound_enabled);
        assert!(settings.vibration_enabled);
        assert_eq!(settings.default_settings.rest_time, 10);
        assert_eq!(settings.default_settings.exercise_time, 40);
    }

    #[test]
    fn test_corrupt_settings_use_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.set_item(KEY_SETTINGS, "{{{").unwrap();
        assert_eq!(Settings::load(&db), Settings::default());

        db.set_item(KEY_SETTINGS, r#"{"themeColor": "blue"}"#).unwrap();
        assert_eq!(Settings::load(&db).theme_color, "#1989fa");
    }

    #[test]
    fn test_theme_color_validation() {
        let mut settings = Settings::default();
        assert!(settings.set_theme_color("red").is_err());
        assert!(settings.set_theme_color("#12345").is_err());
        assert!(settings.set_theme_color("#gg0000").is_err());
        assert_eq!(parse_hex_color("#1989fa"), Some((0x19, 0x89, 0xfa)));
        assert_eq!(settings.theme_rgb(), (0x19, 0x89, 0xfa));
    }
}
