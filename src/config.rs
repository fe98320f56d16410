use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application settings persisted as `settings.json` in the data directory.
///
/// The data directory itself is never serialized; it is re-derived on every
/// load so a settings file can be copied between machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Root of the character package to drive. Defaults to `<data_dir>/character`.
    #[serde(default)]
    pub character_dir: Option<PathBuf>,
    /// Display name substituted for `{{user}}` in rendered instructions.
    #[serde(default)]
    pub username: Option<String>,
}

impl Settings {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("kizuna")
        });

        // Ensure data directory exists
        std::fs::create_dir_all(&data_dir)
            .context("Failed to create data directory")?;

        let settings_path = data_dir.join("settings.json");

        // Try to load existing settings
        if settings_path.exists() {
            let settings_str = std::fs::read_to_string(&settings_path)
                .context("Failed to read settings.json")?;

            if settings_str.trim().is_empty() {
                eprintln!("Settings file is empty, recreating defaults");
            } else {
                let mut settings: Settings = serde_json::from_str(&settings_str)
                    .context("Failed to parse settings.json")?;
                settings.data_dir = data_dir;
                return Ok(settings);
            }
        }

        // Create default settings
        let settings = Settings {
            data_dir,
            character_dir: None,
            username: None,
        };
        settings.save()?;

        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let settings_path = self.data_dir.join("settings.json");
        let json_str = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings")?;
        std::fs::write(&settings_path, json_str)
            .context("Failed to write settings.json")?;
        Ok(())
    }

    /// Directory holding the character package (name, bond files, catalogs).
    pub fn character_root(&self) -> PathBuf {
        self.character_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("character"))
    }
}
