//! Session configuration.
//!
//! ## Learning: Injected Configuration
//!
//! The session never reads global settings. A `SessionConfig` is built by
//! the host (usually with `SessionConfig::load()`) and handed to the
//! controller at construction. `#[serde(default)]` on every section keeps
//! older config files loading after new fields are added.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use neoscribe_tabs::DEFAULT_MAX_TABS;

/// Main session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Tab and timing settings
    pub session: SessionSettings,

    /// Large-selection export thresholds
    pub export: ExportConfig,

    /// User preferences used when no preference store has any
    pub preferences: Preferences,

    /// App theme -> embedded editor theme
    pub editor_themes: HashMap<String, String>,
}

impl SessionConfig {
    /// Loads config from the default location.
    pub fn load() -> Self {
        Self::load_from_default_path().unwrap_or_default()
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("neoscribe").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Editor theme for the given preferences.
    ///
    /// An explicit `editor_theme` wins, then the mapping table, then
    /// `pure_teal`.
    pub fn editor_theme_for(&self, preferences: &Preferences) -> String {
        preferences
            .editor_theme
            .clone()
            .or_else(|| self.editor_themes.get(&preferences.theme).cloned())
            .unwrap_or_else(|| "pure_teal".to_string())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let editor_themes = [
            ("Teal", "teal_dark"),
            ("Rainbow", "dark_rainbow"),
            ("Pure Teal", "pure_teal"),
            ("Paper Teal", "paper_teal"),
            ("Paper", "eclipse"),
            ("Forest", "obsidian"),
            ("Charcoal Ember", "monokai"),
        ]
        .into_iter()
        .map(|(app, editor)| (app.to_string(), editor.to_string()))
        .collect();

        Self {
            session: SessionSettings::default(),
            export: ExportConfig::default(),
            preferences: Preferences::default(),
            editor_themes,
        }
    }
}

/// Tab and timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of open tabs
    pub max_tabs: usize,

    /// How long echoes of a programmatic clear are ignored (ms)
    pub clearing_latch_ms: u64,

    /// How long a surface stays hidden during a layout pulse (ms)
    pub pulse_frame_ms: u64,

    /// Restore scroll line and selection after the first load
    pub restore_on_load: bool,
}

impl SessionSettings {
    pub fn clearing_latch(&self) -> Duration {
        Duration::from_millis(self.clearing_latch_ms)
    }

    pub fn pulse_frame(&self) -> Duration {
        Duration::from_millis(self.pulse_frame_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_tabs: DEFAULT_MAX_TABS,
            clearing_latch_ms: 300,
            pulse_frame_ms: 16,
            restore_on_load: true,
        }
    }
}

/// Large-selection export thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Above this many lines the engine writes the selection to a file
    pub native_line_threshold: usize,

    /// Worst-case bytes per character used for size estimates
    pub bytes_per_char: u64,

    /// Above this many estimated bytes the user is asked first
    pub prompt_bytes: u64,

    /// Above this many estimated bytes the text always goes to a new tab
    pub save_as_tab_bytes: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            native_line_threshold: 2000,
            bytes_per_char: 3,
            prompt_bytes: 800 * 1024,
            save_as_tab_bytes: 4 * 1024 * 1024,
        }
    }
}

/// User preferences persisted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// App theme id
    pub theme: String,

    /// UI language code
    pub language: String,

    /// Explicit embedded editor theme (overrides the mapping)
    pub editor_theme: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "Pure Teal".to_string(),
            language: "en".to_string(),
            editor_theme: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.session.max_tabs, 10);
        assert_eq!(config.session.clearing_latch(), Duration::from_millis(300));
        assert_eq!(config.export.native_line_threshold, 2000);
        assert_eq!(config.export.save_as_tab_bytes, 4_194_304);
    }

    #[test]
    fn test_config_serialization() {
        let config = SessionConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: SessionConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.session.pulse_frame_ms, config.session.pulse_frame_ms);
        assert_eq!(parsed.editor_themes.len(), config.editor_themes.len());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: SessionConfig = toml::from_str("[session]\nclearing_latch_ms = 450\n").unwrap();
        assert_eq!(parsed.session.clearing_latch_ms, 450);
        assert_eq!(parsed.session.max_tabs, 10);
        assert_eq!(parsed.export.prompt_bytes, 800 * 1024);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SessionConfig::default();
        config.preferences.theme = "Forest".to_string();
        config.save_to(&path).unwrap();

        let loaded = SessionConfig::load_from(&path).unwrap();
        assert_eq!(loaded.preferences.theme, "Forest");
    }

    #[test]
    fn test_editor_theme_resolution() {
        let config = SessionConfig::default();
        let mut prefs = Preferences {
            theme: "Forest".to_string(),
            ..Preferences::default()
        };
        assert_eq!(config.editor_theme_for(&prefs), "obsidian");

        prefs.theme = "Unknown".to_string();
        assert_eq!(config.editor_theme_for(&prefs), "pure_teal");

        prefs.editor_theme = Some("monokai".to_string());
        assert_eq!(config.editor_theme_for(&prefs), "monokai");
    }
}
