//! User settings persisted as YAML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub clipboard: ClipboardSettings,
    pub hook_window: HookWindowSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardSettings {
    /// How long opening the clipboard keeps retrying.
    pub open_timeout_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for ClipboardSettings {
    fn default() -> Self {
        Self {
            open_timeout_ms: 500,
            retry_interval_ms: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookWindowSettings {
    /// Window class registered for the hidden hook window.
    pub class_name: String,
}

impl Default for HookWindowSettings {
    fn default() -> Self {
        Self {
            class_name: "DeskprimHookWindow".to_string(),
        }
    }
}

/// Get the config directory for deskprim.
pub fn config_dir() -> PathBuf {
    let base = dirs_next::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("deskprim")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.yaml")
}

/// Load settings from the default location.
pub fn load_settings() -> ConfigResult<Settings> {
    load_settings_from(&settings_path())
}

/// Load settings from the default location, falling back to the defaults
/// (with a warning) if the file cannot be read.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|error| {
        warn!(path = ?settings_path(), %error, "Ignoring unreadable settings file");
        Settings::default()
    })
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings_from(path: &Path) -> ConfigResult<Settings> {
    if !path.exists() {
        debug!(?path, "No settings file, using defaults");
        return Ok(Settings::default());
    }
    let yaml = fs::read_to_string(path)?;
    let settings = serde_yaml::from_str(&yaml)?;
    debug!(?path, "Loaded settings");
    Ok(settings)
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(settings)?)?;
    info!(?path, "Saved settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.clipboard.open_timeout_ms, 500);
        assert_eq!(settings.hook_window.class_name, "DeskprimHookWindow");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "clipboard:\n  open_timeout_ms: 1500\n").unwrap();
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.clipboard.open_timeout_ms, 1500);
        assert_eq!(settings.clipboard.retry_interval_ms, 20);
        assert_eq!(settings.hook_window, HookWindowSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        let mut settings = Settings::default();
        settings.hook_window.class_name = "ProbeWindow".into();
        save_settings_to(&settings, &path).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "clipboard: [not, a, map]\n").unwrap();
        assert!(matches!(load_settings_from(&path), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_config_dir_is_namespaced() {
        assert!(settings_path().ends_with("deskprim/settings.yaml"));
    }
}
