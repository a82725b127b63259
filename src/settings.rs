use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::cli::{AutoLevel, ThreadMode};
use crate::downloader::EngineConfig;

pub const APP_DIR_NAME: &str = "adl";
const SETTINGS_FILE: &str = "settings.json";

/// Persisted user preferences. Keys missing from the file take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub thread_mode: ThreadMode,
    pub custom_threads: usize,
    pub auto_level: AutoLevel,
    pub language: String,
    pub last_path: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub data_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thread_mode: ThreadMode::Auto,
            custom_threads: 16,
            auto_level: AutoLevel::High,
            language: crate::i18n::DEFAULT_LANGUAGE.to_string(),
            last_path: None,
            probe_timeout_secs: 10,
            data_timeout_secs: 20,
        }
    }
}

impl Settings {
    /// Reads settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = ?path, error = %e, "could not read settings, using defaults");
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = ?path, error = %e, "invalid settings file, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Number of connections for the next download.
    pub fn thread_count(&self, cpus: usize) -> usize {
        match self.thread_mode {
            ThreadMode::Auto => self.auto_level.thread_count(cpus),
            ThreadMode::Custom => self.custom_threads.max(1),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            probe_timeout: Duration::from_secs(self.probe_timeout_secs.max(1)),
            data_timeout: Duration::from_secs(self.data_timeout_secs.max(1)),
            ..EngineConfig::default()
        }
    }
}

impl AutoLevel {
    pub fn thread_count(self, cpus: usize) -> usize {
        let cpus = cpus.max(1);
        match self {
            AutoLevel::Low => (cpus / 2).max(1),
            AutoLevel::Medium => cpus,
            AutoLevel::High => cpus * 2,
            AutoLevel::Maximum => (cpus * 4).max(16),
        }
    }
}

/// `<config dir>/adl`, or `./.adl` when the platform has no config dir.
pub fn app_data_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR_NAME)))
}

pub fn settings_path() -> PathBuf {
    app_data_dir().join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_levels() {
        assert_eq!(AutoLevel::Low.thread_count(8), 4);
        assert_eq!(AutoLevel::Low.thread_count(1), 1);
        assert_eq!(AutoLevel::Medium.thread_count(8), 8);
        assert_eq!(AutoLevel::High.thread_count(8), 16);
        assert_eq!(AutoLevel::Maximum.thread_count(2), 16);
        assert_eq!(AutoLevel::Maximum.thread_count(8), 32);
    }

    #[test]
    fn custom_mode_has_floor_of_one() {
        let settings = Settings {
            thread_mode: ThreadMode::Custom,
            custom_threads: 0,
            ..Settings::default()
        };
        assert_eq!(settings.thread_count(8), 1);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"thread_mode": "custom", "custom_threads": 6}"#).unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.thread_mode, ThreadMode::Custom);
        assert_eq!(settings.custom_threads, 6);
        assert_eq!(settings.auto_level, AutoLevel::High);
        assert_eq!(settings.data_timeout_secs, 20);
    }

    #[test]
    fn corrupt_or_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load(&path), Settings::default());

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            language: "pt_BR".to_string(),
            last_path: Some(PathBuf::from("/tmp/downloads")),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }
}
