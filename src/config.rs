use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::session::{Settings, Source, DEFAULT_HIGHLIGHT_COLOR};

pub const MIN_WORDS_PER_MINUTE: u32 = 50;
pub const MAX_WORDS_PER_MINUTE: u32 = 1000;
pub const MAX_GROUP_SIZE: usize = 20;

/// Named pacing bundles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Preset {
    Comprehend,
    Focus,
    Blitz,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Comprehend, Preset::Focus, Preset::Blitz];

    pub fn words_per_minute(self) -> u32 {
        match self {
            Preset::Comprehend => 150,
            Preset::Focus => 250,
            Preset::Blitz => 400,
        }
    }

    pub fn group_size(self) -> usize {
        match self {
            Preset::Comprehend => 4,
            Preset::Focus => 6,
            Preset::Blitz => 10,
        }
    }
}

/// Persisted reader preferences. Field names match the browser extension's
/// stored settings, and keys missing from the file keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub active_mode: Source,
    pub active_preset: Option<Preset>,
    pub wpm: u32,
    pub group_size: usize,
    pub highlight_color: String,
}

impl Default for Config {
    fn default() -> Self {
        let preset = Preset::Focus;
        Self {
            active_mode: Source::OnPage,
            active_preset: Some(preset),
            wpm: preset.words_per_minute(),
            group_size: preset.group_size(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
        }
    }
}

impl Config {
    /// Session settings for the stored values; zero or blank values fall
    /// back to the session defaults.
    pub fn settings(&self) -> Settings {
        let defaults = Settings::default();
        let color = self.highlight_color.trim();
        Settings {
            color: if color.is_empty() {
                defaults.color
            } else {
                color.to_string()
            },
            group_size: NonZeroUsize::new(self.group_size).unwrap_or(defaults.group_size),
            words_per_minute: NonZeroU32::new(self.wpm).unwrap_or(defaults.words_per_minute),
        }
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.active_preset = Some(preset);
        self.wpm = preset.words_per_minute();
        self.group_size = preset.group_size();
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "flashread") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("flashread_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(err) => debug!(path = %self.path.display(), %err, "ignoring unreadable config"),
            },
            Err(err) => debug!(path = %self.path.display(), %err, "no stored config"),
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

/// Keeps the config in memory only.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    saved: std::cell::RefCell<Option<Config>>,
}

impl MemoryConfigStore {
    pub fn new(initial: Config) -> Self {
        Self {
            saved: std::cell::RefCell::new(Some(initial)),
        }
    }

    pub fn saved(&self) -> Option<Config> {
        self.saved.borrow().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Config {
        self.saved().unwrap_or_default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        *self.saved.borrow_mut() = Some(cfg.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            active_mode: Source::Pasted,
            active_preset: None,
            wpm: 420,
            group_size: 3,
            highlight_color: "tomato".into(),
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn reads_extension_settings_and_fills_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"activeMode":"pastedText","activePreset":"blitz","wpm":400,"theme":"dark"}"#,
        )
        .unwrap();
        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.active_mode, Source::Pasted);
        assert_eq!(loaded.active_preset, Some(Preset::Blitz));
        assert_eq!(loaded.wpm, 400);
        assert_eq!(loaded.group_size, Config::default().group_size);
        assert_eq!(loaded.highlight_color, "#add8e6");
    }

    #[test]
    fn garbage_or_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
        fs::write(&path, "{not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn zero_values_resolve_to_session_defaults() {
        let cfg = Config {
            wpm: 0,
            group_size: 0,
            highlight_color: " ".into(),
            ..Config::default()
        };
        assert_eq!(cfg.settings(), Settings::default());
    }

    #[test]
    fn presets_set_pace_and_size() {
        let mut cfg = Config::default();
        cfg.apply_preset(Preset::Comprehend);
        assert_eq!((cfg.wpm, cfg.group_size), (150, 4));
        cfg.apply_preset(Preset::Blitz);
        assert_eq!((cfg.wpm, cfg.group_size), (400, 10));
        assert_eq!(cfg.active_preset, Some(Preset::Blitz));
        assert_eq!(Preset::Focus.to_string(), "focus");
    }
}
