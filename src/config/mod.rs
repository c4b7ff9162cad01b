use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml_ng::Value;
use std::fs;
use std::io::ErrorKind;

/// File name of the settings file inside the configuration directory
pub const SETTINGS_FILE_NAME: &str = "photo-organizer.yaml";

/// Settings keys used across the application.
pub mod keys {
    pub const MAXIMIZED: &str = "maximized";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const PICTURE_SIZE: &str = "picture_size";
    pub const DISPLAY_KEY: &str = "display_key";
    pub const RECURSIVE: &str = "recursive";
    pub const LAST_DIR: &str = "last_dir";
    pub const LAST_TARGET_DIR: &str = "last_target_dir";
    pub const PREFIX: &str = "prefix";
    pub const DECIMALS: &str = "decimals";
}

/// Best-effort key/value settings persisted as YAML.
///
/// The store is owned by the controller and passed by reference to whatever
/// needs it. It is loaded once at startup and persisted at shutdown (and after
/// confirmed dialogs). Read and write failures are logged and never fatal:
/// a broken file yields the defaults, a failed write leaves the file as it was.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    /// `None` for a store that is never written to disk
    path: Option<Utf8PathBuf>,
    values: IndexMap<String, Value>,
}

impl SettingsStore {
    /// Open the settings file in `config_dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Fails only when the configuration directory cannot be created. A
    /// missing or unreadable settings file yields the defaults.
    pub fn load<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        let mut store = Self {
            path: Some(config_dir.join(SETTINGS_FILE_NAME)),
            values: Self::defaults(),
        };
        store.reload();
        Ok(store)
    }

    /// A store holding the defaults that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Self::defaults(),
        }
    }

    fn defaults() -> IndexMap<String, Value> {
        let mut values = IndexMap::new();
        values.insert(keys::MAXIMIZED.to_string(), Value::from(false));
        values.insert(keys::WIDTH.to_string(), Value::from(800));
        values.insert(keys::HEIGHT.to_string(), Value::from(600));
        values.insert(keys::PICTURE_SIZE.to_string(), Value::from(100));
        values
    }

    /// Re-read the settings file, falling back to the defaults on any failure.
    pub fn reload(&mut self) {
        let Some(path) = self.path.clone() else {
            return;
        };

        self.values = Self::defaults();
        match Self::read_file(&path) {
            Ok(Some(loaded)) => {
                tracing::info!("Loaded settings from {}", path);
                self.values.extend(loaded);
            }
            Ok(None) => {
                tracing::info!("Settings file not found at {}, using defaults", path);
            }
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {:#}", e);
            }
        }
    }

    fn read_file(path: &Utf8Path) -> Result<Option<IndexMap<String, Value>>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read settings: {}", path));
            }
        };

        if contents.trim().is_empty() {
            return Ok(Some(IndexMap::new()));
        }

        let values = serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Failed to parse settings: {}", path))?;
        Ok(Some(values))
    }

    /// The value stored under `key`, or `default` when it is missing or has
    /// the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        if value.is_null() {
            return None;
        }
        match serde_yaml_ng::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Ignoring setting '{}' with unexpected value: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        match serde_yaml_ng::to_value(value) {
            Ok(value) => {
                self.values.insert(key.to_string(), value);
            }
            Err(e) => tracing::warn!("Cannot store setting '{}': {}", key, e),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.shift_remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Write the settings file, logging instead of failing.
    ///
    /// Returns whether the write succeeded.
    pub fn persist(&self) -> bool {
        match self.try_persist() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save settings: {:#}", e);
                false
            }
        }
    }

    /// Write the settings file.
    pub fn try_persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let yaml_string =
            serde_yaml_ng::to_string(&self.values).context("Failed to serialize settings to YAML")?;

        fs::write(path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", path))?;

        tracing::info!("Saved settings to {}", path);
        Ok(())
    }

    /// Path of the settings file, if the store is file backed.
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
