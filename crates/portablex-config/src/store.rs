use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::value::{parse_bool, parse_list, parse_records, FolderEntry, SettingValue};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings store has no backing file")]
    NoBackingFile,
}

/// One section's keys in the order they were first written.
pub type Section = IndexMap<String, String>;

type Sections = IndexMap<String, Section>;

/// Outcome of a write. The in-memory copy is updated either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Persisted,
    MemoryOnly(String),
}

impl WriteStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, WriteStatus::Persisted)
    }
}

/// Persistent `section -> key -> value` store.
///
/// Reads never fail: a missing or unparseable file yields an empty store.
/// Every write rewrites the whole file. Write failures are logged and
/// reported through [`WriteStatus`], and the in-memory copy stays
/// authoritative for the rest of the process.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    data: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    sections: Sections,
    /// Set when the file on disk could not be parsed; it is copied aside
    /// before the first rewrite.
    corrupt_on_disk: bool,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = read_state(&path);
        Self {
            path: Some(path),
            data: RwLock::new(state),
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(StoreState::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.data
            .read()
            .sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    pub fn has_option(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    /// Typed read: the result has the same variant as `default`.
    pub fn get_value(&self, section: &str, key: &str, default: SettingValue) -> SettingValue {
        let raw = self.get(section, key);
        SettingValue::decode_like(raw.as_deref(), default)
    }

    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get(section, key)
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(default)
    }

    pub fn get_float(&self, section: &str, key: &str, default: f64) -> f64 {
        self.get(section, key)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get(section, key)
            .map(|raw| parse_list(&raw))
            .unwrap_or_default()
    }

    pub fn get_records(&self, section: &str, key: &str) -> Vec<FolderEntry> {
        self.get(section, key)
            .map(|raw| parse_records(&raw))
            .unwrap_or_default()
    }

    /// Snapshot of one section, empty when absent.
    pub fn section(&self, section: &str) -> Section {
        self.data
            .read()
            .sections
            .get(section)
            .cloned()
            .unwrap_or_default()
    }

    pub fn section_names(&self) -> Vec<String> {
        self.data.read().sections.keys().cloned().collect()
    }

    /// Sets one key, creating the section if needed. `SettingValue::Null`
    /// and empty lists remove the key.
    pub fn set(&self, section: &str, key: &str, value: impl Into<SettingValue>) -> WriteStatus {
        let value = value.into();
        self.update(|batch| batch.set(section, key, value))
    }

    pub fn remove(&self, section: &str, key: &str) -> WriteStatus {
        self.set(section, key, SettingValue::Null)
    }

    /// Applies several edits and rewrites the file once.
    pub fn update<F>(&self, edit: F) -> WriteStatus
    where
        F: FnOnce(&mut SettingsBatch<'_>),
    {
        let mut state = self.data.write();
        {
            let mut batch = SettingsBatch {
                sections: &mut state.sections,
            };
            edit(&mut batch);
        }
        self.persist_locked(&mut state)
    }

    /// Re-reads the backing file, replacing the in-memory copy.
    pub fn reload(&self) {
        if let Some(path) = &self.path {
            *self.data.write() = read_state(path);
        }
    }

    /// Writes the current settings to `destination`.
    pub fn export_to(&self, destination: &Path) -> Result<(), ConfigError> {
        let json = {
            let state = self.data.read();
            serde_json::to_string_pretty(&state.sections)?
        };
        fs::write(destination, json)?;
        Ok(())
    }

    /// Replaces the settings with the contents of `source`.
    ///
    /// The incoming file must parse. The current file is copied to
    /// `<file>.bak-<timestamp>` first; that backup path is returned.
    pub fn import_from(&self, source: &Path) -> Result<Option<PathBuf>, ConfigError> {
        let raw = fs::read_to_string(source)?;
        let imported: Sections = serde_json::from_str(&raw)?;
        let path = self.path.as_ref().ok_or(ConfigError::NoBackingFile)?;
        let backup = if path.exists() {
            let timestamp = Local::now().format("%Y%m%d-%H%M%S");
            Some(self.backup(&format!("bak-{timestamp}"))?)
        } else {
            None
        };
        let mut state = self.data.write();
        state.sections = imported;
        state.corrupt_on_disk = false;
        write_sections(path, &state.sections)?;
        Ok(backup)
    }

    /// Copies the backing file to `<file>.<suffix>`.
    pub fn backup(&self, suffix: &str) -> Result<PathBuf, ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::NoBackingFile)?;
        let target = sibling_with_suffix(path, suffix);
        fs::copy(path, &target)?;
        Ok(target)
    }

    fn persist_locked(&self, state: &mut StoreState) -> WriteStatus {
        let Some(path) = &self.path else {
            return WriteStatus::MemoryOnly("settings store has no backing file".into());
        };
        if state.corrupt_on_disk {
            let aside = sibling_with_suffix(path, "corrupt");
            match fs::copy(path, &aside) {
                Ok(_) => warn!(path = %aside.display(), "kept unreadable settings file aside"),
                Err(err) => debug!(%err, "could not copy unreadable settings file aside"),
            }
            state.corrupt_on_disk = false;
        }
        match write_sections(path, &state.sections) {
            Ok(()) => WriteStatus::Persisted,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to persist settings");
                WriteStatus::MemoryOnly(err.to_string())
            }
        }
    }
}

/// Mutable view handed to [`ConfigStore::update`].
pub struct SettingsBatch<'a> {
    sections: &'a mut Sections,
}

impl SettingsBatch<'_> {
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<SettingValue>) {
        let entries = self.sections.entry(section.to_string()).or_default();
        match value.into().encode() {
            Some(encoded) => {
                entries.insert(key.to_string(), encoded);
            }
            None => {
                entries.shift_remove(key);
            }
        }
    }

    pub fn remove(&mut self, section: &str, key: &str) {
        if let Some(entries) = self.sections.get_mut(section) {
            entries.shift_remove(key);
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn keys(&self, section: &str) -> Vec<String> {
        self.sections
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    /// Moves a value to a new key within the same section.
    pub fn rename_key(&mut self, section: &str, from: &str, to: &str) -> bool {
        let Some(entries) = self.sections.get_mut(section) else {
            return false;
        };
        match entries.shift_remove(from) {
            Some(value) => {
                entries.insert(to.to_string(), value);
                true
            }
            None => false,
        }
    }
}

fn read_state(path: &Path) -> StoreState {
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Sections>(&raw) {
            Ok(sections) => StoreState {
                sections,
                corrupt_on_disk: false,
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "settings file is unreadable; starting empty");
                StoreState {
                    sections: Sections::new(),
                    corrupt_on_disk: true,
                }
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file yet");
            StoreState::default()
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read settings; starting empty");
            StoreState::default()
        }
    }
}

fn write_sections(path: &Path, sections: &Sections) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(sections)?;
    let staging = sibling_with_suffix(path, "tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, path)?;
    Ok(())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
