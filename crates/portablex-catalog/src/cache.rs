use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::entry::CatalogEntry;
use crate::paths::{expand_stored, identity_key, relative_to, to_forward_slashes, CatalogPaths};

pub const CACHE_VERSION: u64 = 1;

/// Why a cached snapshot could not be used. Every variant means "rescan".
#[derive(Debug, Error)]
pub enum CacheMiss {
    #[error("no cached catalog")]
    Absent,
    #[error("failed to read cached catalog: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("cached catalog is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("cached catalog has no version tag")]
    MissingVersion,
    #[error("unsupported cached catalog version {0}")]
    UnsupportedVersion(u64),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write cached catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode cached catalog: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u64,
    apps: Vec<CachedApp>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CachedApp {
    name: String,
    exe: String,
    icon: String,
    is_favorite: bool,
    is_hidden: bool,
    category: String,
    version: String,
    description: String,
}

/// Portable snapshot of the last completed catalog.
///
/// Paths under the base directory are stored relative to it, so a drive
/// mounted somewhere else still hydrates correctly.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_paths(paths: &CatalogPaths) -> Self {
        Self::new(paths.cache_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, entries: &[CatalogEntry], root: &Path) -> Result<(), CacheError> {
        let file = CacheFile {
            version: CACHE_VERSION,
            apps: entries
                .iter()
                .map(|entry| CachedApp {
                    name: entry.name.clone(),
                    exe: portable_path(&entry.executable, root),
                    icon: portable_path(&entry.icon, root),
                    is_favorite: entry.is_favorite,
                    is_hidden: entry.is_hidden,
                    category: entry.category.clone(),
                    version: entry.version.clone(),
                    description: entry.description.clone(),
                })
                .collect(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&file)?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), apps = entries.len(), "saved catalog cache");
        Ok(())
    }

    /// Loads the snapshot, expanding relative paths against `root`.
    ///
    /// The snapshot is taken whole or not at all.
    pub fn load(&self, root: &Path) -> Result<Vec<CatalogEntry>, CacheMiss> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheMiss::Absent)
            }
            Err(err) => return Err(err.into()),
        };
        let value: Value = serde_json::from_str(&raw)?;
        let version = value
            .get("version")
            .ok_or(CacheMiss::MissingVersion)?
            .as_u64()
            .ok_or(CacheMiss::MissingVersion)?;
        if version != CACHE_VERSION {
            return Err(CacheMiss::UnsupportedVersion(version));
        }
        let file: CacheFile = serde_json::from_value(value)?;
        Ok(file
            .apps
            .into_iter()
            .map(|app| {
                let executable = expand_stored(&app.exe, root);
                CatalogEntry {
                    key: identity_key(&executable, root),
                    name: app.name,
                    icon: expand_stored(&app.icon, root),
                    executable,
                    category: app.category,
                    is_favorite: app.is_favorite,
                    is_hidden: app.is_hidden,
                    version: app.version,
                    description: app.description,
                }
            })
            .collect())
    }
}

fn portable_path(path: &Path, root: &Path) -> String {
    if path.as_os_str().is_empty() {
        return String::new();
    }
    relative_to(path, root).unwrap_or_else(|| to_forward_slashes(&path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn entry(root: &Path, folder: &str) -> CatalogEntry {
        let executable = root.join("PortableApps").join(folder).join(format!("{folder}.exe"));
        CatalogEntry {
            key: format!("PortableApps/{folder}/{folder}.exe"),
            name: folder.into(),
            icon: executable.clone(),
            executable,
            category: "Utilities".into(),
            is_favorite: folder == "Fav",
            is_hidden: false,
            version: "1.0".into(),
            description: "desc".into(),
        }
    }

    #[test]
    fn round_trip_on_same_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("drive");
        let cache = CacheStore::new(dir.path().join("data/apps_cache.json"));
        let entries = vec![entry(&root, "Fav"), entry(&root, "Tool")];
        cache.save(&entries, &root).unwrap();
        assert_eq!(cache.load(&root).unwrap(), entries);
    }

    #[test]
    fn relative_paths_follow_new_root() {
        let dir = tempdir().unwrap();
        let old_root = dir.path().join("old");
        let new_root = dir.path().join("new");
        let cache = CacheStore::new(dir.path().join("apps_cache.json"));
        let mut outside = entry(&old_root, "Ext");
        outside.executable = dir.path().join("old2/Ext.exe");
        outside.key = to_forward_slashes(&outside.executable.to_string_lossy());
        cache
            .save(&[entry(&old_root, "Tool"), outside.clone()], &old_root)
            .unwrap();

        let stored = fs::read_to_string(cache.path()).unwrap();
        assert!(stored.contains("\"exe\":\"PortableApps/Tool/Tool.exe\""));

        let loaded = cache.load(&new_root).unwrap();
        assert_eq!(loaded[0], entry(&new_root, "Tool"));
        assert_eq!(loaded[1].executable, outside.executable);
        assert_eq!(loaded[1].icon, new_root.join("PortableApps/Ext/Ext.exe"));
    }

    #[test]
    fn rejects_wrong_version_and_shape() {
        let dir = tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("apps_cache.json"));
        assert!(matches!(cache.load(dir.path()), Err(CacheMiss::Absent)));

        fs::write(cache.path(), r#"{"version": 2, "apps": []}"#).unwrap();
        assert!(matches!(
            cache.load(dir.path()),
            Err(CacheMiss::UnsupportedVersion(2))
        ));

        fs::write(cache.path(), r#"{"version": 1, "apps": [{"name": "ok"}, 7]}"#).unwrap();
        assert!(matches!(cache.load(dir.path()), Err(CacheMiss::Malformed(_))));

        fs::write(cache.path(), r#"[1, 2, 3]"#).unwrap();
        assert!(matches!(cache.load(dir.path()), Err(CacheMiss::MissingVersion)));
    }
}
