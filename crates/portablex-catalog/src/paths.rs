use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub const APPS_DIR_NAME: &str = "PortableApps";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const CACHE_FILE_NAME: &str = "apps_cache.json";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("could not determine a base directory")]
    NoBaseDir,
}

/// Locations the engine reads and writes, all derived from one base
/// directory (the root of the portable drive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPaths {
    pub base_dir: PathBuf,
    pub apps_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl CatalogPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let apps_dir = base_dir.join(APPS_DIR_NAME);
        let data_dir = apps_dir.join("PortableX").join("Data");
        Self {
            base_dir,
            apps_dir,
            data_dir,
        }
    }

    /// Uses the directory holding the running executable, falling back to
    /// the user's home directory.
    pub fn discover() -> Result<Self, PathError> {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .or_else(dirs::home_dir)
            .map(Self::new)
            .ok_or(PathError::NoBaseDir)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE_NAME)
    }

    pub fn identity_key(&self, executable: &Path) -> String {
        identity_key(executable, &self.base_dir)
    }
}

/// Root-relative, forward-slash form of `path`, or its absolute
/// forward-slash form when it lies outside `root`.
pub fn identity_key(path: &Path, root: &Path) -> String {
    relative_to(path, root).unwrap_or_else(|| to_forward_slashes(&path.to_string_lossy()))
}

/// The path of `path` below `root`, joined with `/`.
///
/// Containment is decided per component after lexical normalization, so a
/// sibling such as `/drive2` is not considered inside `/drive`.
pub fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let path = normalize_lexically(path);
    let root = normalize_lexically(root);
    let rest = path.strip_prefix(&root).ok()?;
    let parts: Vec<_> = rest
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(to_forward_slashes(&parts.join("/")))
}

/// Expands a stored path against `root`. Absolute paths and empty text pass
/// through unchanged.
pub fn expand_stored(stored: &str, root: &Path) -> PathBuf {
    if stored.is_empty() || looks_absolute(stored) {
        return PathBuf::from(stored);
    }
    normalize_lexically(&root.join(stored))
}

pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Absolute on this platform, or a drive/UNC path written on another one.
pub fn looks_absolute(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
