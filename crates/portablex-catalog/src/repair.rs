use std::collections::HashMap;
use std::path::PathBuf;

use portablex_config::{ConfigError, ConfigStore};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::paths::{relative_to, to_forward_slashes, CatalogPaths};

const SKIPPED_DIRS: [&str; 7] = [
    "__pycache__",
    ".git",
    "Videos",
    "Pictures",
    "Music",
    "Downloads",
    "documents",
];

const KEY_EXTENSIONS: [&str; 2] = ["exe", "bat"];

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("failed to back up settings before repair: {0}")]
    Backup(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub fixed: usize,
    pub changed: bool,
    pub message: String,
    pub backup: Option<PathBuf>,
}

/// Rewrites path-like overlay keys whose spelling differs from the file on
/// disk only by letter case or slash direction.
///
/// The settings file is copied to `<file>.bak` before anything changes.
pub fn repair_overlay_keys(
    store: &ConfigStore,
    paths: &CatalogPaths,
) -> Result<RepairReport, RepairError> {
    let on_disk = launchable_keys(paths);

    let mut replacements: Vec<(String, String, String)> = Vec::new();
    for section in store.section_names() {
        for key in store.section(&section).into_keys() {
            if !key.contains('/') && !key.contains('\\') {
                continue;
            }
            let lookup = to_forward_slashes(&key).to_lowercase();
            if let Some(actual) = on_disk.get(&lookup) {
                if *actual != key {
                    replacements.push((section.clone(), key, actual.clone()));
                }
            }
        }
    }

    if replacements.is_empty() {
        return Ok(RepairReport {
            fixed: 0,
            changed: false,
            message: "No path casing issues found to fix.".into(),
            backup: None,
        });
    }

    let backup = match store.path() {
        Some(path) if path.exists() => Some(store.backup("bak")?),
        _ => None,
    };
    let fixed = replacements.len();
    store.update(|batch| {
        for (section, from, to) in &replacements {
            debug!(%section, %from, %to, "repairing overlay key");
            batch.rename_key(section, from, to);
        }
    });
    info!(fixed, "repaired overlay keys");
    Ok(RepairReport {
        fixed,
        changed: true,
        message: format!("Fixed {fixed} entries in settings."),
        backup,
    })
}

/// Lowercase identity key -> actual identity key for every launchable file.
fn launchable_keys(paths: &CatalogPaths) -> HashMap<String, String> {
    let scan_root = if paths.apps_dir.is_dir() {
        &paths.apps_dir
    } else {
        &paths.base_dir
    };
    WalkDir::new(scan_root)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| KEY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .filter_map(|entry| relative_to(entry.path(), &paths.base_dir))
        .map(|key| (key.to_lowercase(), key))
        .collect()
}
