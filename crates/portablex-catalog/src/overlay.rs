use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use portablex_config::{keys, parse_bool, ConfigStore, Section, SettingValue, WriteStatus};
use tracing::debug;

use crate::category::{self, NO_CATEGORY};
use crate::entry::{sort_catalog, AppRecord, CatalogEntry};
use crate::paths::identity_key;

/// The per-application overrides read from the settings store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    pub renames: BTreeMap<String, String>,
    pub categories: BTreeMap<String, String>,
    pub favorites: HashSet<String>,
    pub hidden: HashSet<String>,
}

impl Overlay {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            renames: store.section(keys::RENAMES).into_iter().collect(),
            categories: store.section(keys::CATEGORIES).into_iter().collect(),
            favorites: flagged(store.section(keys::FAVORITES)),
            hidden: flagged(store.section(keys::HIDDEN)),
        }
    }
}

fn flagged(section: Section) -> HashSet<String> {
    section
        .into_iter()
        .filter(|(_, value)| parse_bool(value).unwrap_or(false))
        .map(|(key, _)| key)
        .collect()
}

/// Applies the overlay to scanned records and returns the sorted visible
/// catalog.
///
/// Hidden entries are dropped unless `show_hidden` is set. When two
/// records share an identity key the first one is kept.
pub fn merge_catalog(
    records: Vec<AppRecord>,
    overlay: &Overlay,
    allowed: &[String],
    show_hidden: bool,
    base_dir: &Path,
) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(records.len());

    for record in records {
        let key = identity_key(&record.executable, base_dir);
        if !seen.insert(key.clone()) {
            debug!(%key, "dropping duplicate application");
            continue;
        }
        let is_hidden = overlay.hidden.contains(&key);
        if is_hidden && !show_hidden {
            continue;
        }
        let name = overlay.renames.get(&key).cloned().unwrap_or(record.name);
        let raw_category = overlay
            .categories
            .get(&key)
            .map(String::as_str)
            .unwrap_or(&record.category);
        entries.push(CatalogEntry {
            category: category::resolve(raw_category, Some(allowed)),
            is_favorite: overlay.favorites.contains(&key),
            is_hidden,
            key,
            name,
            executable: record.executable,
            icon: record.icon,
            version: record.version,
            description: record.description,
        });
    }

    sort_catalog(&mut entries);
    entries
}

/// User edits to the overlay. Every call persists immediately.
#[derive(Debug, Clone, Copy)]
pub struct OverlayEditor<'a> {
    store: &'a ConfigStore,
}

impl<'a> OverlayEditor<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    /// Flips the favorite flag and returns the new value.
    pub fn toggle_favorite(&self, key: &str) -> (bool, WriteStatus) {
        self.toggle(keys::FAVORITES, key)
    }

    pub fn toggle_hidden(&self, key: &str) -> (bool, WriteStatus) {
        self.toggle(keys::HIDDEN, key)
    }

    fn toggle(&self, section: &str, key: &str) -> (bool, WriteStatus) {
        let enabled = !self.store.get_bool(section, key, false);
        let value = if enabled {
            SettingValue::Bool(true)
        } else {
            SettingValue::Null
        };
        (enabled, self.store.set(section, key, value))
    }

    /// Blank names are ignored.
    pub fn rename(&self, key: &str, name: &str) -> Option<WriteStatus> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(self.store.set(keys::RENAMES, key, name))
    }

    pub fn clear_rename(&self, key: &str) -> WriteStatus {
        self.store.remove(keys::RENAMES, key)
    }

    /// Stores a category override; a blank name removes it.
    pub fn set_category(&self, key: &str, category: &str) -> WriteStatus {
        let category = category::normalize(category);
        if category.is_empty() {
            return self.store.remove(keys::CATEGORIES, key);
        }
        self.store.set(keys::CATEGORIES, key, category)
    }

    /// Adds an enabled custom category. Blank names and the sentinel are
    /// ignored.
    pub fn add_global_category(&self, name: &str) -> Option<WriteStatus> {
        let name = category::normalize(name);
        if name.is_empty() || name.eq_ignore_ascii_case(NO_CATEGORY) {
            return None;
        }
        Some(self.store.set(keys::GLOBAL_CATEGORIES, &name, true))
    }

    pub fn set_global_category_enabled(&self, name: &str, enabled: bool) -> WriteStatus {
        let name = category::normalize(name);
        self.store.set(keys::GLOBAL_CATEGORIES, &name, enabled)
    }

    pub fn remove_global_category(&self, name: &str) -> WriteStatus {
        self.store
            .remove(keys::GLOBAL_CATEGORIES, &category::normalize(name))
    }

    /// Forgets every override for `app_keys`, including their entries in
    /// the protected, startup and pinned lists, in one rewrite.
    pub fn remove_app_keys(&self, app_keys: &[String]) -> WriteStatus {
        let doomed: HashSet<&str> = app_keys.iter().map(String::as_str).collect();
        self.store.update(|batch| {
            for section in keys::APP_OVERLAY_SECTIONS {
                for key in &doomed {
                    batch.remove(section, key);
                }
            }
            for (section, list_key) in keys::IDENTITY_KEY_LISTS {
                let Some(raw) = batch.get(section, list_key) else {
                    continue;
                };
                let kept: Vec<String> = portablex_config::parse_list(raw)
                    .into_iter()
                    .filter(|item| !doomed.contains(item.as_str()))
                    .collect();
                batch.set(section, list_key, kept);
            }
        })
    }

    pub fn startup_keys(&self) -> Vec<String> {
        self.store
            .get_list(keys::SETTINGS, keys::settings::STARTUP_APPS)
    }

    pub fn pinned_keys(&self) -> Vec<String> {
        self.store
            .get_list(keys::SETTINGS, keys::settings::MINI_PINNED_APPS)
    }

    pub fn set_pinned_keys(&self, pinned: Vec<String>) -> WriteStatus {
        self.store
            .set(keys::SETTINGS, keys::settings::MINI_PINNED_APPS, pinned)
    }
}

/// Catalog rows for `app_keys`, in key order. Unknown keys are skipped.
pub fn pinned_entries(snapshot: &[CatalogEntry], app_keys: &[String]) -> Vec<CatalogEntry> {
    app_keys
        .iter()
        .filter_map(|key| snapshot.iter().find(|entry| entry.key == *key))
        .cloned()
        .collect()
}
