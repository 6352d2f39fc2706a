use std::path::PathBuf;

use serde::Serialize;

use crate::category::NO_CATEGORY;

/// What a scan learned about one launchable application, before any user
/// overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    pub name: String,
    pub executable: PathBuf,
    pub icon: PathBuf,
    pub version: String,
    pub description: String,
    pub category: String,
}

impl AppRecord {
    /// A record for a bare executable found without a descriptor.
    pub fn bare(name: impl Into<String>, executable: PathBuf) -> Self {
        Self {
            name: name.into(),
            icon: executable.clone(),
            executable,
            version: String::new(),
            description: String::new(),
            category: NO_CATEGORY.to_string(),
        }
    }
}

/// One row of the visible catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
    pub executable: PathBuf,
    pub icon: PathBuf,
    pub category: String,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub version: String,
    pub description: String,
}

/// Favorites first, then case-insensitive name order. The sort is stable.
pub fn sort_catalog(entries: &mut [CatalogEntry]) {
    entries.sort_by_cached_key(|entry| (!entry.is_favorite, entry.name.to_lowercase()));
}
