use std::sync::Arc;

use portablex_catalog::{
    category, merge_catalog, scan_apps, AppMetadataReader, CacheError, CacheMiss, CacheStore,
    CatalogEntry, CatalogPaths, Overlay, ScanConfig,
};
use portablex_config::{keys, ConfigStore};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("base directory {0} is not available")]
    MissingBase(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("scan worker panicked")]
    Panicked,
    #[error("failed to start scan worker: {0}")]
    Spawn(std::io::Error),
}

/// Where the orchestrator gets catalogs from.
pub trait CatalogSource: Send + Sync + 'static {
    /// The last persisted snapshot, if it can be trusted.
    fn load_cached(&self) -> Result<Vec<CatalogEntry>, CacheMiss>;

    /// A fresh scan merged with the current overlay.
    fn scan(&self) -> Result<Vec<CatalogEntry>, ScanError>;

    fn persist(&self, entries: &[CatalogEntry]) -> Result<(), ScanError>;
}

/// The on-disk catalog: PortableApps folders, the settings overlay and the
/// JSON cache.
#[derive(Debug)]
pub struct DiskCatalog {
    paths: CatalogPaths,
    store: Arc<ConfigStore>,
    reader: AppMetadataReader,
    cache: CacheStore,
    show_hidden: Option<bool>,
}

impl DiskCatalog {
    pub fn new(paths: CatalogPaths, store: Arc<ConfigStore>) -> Self {
        let cache = CacheStore::for_paths(&paths);
        Self {
            paths,
            store,
            reader: AppMetadataReader::default(),
            cache,
            show_hidden: None,
        }
    }

    pub fn with_reader(mut self, reader: AppMetadataReader) -> Self {
        self.reader = reader;
        self
    }

    /// Overrides the stored `ShowHidden` preference.
    pub fn with_show_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = Some(show_hidden);
        self
    }

    fn show_hidden(&self) -> bool {
        self.show_hidden.unwrap_or_else(|| {
            self.store
                .get_bool(keys::SETTINGS, keys::settings::SHOW_HIDDEN, false)
        })
    }

    pub fn paths(&self) -> &CatalogPaths {
        &self.paths
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }
}

impl CatalogSource for DiskCatalog {
    /// The cached catalog, with hidden apps dropped unless they are shown.
    ///
    /// The snapshot may predate the current `Hidden` overlay or
    /// `ShowHidden` preference, so both are re-applied here.
    fn load_cached(&self) -> Result<Vec<CatalogEntry>, CacheMiss> {
        let mut entries = self.cache.load(&self.paths.base_dir)?;
        if !self.show_hidden() {
            let overlay = Overlay::from_store(&self.store);
            entries.retain(|entry| !entry.is_hidden && !overlay.hidden.contains(&entry.key));
        }
        Ok(entries)
    }

    fn scan(&self) -> Result<Vec<CatalogEntry>, ScanError> {
        if !self.paths.base_dir.is_dir() {
            return Err(ScanError::MissingBase(
                self.paths.base_dir.display().to_string(),
            ));
        }
        let report = scan_apps(&ScanConfig::for_paths(&self.paths), &self.reader);
        if !report.skipped.is_empty() {
            debug!(skipped = report.skipped.len(), "some application folders were skipped");
        }
        let overlay = Overlay::from_store(&self.store);
        let allowed = category::allowed_categories(&self.store);
        let show_hidden = self.show_hidden();
        Ok(merge_catalog(
            report.into_records(),
            &overlay,
            &allowed,
            show_hidden,
            &self.paths.base_dir,
        ))
    }

    fn persist(&self, entries: &[CatalogEntry]) -> Result<(), ScanError> {
        self.cache.save(entries, &self.paths.base_dir)?;
        Ok(())
    }
}
