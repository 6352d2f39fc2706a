use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use portablex_catalog::{
    category, merge_catalog, scan_apps, AppMetadataReader, CacheStore, CatalogPaths, Overlay,
    OverlayEditor, ScanConfig,
};
use portablex_config::{keys, ConfigStore};
use portablex_scanner::{CatalogEvent, DiskCatalog, RefreshRequest, ScanOrchestrator};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn install(base: &Path, folder: &str, name: &str, category: &str) {
    let info = base
        .join("PortableApps")
        .join(folder)
        .join("App/AppInfo");
    fs::create_dir_all(&info).unwrap();
    fs::write(
        info.join("appinfo.ini"),
        format!("[Details]\nName={name}\nCategory={category}\n[Control]\nStart={folder}.exe\n"),
    )
    .unwrap();
}

fn visible(base: &Path, store: &ConfigStore, show_hidden: bool) -> Vec<portablex_catalog::CatalogEntry> {
    let paths = CatalogPaths::new(base);
    let report = scan_apps(&ScanConfig::for_paths(&paths), &AppMetadataReader::default());
    merge_catalog(
        report.into_records(),
        &Overlay::from_store(store),
        &category::allowed_categories(store),
        show_hidden,
        base,
    )
}

#[test]
fn example_portable_lands_in_canonical_category() {
    let dir = tempdir().unwrap();
    install(dir.path(), "ExamplePortable", "Example Portable", "Graphics & Pictures");

    let paths = CatalogPaths::new(dir.path());
    let report = scan_apps(&ScanConfig::for_paths(&paths), &AppMetadataReader::default());
    let allowed = vec!["Graphics and Pictures".to_string(), "No Category".to_string()];
    let entries = merge_catalog(
        report.into_records(),
        &Overlay::default(),
        &allowed,
        false,
        dir.path(),
    );

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Example");
    assert_eq!(entries[0].category, "Graphics and Pictures");
    assert_eq!(entries[0].key, "PortableApps/ExamplePortable/ExamplePortable.exe");
}

#[test]
fn hidden_entries_never_leak_and_order_holds() {
    let dir = tempdir().unwrap();
    for (folder, name) in [("Zed", "zed"), ("Alpha", "Alpha"), ("beta", "beta"), ("Gone", "Gone")] {
        install(dir.path(), folder, name, "Utilities");
    }
    let store = ConfigStore::in_memory();
    let editor = OverlayEditor::new(&store);
    editor.toggle_hidden("PortableApps/Gone/Gone.exe");
    editor.toggle_favorite("PortableApps/Zed/Zed.exe");

    let entries = visible(dir.path(), &store, false);
    assert!(entries.iter().all(|entry| !entry.is_hidden));
    let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["zed", "Alpha", "beta"]);

    let everything = visible(dir.path(), &store, true);
    assert_eq!(everything.len(), 4);
}

#[test]
fn renamed_drive_still_hydrates_from_cache() {
    let dir = tempdir().unwrap();
    let old_base = dir.path().join("E");
    install(&old_base, "ExamplePortable", "Example Portable", "Graphics & Pictures");
    let store = ConfigStore::in_memory();
    store.set(keys::FAVORITES, "PortableApps/ExamplePortable/ExamplePortable.exe", true);
    let entries = visible(&old_base, &store, false);

    let old_paths = CatalogPaths::new(&old_base);
    CacheStore::for_paths(&old_paths)
        .save(&entries, &old_base)
        .unwrap();

    let new_base = dir.path().join("F");
    fs::rename(&old_base, &new_base).unwrap();
    let loaded = CacheStore::for_paths(&CatalogPaths::new(&new_base))
        .load(&new_base)
        .unwrap();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, entries[0].name);
    assert_eq!(loaded[0].category, entries[0].category);
    assert_eq!(loaded[0].is_favorite, entries[0].is_favorite);
    assert_eq!(loaded[0].key, entries[0].key);
    assert_eq!(
        loaded[0].executable.strip_prefix(&new_base).unwrap(),
        entries[0].executable.strip_prefix(&old_base).unwrap()
    );
}

#[test]
fn orchestrated_refresh_writes_cache_and_hydrates_next_run() {
    let dir = tempdir().unwrap();
    install(dir.path(), "ExamplePortable", "Example Portable", "Graphics & Pictures");
    let paths = CatalogPaths::new(dir.path());
    let store = Arc::new(ConfigStore::open(paths.settings_file()));

    {
        let orchestrator =
            ScanOrchestrator::new(DiskCatalog::new(paths.clone(), Arc::clone(&store))).unwrap();
        let events = orchestrator.subscribe();
        assert_eq!(orchestrator.refresh(), RefreshRequest::Started);
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            CatalogEvent::Completed(entries) => assert_eq!(entries[0].name, "Example"),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(orchestrator.snapshot().len(), 1);
    }
    assert!(paths.cache_file().exists());

    let orchestrator =
        ScanOrchestrator::new(DiskCatalog::new(paths.clone(), Arc::clone(&store))).unwrap();
    let events = orchestrator.subscribe();
    orchestrator.refresh();
    match events.recv_timeout(Duration::from_secs(10)).unwrap() {
        CatalogEvent::Provisional(entries) => assert_eq!(entries[0].name, "Example"),
        other => panic!("expected the cached catalog first, got {other:?}"),
    }
}

#[test]
fn cached_catalog_respects_current_hidden_preference() {
    let dir = tempdir().unwrap();
    install(dir.path(), "Secret", "Secret", "Utilities");
    install(dir.path(), "Notes", "Notes", "Utilities");
    let paths = CatalogPaths::new(dir.path());
    let store = Arc::new(ConfigStore::open(paths.settings_file()));
    store.set(keys::SETTINGS, keys::settings::SHOW_HIDDEN, true);
    store.set(keys::HIDDEN, "PortableApps/Secret/Secret.exe", true);

    {
        let orchestrator =
            ScanOrchestrator::new(DiskCatalog::new(paths.clone(), Arc::clone(&store))).unwrap();
        let events = orchestrator.subscribe();
        orchestrator.refresh();
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            CatalogEvent::Completed(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    store.set(keys::SETTINGS, keys::settings::SHOW_HIDDEN, false);
    let orchestrator =
        ScanOrchestrator::new(DiskCatalog::new(paths.clone(), Arc::clone(&store))).unwrap();
    let events = orchestrator.subscribe();
    orchestrator.refresh();
    match events.recv_timeout(Duration::from_secs(10)).unwrap() {
        CatalogEvent::Provisional(entries) => {
            let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
            assert_eq!(names, vec!["Notes"]);
        }
        other => panic!("expected the cached catalog first, got {other:?}"),
    }
    assert!(orchestrator.snapshot().iter().all(|entry| !entry.is_hidden));
}
