use std::path::PathBuf;

use tracing::debug;
use walkdir::WalkDir;

use crate::appinfo::{AppProber, ProbeError};
use crate::entry::AppRecord;
use crate::paths::CatalogPaths;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub apps_root: PathBuf,
}

impl ScanConfig {
    pub fn new(apps_root: impl Into<PathBuf>) -> Self {
        Self {
            apps_root: apps_root.into(),
        }
    }

    pub fn for_paths(paths: &CatalogPaths) -> Self {
        Self::new(paths.apps_dir.clone())
    }
}

/// Outcome of reading one application folder.
#[derive(Debug)]
pub enum FolderScan {
    Found(Vec<AppRecord>),
    Skipped(SkippedFolder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFolder {
    pub folder: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<AppRecord>,
    pub skipped: Vec<SkippedFolder>,
}

impl ScanReport {
    pub fn into_records(self) -> Vec<AppRecord> {
        self.records
    }
}

pub fn scan_folder<P: AppProber>(prober: &P, folder: PathBuf) -> FolderScan {
    match prober.probe(&folder) {
        Ok(records) => FolderScan::Found(records),
        Err(err) => {
            if matches!(err, ProbeError::NoStartCommand) {
                debug!(folder = %folder.display(), "descriptor has no start command");
            } else {
                debug!(folder = %folder.display(), %err, "skipping unreadable application folder");
            }
            FolderScan::Skipped(SkippedFolder {
                folder,
                reason: err.to_string(),
            })
        }
    }
}

/// Reads every immediate subfolder of the applications root, in name order.
///
/// A folder that cannot be read is recorded in [`ScanReport::skipped`] and
/// the scan moves on. A missing root yields an empty report.
pub fn scan_apps<P: AppProber>(config: &ScanConfig, prober: &P) -> ScanReport {
    let mut report = ScanReport::default();
    if !config.apps_root.is_dir() {
        debug!(root = %config.apps_root.display(), "applications root does not exist");
        return report;
    }

    let walker = WalkDir::new(&config.apps_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if let Some(io) = err.io_error() {
                    debug!(root = %config.apps_root.display(), %io, "skipping entry while scanning");
                }
                continue;
            }
        };
        if !entry.path().is_dir() {
            continue;
        }
        match scan_folder(prober, entry.into_path()) {
            FolderScan::Found(records) => report.records.extend(records),
            FolderScan::Skipped(skipped) => report.skipped.push(skipped),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::fs::{self, create_dir_all, File};
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::appinfo::AppMetadataReader;

    fn write_descriptor(folder: &Path, body: &str) {
        let info_dir = folder.join("App/AppInfo");
        create_dir_all(&info_dir).unwrap();
        fs::write(info_dir.join("appinfo.ini"), body).unwrap();
    }

    #[test]
    fn scan_collects_every_readable_folder() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("PortableApps");
        write_descriptor(
            &root.join("GimpPortable"),
            "[Details]\nName=GIMP Portable\n[Control]\nStart=GimpPortable.exe\n",
        );
        write_descriptor(&root.join("Broken"), "garbage without section\n");
        write_descriptor(&root.join("NoStart"), "[Details]\nName=Nothing\n");
        create_dir_all(root.join("Loose")).unwrap();
        File::create(root.join("Loose/tool.exe")).unwrap();
        File::create(root.join("stray.exe")).unwrap();

        let report = scan_apps(&ScanConfig::new(&root), &AppMetadataReader::default());
        let names: Vec<_> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GIMP", "tool"]);
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| s.folder.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(skipped, vec!["Broken", "NoStart"]);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let report = scan_apps(
            &ScanConfig::new(dir.path().join("absent")),
            &AppMetadataReader::default(),
        );
        assert!(report.records.is_empty());
        assert!(report.skipped.is_empty());
    }
}
