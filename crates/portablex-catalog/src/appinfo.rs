use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::category::NO_CATEGORY;
use crate::entry::AppRecord;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed descriptor at line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },
    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
    #[error("descriptor has no start command")]
    NoStartCommand,
}

/// Reads one application folder into zero or more [`AppRecord`]s.
pub trait AppProber {
    fn probe(&self, folder: &Path) -> Result<Vec<AppRecord>, ProbeError>;
}

/// Reads the `appinfo.ini` descriptor of a PortableApps-style folder, or
/// lists bare executables when the folder has none.
#[derive(Debug, Clone)]
pub struct AppMetadataReader {
    /// Descriptor location relative to the application folder.
    pub descriptor: PathBuf,
    /// Icon file expected next to the descriptor.
    pub icon_file_name: String,
    /// Lowercase extensions treated as launchable without a descriptor.
    pub executable_extensions: Vec<String>,
}

impl Default for AppMetadataReader {
    fn default() -> Self {
        Self {
            descriptor: Path::new("App").join("AppInfo").join("appinfo.ini"),
            icon_file_name: "appicon.ico".into(),
            executable_extensions: vec!["exe".into()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppInfoFile {
    details: DetailsSection,
    control: ControlSection,
    version: VersionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailsSection {
    name: Option<String>,
    category: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ControlSection {
    start: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VersionSection {
    #[serde(rename = "displayversion")]
    display_version: Option<String>,
}

impl AppProber for AppMetadataReader {
    fn probe(&self, folder: &Path) -> Result<Vec<AppRecord>, ProbeError> {
        let descriptor = folder.join(&self.descriptor);
        if descriptor.is_file() {
            self.read_descriptor(folder, &descriptor).map(|record| vec![record])
        } else {
            self.list_executables(folder)
        }
    }
}

impl AppMetadataReader {
    fn read_descriptor(&self, folder: &Path, descriptor: &Path) -> Result<AppRecord, ProbeError> {
        let raw = fs::read_to_string(descriptor)?;
        let info: AppInfoFile = serde_json::from_value(parse_ini(&raw)?)?;

        let start = info
            .control
            .start
            .filter(|start| !start.trim().is_empty())
            .ok_or(ProbeError::NoStartCommand)?;
        let executable = folder.join(start.trim().replace('\\', "/"));

        let icon = descriptor
            .parent()
            .map(|dir| dir.join(&self.icon_file_name))
            .filter(|icon| icon.is_file())
            .unwrap_or_else(|| executable.clone());

        let name = info.details.name.unwrap_or_else(|| folder_name(folder));
        Ok(AppRecord {
            name: clean_name(&name),
            executable,
            icon,
            version: info.version.display_version.unwrap_or_default(),
            description: info.details.description.unwrap_or_default(),
            category: info
                .details
                .category
                .unwrap_or_else(|| NO_CATEGORY.to_string()),
        })
    }

    fn list_executables(&self, folder: &Path) -> Result<Vec<AppRecord>, ProbeError> {
        let mut executables = Vec::new();
        for entry in fs::read_dir(folder)? {
            let path = entry?.path();
            if path.is_file() && self.is_executable(&path) {
                executables.push(path);
            }
        }
        executables.sort();
        Ok(executables
            .into_iter()
            .map(|path| {
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let cleaned = clean_name(&stem);
                let name = if cleaned.is_empty() { stem } else { cleaned };
                AppRecord::bare(name, path)
            })
            .collect())
    }

    fn is_executable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.executable_extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

/// Drops the word "Portable" and tidies the spacing it leaves behind.
pub fn clean_name(name: &str) -> String {
    name.replace("Portable", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parses INI text into `{section: {key: value}}` with lowercase names.
///
/// `;` and `#` start comment lines. A key outside any section, or a line
/// that is neither a header nor `key=value`/`key:value`, is an error. Later
/// duplicates overwrite earlier ones.
fn parse_ini(raw: &str) -> Result<Value, ProbeError> {
    let mut sections: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (index, line) in raw.trim_start_matches('\u{feff}').lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[') {
            let name = header.strip_suffix(']').ok_or(ProbeError::Malformed {
                line: line_no,
                reason: "unterminated section header",
            })?;
            let name = name.trim().to_lowercase();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let section = current.as_ref().ok_or(ProbeError::Malformed {
            line: line_no,
            reason: "key outside of a section",
        })?;
        let split = line.find(|c: char| c == '=' || c == ':').ok_or(ProbeError::Malformed {
            line: line_no,
            reason: "expected key=value",
        })?;
        let key = line[..split].trim().to_lowercase();
        let value = line[split + 1..].trim().to_string();
        if key.is_empty() {
            return Err(ProbeError::Malformed {
                line: line_no,
                reason: "empty key",
            });
        }
        sections
            .entry(section.clone())
            .or_default()
            .insert(key, Value::String(value));
    }

    Ok(Value::Object(
        sections
            .into_iter()
            .map(|(name, entries)| (name, Value::Object(entries)))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, File};

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn write_descriptor(folder: &Path, body: &str) {
        let info_dir = folder.join("App/AppInfo");
        create_dir_all(&info_dir).unwrap();
        fs::write(info_dir.join("appinfo.ini"), body).unwrap();
    }

    #[test]
    fn descriptor_fields_are_read() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("ExamplePortable");
        write_descriptor(
            &folder,
            "\u{feff}[Format]\nType=PortableApps.comFormat\n\n[Details]\nName=Example Portable\nCategory=Graphics & Pictures\nDescription=Draws things\n\n[Version]\nDisplayVersion=2.1\n\n[Control]\nStart=ExamplePortable.exe\n",
        );
        File::create(folder.join("App/AppInfo/appicon.ico")).unwrap();

        let records = AppMetadataReader::default().probe(&folder).unwrap();
        assert_eq!(
            records,
            vec![AppRecord {
                name: "Example".into(),
                executable: folder.join("ExamplePortable.exe"),
                icon: folder.join("App/AppInfo/appicon.ico"),
                version: "2.1".into(),
                description: "Draws things".into(),
                category: "Graphics & Pictures".into(),
            }]
        );
    }

    #[test]
    fn missing_fields_fall_back() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("Notes Portable");
        write_descriptor(&folder, "[Control]\nstart = bin\\Notes.exe\n");

        let records = AppMetadataReader::default().probe(&folder).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Notes");
        assert_eq!(record.category, NO_CATEGORY);
        assert_eq!(record.executable, folder.join("bin/Notes.exe"));
        assert_eq!(record.icon, record.executable);
        assert_eq!(record.version, "");
    }

    #[test]
    fn descriptor_without_start_is_not_launchable() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("Docs");
        write_descriptor(&folder, "[Details]\nName=Docs\n");
        File::create(folder.join("Docs.exe")).unwrap();

        let result = AppMetadataReader::default().probe(&folder);
        assert!(matches!(result, Err(ProbeError::NoStartCommand)));
    }

    #[test]
    fn malformed_descriptor_is_an_error() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("Broken");
        write_descriptor(&folder, "Name=orphan\n[Control]\nStart=x.exe\n");

        let result = AppMetadataReader::default().probe(&folder);
        assert!(matches!(result, Err(ProbeError::Malformed { line: 1, .. })));
    }

    #[test]
    fn bare_executables_are_listed() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("Tools");
        create_dir_all(folder.join("nested")).unwrap();
        File::create(folder.join("PuTTY Portable.EXE")).unwrap();
        File::create(folder.join("readme.txt")).unwrap();
        File::create(folder.join("nested/inner.exe")).unwrap();

        let records = AppMetadataReader::default().probe(&folder).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "PuTTY");
        assert_eq!(records[0].category, NO_CATEGORY);
        assert_eq!(records[0].icon, folder.join("PuTTY Portable.EXE"));
    }

    #[test]
    fn clean_name_collapses_spacing() {
        assert_eq!(clean_name("  Foo  Portable  Bar "), "Foo Bar");
        assert_eq!(clean_name("PortableX"), "X");
    }
}
