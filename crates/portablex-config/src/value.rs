use serde::{Deserialize, Serialize};

/// Separator for token lists such as protected apps or trusted devices.
pub const LIST_DELIMITER: char = ';';

/// Separator used by older files for folder lists.
const LEGACY_RECORD_DELIMITER: char = '|';

/// A labelled folder shortcut stored as a structured list value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub path: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FolderEntry {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            enabled: true,
        }
    }
}

/// Typed view of one stored setting.
///
/// Values are persisted as text; the variant decides how that text is
/// produced and how it is read back.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// Removes the key.
    Null,
    Bool(bool),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Records(Vec<FolderEntry>),
}

impl SettingValue {
    /// Text form written to the store, or `None` when the key should be removed.
    pub fn encode(&self) -> Option<String> {
        match self {
            SettingValue::Null => None,
            SettingValue::Bool(value) => Some(if *value { "true" } else { "false" }.to_string()),
            SettingValue::Float(value) => Some(value.to_string()),
            SettingValue::Text(value) => Some(value.clone()),
            SettingValue::List(items) => {
                let joined = join_list(items);
                (!joined.is_empty()).then_some(joined)
            }
            SettingValue::Records(entries) => {
                if entries.is_empty() {
                    None
                } else {
                    serde_json::to_string(entries).ok()
                }
            }
        }
    }

    /// Decodes `raw` into the same variant as `default`, falling back to
    /// `default` when the key is absent or the text does not parse.
    pub fn decode_like(raw: Option<&str>, default: SettingValue) -> SettingValue {
        let Some(raw) = raw else {
            return default;
        };
        match default {
            SettingValue::Null => SettingValue::Text(raw.to_string()),
            SettingValue::Bool(fallback) => SettingValue::Bool(parse_bool(raw).unwrap_or(fallback)),
            SettingValue::Float(fallback) => {
                SettingValue::Float(raw.trim().parse().unwrap_or(fallback))
            }
            SettingValue::Text(_) => SettingValue::Text(raw.to_string()),
            SettingValue::List(_) => SettingValue::List(parse_list(raw)),
            SettingValue::Records(_) => SettingValue::Records(parse_records(raw)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(items: Vec<String>) -> Self {
        SettingValue::List(items)
    }
}

impl From<Vec<FolderEntry>> for SettingValue {
    fn from(entries: Vec<FolderEntry>) -> Self {
        SettingValue::Records(entries)
    }
}

impl<T: Into<SettingValue>> From<Option<T>> for SettingValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SettingValue::Null, Into::into)
    }
}

/// Accepts the usual INI spellings, case-insensitively.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(LIST_DELIMITER)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins tokens with [`LIST_DELIMITER`]. Empty tokens are dropped.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    let separator = LIST_DELIMITER.to_string();
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordRepr {
    Path(String),
    Entry(FolderEntry),
}

/// Reads the compact JSON array form, or the legacy `|`-separated path list.
pub fn parse_records(raw: &str) -> Vec<FolderEntry> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    if let Ok(items) = serde_json::from_str::<Vec<RecordRepr>>(raw) {
        let entries = items
            .into_iter()
            .map(|item| match item {
                RecordRepr::Path(path) => FolderEntry::new(path, ""),
                RecordRepr::Entry(entry) => entry,
            })
            .collect();
        return normalize_records(entries);
    }
    let entries = raw
        .split(LEGACY_RECORD_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| FolderEntry::new(part, ""))
        .collect();
    normalize_records(entries)
}

/// Drops empty paths and merges duplicates that differ only by case or
/// separator style. A later duplicate can re-enable an earlier disabled entry
/// and can supply a missing label.
pub fn normalize_records(entries: Vec<FolderEntry>) -> Vec<FolderEntry> {
    let mut normalized: Vec<FolderEntry> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    for entry in entries {
        if entry.path.is_empty() {
            continue;
        }
        let key = record_key(&entry.path);
        if let Some(index) = keys.iter().position(|existing| *existing == key) {
            let existing = &mut normalized[index];
            if entry.enabled && !existing.enabled {
                existing.enabled = true;
            }
            if !entry.label.is_empty() && existing.label.is_empty() {
                existing.label = entry.label;
            }
            continue;
        }
        keys.push(key);
        normalized.push(entry);
    }
    normalized
}

fn record_key(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim_end_matches('/');
    let key = if trimmed.is_empty() { unified.as_str() } else { trimmed };
    key.to_lowercase()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn list_round_trip_drops_empty_tokens() {
        let items = vec!["a/b.exe".to_string(), String::new(), "c.exe".to_string()];
        let encoded = SettingValue::List(items).encode().unwrap();
        assert_eq!(encoded, "a/b.exe;c.exe");
        assert_eq!(parse_list(&encoded), vec!["a/b.exe", "c.exe"]);
        assert_eq!(SettingValue::List(Vec::new()).encode(), None);
    }

    #[test]
    fn records_round_trip_through_json() {
        let entries = vec![
            FolderEntry::new("D:/Docs", "Docs"),
            FolderEntry {
                path: "D:/Games".into(),
                label: String::new(),
                enabled: false,
            },
        ];
        let encoded = SettingValue::Records(entries.clone()).encode().unwrap();
        assert_eq!(parse_records(&encoded), entries);
    }

    #[test]
    fn records_accept_legacy_and_plain_strings() {
        assert_eq!(
            parse_records("D:/One | D:/Two"),
            vec![FolderEntry::new("D:/One", ""), FolderEntry::new("D:/Two", "")]
        );
        assert_eq!(
            parse_records(r#"["D:/One", {"path": "D:/Two", "label": "Two"}]"#),
            vec![FolderEntry::new("D:/One", ""), FolderEntry::new("D:/Two", "Two")]
        );
    }

    #[test]
    fn duplicate_records_merge() {
        let merged = normalize_records(vec![
            FolderEntry {
                path: "D:\\Music".into(),
                label: String::new(),
                enabled: false,
            },
            FolderEntry::new("d:/music/", "Tunes"),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].enabled);
        assert_eq!(merged[0].label, "Tunes");
        assert_eq!(merged[0].path, "D:\\Music");
    }

    #[test]
    fn decode_falls_back_to_default() {
        assert_eq!(
            SettingValue::decode_like(Some("garbage"), SettingValue::Bool(true)),
            SettingValue::Bool(true)
        );
        assert_eq!(
            SettingValue::decode_like(Some("2.5"), SettingValue::Float(0.0)),
            SettingValue::Float(2.5)
        );
        assert_eq!(
            SettingValue::decode_like(None, SettingValue::Float(24.0)),
            SettingValue::Float(24.0)
        );
    }
}
