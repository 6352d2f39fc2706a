//! Category name cleanup, alias resolution and the allowed-category list.
//!
//! Nothing in here fails: unknown or malformed names resolve to
//! [`NO_CATEGORY`].

use std::collections::{HashMap, HashSet};

use portablex_config::{keys, parse_bool, ConfigStore};

pub const NO_CATEGORY: &str = "No Category";

pub const BASE_CATEGORIES: [&str; 17] = [
    "Accessibility",
    "Benchmark",
    "Development",
    "Education",
    "Games",
    "Graphics and Pictures",
    "Internet",
    "Messaging",
    "Microsoft",
    "Music and Video",
    "Office",
    "Other",
    "Portable Apps",
    "Security",
    "Steam Games",
    "Utilities",
    NO_CATEGORY,
];

const ALIASES: [(&str, &str); 3] = [
    ("graphics & pictures", "Graphics and Pictures"),
    ("music & video", "Music and Video"),
    ("windows utilities", "Utilities"),
];

const SENTINEL_ALIASES: [&str; 3] = ["none", "no category", "uncategorized"];

/// Trims and collapses internal whitespace.
pub fn normalize(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_sentinel(lowered: &str) -> bool {
    SENTINEL_ALIASES.contains(&lowered)
}

fn alias_for(lowered: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| *canonical)
}

/// Maps a raw category name onto a canonical one.
///
/// Without `allowed` the alias-canonical spelling is returned. With it, the
/// first candidate present in `allowed` wins, using the spelling stored
/// there; anything else becomes the sentinel.
pub fn resolve(raw: &str, allowed: Option<&[String]>) -> String {
    let name = normalize(raw);
    if name.is_empty() {
        return NO_CATEGORY.to_string();
    }
    let lowered = name.to_lowercase();
    if is_sentinel(&lowered) {
        return sentinel_label(allowed);
    }
    let canonical = alias_for(&lowered).map_or_else(|| name.clone(), str::to_string);
    let Some(allowed) = allowed else {
        return canonical;
    };

    let lookup: HashMap<String, &String> = allowed
        .iter()
        .filter_map(|item| {
            let norm = normalize(item);
            (!norm.is_empty()).then(|| (norm.to_lowercase(), item))
        })
        .collect();

    let mut candidates = vec![canonical, name.clone()];
    if name.contains('&') {
        candidates.push(normalize(&name.replace('&', "and")));
    }
    if lowered.contains(" and ") {
        candidates.push(normalize(&name.replace(" and ", " & ")));
    }
    candidates
        .iter()
        .find_map(|candidate| lookup.get(&candidate.to_lowercase()))
        .map(|label| label.to_string())
        .unwrap_or_else(|| sentinel_label(Some(allowed)))
}

fn sentinel_label(allowed: Option<&[String]>) -> String {
    allowed
        .and_then(|allowed| {
            allowed
                .iter()
                .find(|item| is_sentinel(&normalize(item).to_lowercase()))
        })
        .cloned()
        .unwrap_or_else(|| NO_CATEGORY.to_string())
}

/// Enabled user-defined categories in the order they were added.
pub fn parse_global_categories(store: &ConfigStore) -> Vec<String> {
    store
        .section(keys::GLOBAL_CATEGORIES)
        .into_iter()
        .filter(|(_, enabled)| parse_bool(enabled) != Some(false))
        .map(|(name, _)| normalize(&name))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Builds the ordered, de-duplicated category list.
///
/// Base entries keep their first-seen spelling and order, the sentinel
/// included. Custom categories are appended after them, so a base list
/// that carries the sentinel puts it ahead of every custom category rather
/// than at the tail. The sentinel is appended last only when the base list
/// lacks it, so it appears exactly once.
pub fn build_allowed<S: AsRef<str>>(custom: &[String], base: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut allowed = Vec::new();
    let mut has_sentinel = false;

    for category in base.iter().map(AsRef::as_ref) {
        let norm = normalize(category);
        if norm.is_empty() {
            continue;
        }
        let key = norm.to_lowercase();
        if is_sentinel(&key) {
            if !has_sentinel {
                has_sentinel = true;
                allowed.push(category.to_string());
            }
            continue;
        }
        if seen.insert(key) {
            allowed.push(category.to_string());
        }
    }

    for category in custom {
        let norm = normalize(category);
        if norm.is_empty() {
            continue;
        }
        let key = norm.to_lowercase();
        if is_sentinel(&key) {
            continue;
        }
        if seen.insert(key) {
            allowed.push(norm);
        }
    }

    if !has_sentinel {
        allowed.push(NO_CATEGORY.to_string());
    }
    allowed
}

/// The allowed list for the current overlay on top of [`BASE_CATEGORIES`].
pub fn allowed_categories(store: &ConfigStore) -> Vec<String> {
    build_allowed(&parse_global_categories(store), &BASE_CATEGORIES)
}
