//! Section and key names of the persisted settings file.
//!
//! These names are shared with older settings files and exported copies, so
//! they must not change spelling or case.

/// Per-application overlay sections, keyed by identity key.
pub const RENAMES: &str = "Renames";
pub const CATEGORIES: &str = "Categories";
pub const FAVORITES: &str = "Favorites";
pub const HIDDEN: &str = "Hidden";

/// Sections that hold one entry per application identity key.
pub const APP_OVERLAY_SECTIONS: [&str; 4] = [RENAMES, CATEGORIES, FAVORITES, HIDDEN];

/// `GlobalCategories[<name>] = <enabled>`
pub const GLOBAL_CATEGORIES: &str = "GlobalCategories";

pub const SECURITY: &str = "Security";
pub const SETTINGS: &str = "Settings";

pub mod security {
    pub const PASSWORD_SALT: &str = "PasswordSalt";
    pub const PASSWORD_HASH: &str = "PasswordHash";
    pub const PROTECTED_APPS: &str = "ProtectedApps";
    pub const TRUSTED_DEVICES: &str = "TrustedDevices";
    pub const REQUIRE_APP_PASSWORD: &str = "RequireAppPassword";
    pub const REQUIRE_SETTINGS_PASSWORD: &str = "RequireSettingsPassword";
    pub const APP_SESSION_UNLOCK: &str = "AppSessionUnlock";
    /// Older files stored the session unlock flag under this name.
    pub const LEGACY_SESSION_UNLOCK: &str = "SessionUnlock";
}

pub mod settings {
    pub const SHOW_HIDDEN: &str = "ShowHidden";
    pub const STARTUP_APPS: &str = "StartupApps";
    pub const MINI_PINNED_APPS: &str = "MiniPinnedApps";
    pub const HOME_CUSTOM_FOLDERS: &str = "HomeCustomFolders";
}

/// `(section, key)` pairs whose values are delimited identity-key lists.
pub const IDENTITY_KEY_LISTS: [(&str, &str); 3] = [
    (SECURITY, security::PROTECTED_APPS),
    (SETTINGS, settings::STARTUP_APPS),
    (SETTINGS, settings::MINI_PINNED_APPS),
];
