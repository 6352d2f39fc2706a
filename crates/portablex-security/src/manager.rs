use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portablex_config::{keys, ConfigStore, SettingValue, WriteStatus};
use tracing::{debug, info};

use crate::device::DeviceIdentity;
use crate::gate::{prompt_until_verified, GateOutcome, PasswordPrompt, PromptPurpose};
use crate::password::{Credential, SecurityError};

use keys::security::{
    APP_SESSION_UNLOCK, LEGACY_SESSION_UNLOCK, PASSWORD_HASH, PASSWORD_SALT, PROTECTED_APPS,
    REQUIRE_APP_PASSWORD, REQUIRE_SETTINGS_PASSWORD, TRUSTED_DEVICES,
};

/// Password, trusted-device and protected-app state, persisted in the
/// `Security` section of the settings store.
///
/// The session unlock lives only in memory and resets with the process.
#[derive(Debug)]
pub struct SecurityManager {
    store: Arc<ConfigStore>,
    device: DeviceIdentity,
    session_unlocked: AtomicBool,
}

impl SecurityManager {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self::with_device(store, DeviceIdentity::current())
    }

    pub fn with_device(store: Arc<ConfigStore>, device: DeviceIdentity) -> Self {
        Self {
            store,
            device,
            session_unlocked: AtomicBool::new(false),
        }
    }

    fn credential(&self) -> Option<Credential> {
        let salt = self.store.get(keys::SECURITY, PASSWORD_SALT)?;
        let hash = self.store.get(keys::SECURITY, PASSWORD_HASH)?;
        (!salt.is_empty() && !hash.is_empty()).then_some(Credential { salt, hash })
    }

    pub fn is_password_set(&self) -> bool {
        self.credential().is_some()
    }

    /// Checks `password` against the stored credential. Always false when
    /// no password is set; callers check [`Self::is_password_set`] first.
    pub fn verify(&self, password: &str) -> bool {
        let verified = self
            .credential()
            .is_some_and(|credential| credential.matches(password));
        if !verified {
            debug!("password verification failed");
        }
        verified
    }

    /// Stores a new password. Trusted devices and the session unlock are
    /// cleared.
    pub fn set_password(&self, password: &str) -> Result<WriteStatus, SecurityError> {
        let credential = Credential::create(password)?;
        self.session_unlocked.store(false, Ordering::Release);
        let status = self.store.update(|batch| {
            batch.set(keys::SECURITY, PASSWORD_SALT, credential.salt.as_str());
            batch.set(keys::SECURITY, PASSWORD_HASH, credential.hash.as_str());
            batch.remove(keys::SECURITY, TRUSTED_DEVICES);
        });
        info!("password updated");
        Ok(status)
    }

    /// Like [`Self::set_password`], but requires the current password when
    /// one is set.
    pub fn change_password(
        &self,
        current: &str,
        new_password: &str,
    ) -> Result<WriteStatus, SecurityError> {
        if self.is_password_set() && !self.verify(current) {
            return Err(SecurityError::IncorrectPassword);
        }
        self.set_password(new_password)
    }

    /// Removes the password, trusted devices and both password
    /// requirements.
    pub fn clear_password(&self) -> WriteStatus {
        self.session_unlocked.store(false, Ordering::Release);
        let status = self.store.update(|batch| {
            batch.remove(keys::SECURITY, PASSWORD_SALT);
            batch.remove(keys::SECURITY, PASSWORD_HASH);
            batch.remove(keys::SECURITY, TRUSTED_DEVICES);
            batch.set(keys::SECURITY, REQUIRE_APP_PASSWORD, false);
            batch.set(keys::SECURITY, REQUIRE_SETTINGS_PASSWORD, false);
        });
        info!("password cleared");
        status
    }

    pub fn device_fingerprint(&self) -> Option<String> {
        self.device.fingerprint()
    }

    pub fn trusted_devices(&self) -> Vec<String> {
        self.store.get_list(keys::SECURITY, TRUSTED_DEVICES)
    }

    pub fn is_trusted_device(&self) -> bool {
        self.device_fingerprint()
            .is_some_and(|token| self.trusted_devices().contains(&token))
    }

    /// Adds this device to the trusted list. `None` when the device has no
    /// fingerprint or is already trusted.
    pub fn remember_device(&self) -> Option<WriteStatus> {
        let token = self.device_fingerprint()?;
        let mut devices = self.trusted_devices();
        if devices.contains(&token) {
            return None;
        }
        devices.push(token);
        Some(self.store.set(keys::SECURITY, TRUSTED_DEVICES, devices))
    }

    pub fn clear_trusted_devices(&self) -> WriteStatus {
        self.store.remove(keys::SECURITY, TRUSTED_DEVICES)
    }

    pub fn protected_apps(&self) -> Vec<String> {
        self.store.get_list(keys::SECURITY, PROTECTED_APPS)
    }

    pub fn is_protected(&self, key: &str) -> bool {
        let key = key.replace('\\', "/");
        self.protected_apps().iter().any(|item| *item == key)
    }

    pub fn set_protected(&self, key: &str, protected: bool) -> WriteStatus {
        let key = key.replace('\\', "/");
        let mut apps = self.protected_apps();
        apps.retain(|item| *item != key);
        if protected {
            apps.push(key);
        }
        self.store.set(keys::SECURITY, PROTECTED_APPS, apps)
    }

    pub fn require_app_password(&self) -> bool {
        self.store
            .get_bool(keys::SECURITY, REQUIRE_APP_PASSWORD, false)
    }

    pub fn require_settings_password(&self) -> bool {
        self.store
            .get_bool(keys::SECURITY, REQUIRE_SETTINGS_PASSWORD, false)
    }

    pub fn set_require_app_password(&self, enabled: bool) -> Result<WriteStatus, SecurityError> {
        self.set_requirement(REQUIRE_APP_PASSWORD, enabled)
    }

    pub fn set_require_settings_password(
        &self,
        enabled: bool,
    ) -> Result<WriteStatus, SecurityError> {
        self.set_requirement(REQUIRE_SETTINGS_PASSWORD, enabled)
    }

    fn set_requirement(&self, key: &str, enabled: bool) -> Result<WriteStatus, SecurityError> {
        if enabled && !self.is_password_set() {
            return Err(SecurityError::NoPassword);
        }
        Ok(self.store.set(keys::SECURITY, key, enabled))
    }

    /// Whether one successful unlock should cover the rest of the session.
    pub fn app_session_unlock(&self) -> bool {
        let fallback = self
            .store
            .get_bool(keys::SECURITY, LEGACY_SESSION_UNLOCK, false);
        self.store
            .get_bool(keys::SECURITY, APP_SESSION_UNLOCK, fallback)
    }

    pub fn set_app_session_unlock(&self, enabled: bool) -> WriteStatus {
        if !enabled {
            self.session_unlocked.store(false, Ordering::Release);
        }
        self.store.update(|batch| {
            batch.set(keys::SECURITY, APP_SESSION_UNLOCK, enabled);
            batch.set(keys::SECURITY, LEGACY_SESSION_UNLOCK, SettingValue::Null);
        })
    }

    pub fn is_session_unlocked(&self) -> bool {
        self.session_unlocked.load(Ordering::Acquire)
    }

    /// Forgets the session unlock, e.g. when the launcher is locked again.
    pub fn lock_session(&self) {
        self.session_unlocked.store(false, Ordering::Release);
    }

    /// Gate for opening the launcher.
    ///
    /// Trusted devices and an active session unlock pass without a prompt.
    pub fn authorize_app_open<P: PasswordPrompt + ?Sized>(&self, prompt: &mut P) -> GateOutcome {
        if !self.require_app_password() || !self.is_password_set() {
            return GateOutcome::Allowed;
        }
        if self.is_trusted_device() {
            return GateOutcome::Allowed;
        }
        let session_unlock = self.app_session_unlock();
        if session_unlock && self.is_session_unlocked() {
            return GateOutcome::Allowed;
        }
        let offer_remember = self.device_fingerprint().is_some();
        match prompt_until_verified(prompt, PromptPurpose::AppOpen, offer_remember, |password| {
            self.verify(password)
        }) {
            Some(remember_device) => {
                if remember_device {
                    self.remember_device();
                }
                if session_unlock {
                    self.session_unlocked.store(true, Ordering::Release);
                }
                GateOutcome::Allowed
            }
            None => GateOutcome::Cancelled,
        }
    }

    /// Gate for launching `key`. Protected apps always need a fresh
    /// password, whatever the unlock state.
    pub fn authorize_launch<P: PasswordPrompt + ?Sized>(
        &self,
        key: &str,
        prompt: &mut P,
    ) -> GateOutcome {
        if !self.is_password_set() || !self.is_protected(key) {
            return GateOutcome::Allowed;
        }
        let purpose = PromptPurpose::Launch { key };
        match prompt_until_verified(prompt, purpose, false, |password| self.verify(password)) {
            Some(_) => GateOutcome::Allowed,
            None => GateOutcome::Cancelled,
        }
    }

    pub fn authorize_settings<P: PasswordPrompt + ?Sized>(&self, prompt: &mut P) -> GateOutcome {
        if !self.require_settings_password() || !self.is_password_set() {
            return GateOutcome::Allowed;
        }
        match prompt_until_verified(prompt, PromptPurpose::Settings, false, |password| {
            self.verify(password)
        }) {
            Some(_) => GateOutcome::Allowed,
            None => GateOutcome::Cancelled,
        }
    }
}
