use sha2::{Digest, Sha256};
use sysinfo::System;

/// The machine and account a session runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub computer: String,
    pub user: String,
}

impl DeviceIdentity {
    pub fn new(computer: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            computer: computer.into(),
            user: user.into(),
        }
    }

    pub fn current() -> Self {
        let computer = std::env::var("COMPUTERNAME")
            .ok()
            .filter(|name| !name.is_empty())
            .or_else(System::host_name)
            .unwrap_or_default();
        let user = ["USERNAME", "USER", "LOGNAME"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|name| !name.is_empty()))
            .unwrap_or_default();
        Self { computer, user }
    }

    /// SHA-256 hex token of `computer|user`, lowercased. `None` when
    /// neither part is known.
    pub fn fingerprint(&self) -> Option<String> {
        if self.computer.trim().is_empty() && self.user.trim().is_empty() {
            return None;
        }
        let source = format!("{}|{}", self.computer, self.user)
            .trim()
            .to_lowercase();
        Some(hex::encode(Sha256::digest(source.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fingerprint_ignores_case() {
        let upper = DeviceIdentity::new("WORKSTATION", "Alex").fingerprint();
        let lower = DeviceIdentity::new("workstation", "alex").fingerprint();
        assert_eq!(upper, lower);
        assert_eq!(upper.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn fingerprint_differs_per_user() {
        assert_ne!(
            DeviceIdentity::new("pc", "a").fingerprint(),
            DeviceIdentity::new("pc", "b").fingerprint()
        );
    }

    #[test]
    fn unknown_identity_has_no_fingerprint() {
        assert_eq!(DeviceIdentity::new("", " ").fingerprint(), None);
    }
}
