use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("password is incorrect")]
    IncorrectPassword,
    #[error("set a password before requiring one")]
    NoPassword,
    #[error("password could not be used as a key")]
    KeyDerivation,
}

/// Stored password material, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
}

impl Credential {
    /// Derives a credential for `password` with a fresh random salt.
    pub fn create(password: &str) -> Result<Self, SecurityError> {
        if password.is_empty() {
            return Err(SecurityError::EmptyPassword);
        }
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let hash = hash_password(password, &salt)?;
        Ok(Self { salt, hash })
    }

    pub fn matches(&self, password: &str) -> bool {
        match hash_password(password, &self.salt) {
            Ok(candidate) => constant_time_eq(&candidate, &self.hash),
            Err(_) => false,
        }
    }
}

/// Hex PBKDF2-HMAC-SHA256 of `password`.
///
/// The salt text is hex-decoded; text that is not valid hex is used as raw
/// UTF-8 bytes.
pub fn hash_password(password: &str, salt: &str) -> Result<String, SecurityError> {
    let salt_bytes = hex::decode(salt).unwrap_or_else(|_| salt.as_bytes().to_vec());
    let key = pbkdf2_hmac_sha256(password.as_bytes(), &salt_bytes, PBKDF2_ITERATIONS)?;
    Ok(hex::encode(key))
}

/// Single-block PBKDF2 (RFC 8018) with HMAC-SHA256, yielding 32 bytes.
pub fn pbkdf2_hmac_sha256(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<[u8; KEY_LEN], SecurityError> {
    let prf = HmacSha256::new_from_slice(password).map_err(|_| SecurityError::KeyDerivation)?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = [0u8; KEY_LEN];
    block.copy_from_slice(&mac.finalize().into_bytes());
    let mut output = block;

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&block);
        block.copy_from_slice(&mac.finalize().into_bytes());
        for (out, byte) in output.iter_mut().zip(block.iter()) {
            *out ^= byte;
        }
    }
    Ok(output)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pbkdf2_matches_reference_vectors() {
        assert_eq!(
            hex::encode(pbkdf2_hmac_sha256(b"password", b"salt", 1).unwrap()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
        assert_eq!(
            hex::encode(pbkdf2_hmac_sha256(b"password", b"salt", 2).unwrap()),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
        assert_eq!(
            hex::encode(pbkdf2_hmac_sha256(b"password", b"salt", 4096).unwrap()),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn credential_round_trip() {
        let credential = Credential::create("secret").unwrap();
        assert_eq!(credential.salt.len(), SALT_LEN * 2);
        assert_eq!(credential.hash.len(), KEY_LEN * 2);
        assert!(credential.matches("secret"));
        assert!(!credential.matches("wrong"));
        assert!(!credential.matches(""));
    }

    #[test]
    fn fresh_salt_each_time() {
        let a = Credential::create("secret").unwrap();
        let b = Credential::create("secret").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn non_hex_salt_is_used_verbatim() {
        assert_eq!(
            hash_password("pw", "not-hex!").unwrap(),
            hex::encode(pbkdf2_hmac_sha256(b"pw", b"not-hex!", PBKDF2_ITERATIONS).unwrap())
        );
    }

    #[test]
    fn empty_password_is_rejected() {
        assert_eq!(Credential::create(""), Err(SecurityError::EmptyPassword));
    }
}
