//! Salted digests of login credentials.
//!
//! A cached value or a persisted token is only handed to a request whose
//! credentials hash to the digest recorded at the last successful login.
//! The salt is drawn once per process and the digest never leaves memory.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use telemon_types::Credentials;

/// Hashes credentials with a per-process random salt.
#[derive(Clone)]
pub struct CredentialDigester {
    salt: [u8; 32],
}

impl CredentialDigester {
    pub fn new() -> Self {
        let mut salt = [0u8; 32];
        rand::rng().fill_bytes(&mut salt);
        Self { salt }
    }

    /// SHA-256 over salt, username and password, with length prefixes so
    /// no two distinct pairs share an input.
    pub fn digest(&self, credentials: &Credentials) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        for part in [&credentials.username, &credentials.password] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.finalize().into()
    }

    /// Constant-time comparison of a request's credentials against a
    /// recorded digest.
    pub fn matches(&self, credentials: &Credentials, recorded: &[u8; 32]) -> bool {
        self.digest(credentials)[..].ct_eq(&recorded[..]).into()
    }
}

impl Default for CredentialDigester {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialDigester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialDigester").finish_non_exhaustive()
    }
}
