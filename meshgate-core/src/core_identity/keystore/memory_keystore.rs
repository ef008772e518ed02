//! In-memory keystore for tests
//!
//! Holds the same sealed envelope bytes as `FileKeystore` would write,
//! without touching disk. Useful for exercising load/decrypt paths in
//! unit tests.

use super::file_keystore::{open_envelope, seal_envelope};
use super::{Keystore, KeystoreError};
use crate::core_identity::identity::FullIdentity;
use secrecy::SecretString;
use std::sync::Mutex;

/// Keystore backed by process memory
#[derive(Default)]
pub struct MemoryKeystore {
    sealed: Mutex<Option<Vec<u8>>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for MemoryKeystore {
    fn exists(&self) -> bool {
        self.sealed
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn load(&self, password: &SecretString) -> Result<FullIdentity, KeystoreError> {
        let guard = self
            .sealed
            .lock()
            .map_err(|_| KeystoreError::Decryption("keystore lock poisoned".to_string()))?;
        let sealed = guard
            .as_ref()
            .ok_or_else(|| KeystoreError::NotFound("<memory>".to_string()))?;

        let plaintext = open_envelope(sealed, password)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| KeystoreError::Serialization(e.to_string()))
    }

    fn save(&self, identity: &FullIdentity, password: &SecretString)
        -> Result<(), KeystoreError>
    {
        let plaintext = serde_json::to_vec(identity)
            .map_err(|e| KeystoreError::Serialization(e.to_string()))?;
        let sealed = seal_envelope(&plaintext, password)?;

        let mut guard = self
            .sealed
            .lock()
            .map_err(|_| KeystoreError::Encryption("keystore lock poisoned".to_string()))?;
        *guard = Some(sealed);
        Ok(())
    }
}
