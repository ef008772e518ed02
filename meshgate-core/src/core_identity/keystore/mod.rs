//! Keystores for encrypted identity material
//!
//! The gateway core never implements key derivation or wallet semantics;
//! it only needs to turn a password into decrypted `FullIdentity`
//! material, and to persist that material encrypted at rest. This module
//! is that boundary.

use crate::core_identity::identity::FullIdentity;
use secrecy::SecretString;
use thiserror::Error;

mod file_keystore;
mod memory_keystore;

pub use file_keystore::{FileKeystore, IDENTITY_FILE};
pub use memory_keystore::MemoryKeystore;

/// Keystore errors
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Identity file not found: {0}")]
    NotFound(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Identity serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Storage for one identity's encrypted key material
pub trait Keystore {
    /// Whether identity material has been stored
    fn exists(&self) -> bool;

    /// Decrypt and return the identity material
    fn load(&self, password: &SecretString) -> Result<FullIdentity, KeystoreError>;

    /// Encrypt and persist the identity material
    fn save(&self, identity: &FullIdentity, password: &SecretString)
        -> Result<(), KeystoreError>;
}
