//! File-based keystore with encryption at rest
//!
//! Encrypted File Format (`identity.enc`):
//! ```text
//! [Magic: 8 bytes "MGID0001"]
//! [Version: 1 byte]
//! [Salt: 16 bytes]
//! [Nonce: 12 bytes]
//! [Ciphertext + AEAD tag: variable]
//! ```
//!
//! The plaintext is the `FullIdentity` JSON payload. A wrong password
//! surfaces as an AEAD tag mismatch, reported as `InvalidPassword`.

use super::{Keystore, KeystoreError};
use crate::core_identity::identity::FullIdentity;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Argon2, Params};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::{Path, PathBuf};

/// Magic header for encrypted identity files
const MAGIC_HEADER: &[u8; 8] = b"MGID0001";

/// Current envelope format version
const FORMAT_VERSION: u8 = 1;

/// Salt length for the Argon2 KDF
const SALT_LEN: usize = 16;

/// Nonce length for AES-GCM
const NONCE_LEN: usize = 12;

/// Header size: magic(8) + version(1) + salt(16) + nonce(12)
const HEADER_SIZE: usize = 8 + 1 + SALT_LEN + NONCE_LEN;

/// Name of the encrypted identity file inside an identity directory
pub const IDENTITY_FILE: &str = "identity.enc";

/// Keystore reading/writing `identity.enc` in one identity directory
pub struct FileKeystore {
    dir: PathBuf,
}

impl FileKeystore {
    /// Open a keystore rooted at the given identity directory
    ///
    /// The directory is not created; `IdentityManager` requires it to
    /// exist before a load is attempted.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileKeystore { dir: dir.into() }
    }

    fn identity_path(&self) -> PathBuf {
        self.dir.join(IDENTITY_FILE)
    }

    /// Write file atomically (write to temp, then rename)
    fn write_atomic(path: &Path, data: &[u8]) -> Result<(), KeystoreError> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

impl Keystore for FileKeystore {
    fn exists(&self) -> bool {
        self.identity_path().exists()
    }

    fn load(&self, password: &SecretString) -> Result<FullIdentity, KeystoreError> {
        let path = self.identity_path();
        if !path.exists() {
            return Err(KeystoreError::NotFound(path.display().to_string()));
        }

        let sealed = fs::read(&path)?;
        let plaintext = open_envelope(&sealed, password)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| KeystoreError::Serialization(e.to_string()))
    }

    fn save(&self, identity: &FullIdentity, password: &SecretString)
        -> Result<(), KeystoreError>
    {
        let plaintext = serde_json::to_vec(identity)
            .map_err(|e| KeystoreError::Serialization(e.to_string()))?;
        let sealed = seal_envelope(&plaintext, password)?;
        Self::write_atomic(&self.identity_path(), &sealed)
    }
}

/// Encrypt a payload into the envelope format
pub(super) fn seal_envelope(
    plaintext: &[u8],
    password: &SecretString,
) -> Result<Vec<u8>, KeystoreError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let key = derive_key(password, &salt)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| KeystoreError::Encryption(format!("Invalid key: {}", e)))?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| KeystoreError::Encryption(format!("AEAD failure: {}", e)))?;

    let mut sealed = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    sealed.extend_from_slice(MAGIC_HEADER);
    sealed.push(FORMAT_VERSION);
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt an envelope back into its payload
pub(super) fn open_envelope(
    sealed: &[u8],
    password: &SecretString,
) -> Result<Vec<u8>, KeystoreError> {
    if sealed.len() < HEADER_SIZE + 16 {
        // 16 = minimum AEAD tag size
        return Err(KeystoreError::Decryption("Truncated file".to_string()));
    }

    if &sealed[0..8] != MAGIC_HEADER {
        return Err(KeystoreError::Decryption("Invalid magic header".to_string()));
    }

    let version = sealed[8];
    if version != FORMAT_VERSION {
        return Err(KeystoreError::Decryption(format!(
            "Unsupported version: {}",
            version
        )));
    }

    let salt = &sealed[9..9 + SALT_LEN];
    let nonce_bytes = &sealed[9 + SALT_LEN..9 + SALT_LEN + NONCE_LEN];
    let ciphertext = &sealed[HEADER_SIZE..];

    let key = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| KeystoreError::Decryption(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        // AEAD tag mismatch = wrong password or corrupted file
        .map_err(|_| KeystoreError::InvalidPassword)
}

/// Derive a 256-bit encryption key from the password using Argon2id
fn derive_key(password: &SecretString, salt: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let params = Params::new(
        19 * 1024, // 19 MiB memory cost
        2,         // 2 iterations
        1,         // 1 thread (for determinism)
        Some(32),  // 32-byte output (256 bits for AES-256)
    )
    .map_err(|e| KeystoreError::Encryption(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = vec![0u8; 32];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| KeystoreError::Encryption(format!("Key derivation failed: {}", e)))?;

    Ok(key)
}
