//! Error types for the gateway layer

use crate::core_identity::{KeystoreError, Principal};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from identity lifecycle and per-identity state operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Principal is already registered
    #[error("Identity {0} is already loaded")]
    AlreadyLoaded(Principal),

    /// Nick collides with an already-registered identity
    #[error("Nickname {0:?} is already in use")]
    NickInUse(String),

    /// Identity directory does not exist; create the identity first
    #[error("Identity directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Operation requires a loaded identity
    #[error("Identity {0} is not loaded")]
    NotLoaded(String),

    /// Decrypted material does not belong to the requested principal
    #[error("Principal mismatch: expected {expected}, found {found}")]
    PrincipalMismatch {
        expected: Principal,
        found: Principal,
    },

    /// Keystore failure while decrypting identity material
    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
