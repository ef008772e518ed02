//! Gateway configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config version: {0} (expected 1)")]
    InvalidVersion(u32),

    #[error("Invalid p2pPort: {0} (must be between 1 and 65535)")]
    InvalidPort(u32),

    #[error("At least one identity is required")]
    NoIdentities,

    #[error("Duplicate principal: {0}")]
    DuplicatePrincipal(String),

    #[error("Duplicate nickname: {0}")]
    DuplicateNick(String),

    #[error("Invalid principal {0:?}: must start with \"stacks:\"")]
    InvalidPrincipal(String),

    #[error("Invalid nickname {0:?}: only letters, numbers, underscores, and hyphens are allowed")]
    InvalidNick(String),

    #[error("Invalid allowedRemotePeers entry {0:?}: must be \"*\" or a principal")]
    InvalidAllowedPeer(String),

    #[error("Gateway config not found at {0}")]
    NotFound(PathBuf),

    #[error("Identity not found in config: {0}")]
    UnknownIdentity(String),

    #[error("Cannot remove last identity. At least one identity is required")]
    LastIdentity,

    #[error("Failed to parse gateway config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
