//! Gateway configuration
//!
//! The identity roster and network policy of one gateway: pure data plus
//! validation, persisted as `gateway-config.json` in the store root.
//! Field names stay camelCase on disk so existing gateway stores keep
//! working.

use crate::core_identity::Principal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

mod error;
mod paths;

pub use error::ConfigError;
pub use paths::{GatewayPaths, DATA_DIR_ENV, GATEWAY_CONFIG_FILE};

/// The only supported config format version
pub const CONFIG_VERSION: u32 = 1;

/// ACL entry admitting any remote sender
pub const WILDCARD_PEER: &str = "*";

/// Per-identity configuration inside the gateway roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    /// Principal this entry configures
    pub principal: Principal,

    /// Optional nick, unique across the roster (`[A-Za-z0-9_-]+`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,

    /// Load this identity automatically on daemon start
    #[serde(default = "default_true")]
    pub autoload: bool,

    /// Allow local (same-host) clients to act as this identity
    #[serde(default = "default_true")]
    pub allow_local: bool,

    /// Remote principals allowed to deliver inbound messages; `"*"`
    /// admits anyone. An empty list rejects all remote senders.
    #[serde(default)]
    pub allowed_remote_peers: Vec<String>,

    /// Fire the wake hook when an inbound message lands in this inbox
    #[serde(default = "default_true")]
    pub openclaw_wake: bool,
}

fn default_true() -> bool {
    true
}

impl IdentityConfig {
    /// Config entry with the defaults the CLI uses for a new identity
    pub fn new(principal: Principal) -> Self {
        IdentityConfig {
            principal,
            nick: None,
            autoload: true,
            allow_local: true,
            allowed_remote_peers: vec![WILDCARD_PEER.to_string()],
            openclaw_wake: true,
        }
    }

    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = Some(nick.into());
        self
    }

    pub fn with_allowed_peers(mut self, peers: Vec<String>) -> Self {
        self.allowed_remote_peers = peers;
        self
    }

    /// Whether the ACL admits the given remote sender
    pub fn admits(&self, sender: &Principal) -> bool {
        self.allowed_remote_peers
            .iter()
            .any(|entry| entry == WILDCARD_PEER || entry == sender.as_str())
    }
}

/// Validated identity roster plus network policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Format version, must be [`CONFIG_VERSION`]
    pub version: u32,

    /// P2P listen port (1-65535)
    pub p2p_port: u32,

    /// Identity roster, non-empty
    pub identities: Vec<IdentityConfig>,
}

impl GatewayConfig {
    /// Single-identity bootstrap configuration
    pub fn initial(principal: Principal, nick: Option<String>, p2p_port: u32) -> Self {
        let mut identity = IdentityConfig::new(principal);
        identity.nick = nick;
        GatewayConfig {
            version: CONFIG_VERSION,
            p2p_port,
            identities: vec![identity],
        }
    }

    /// Validate the whole configuration
    ///
    /// Checks, in order: version, port range, non-empty roster, each
    /// entry's principal/nick/ACL shape, then cross-entry uniqueness of
    /// principals and nicks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::InvalidVersion(self.version));
        }

        if self.p2p_port == 0 || self.p2p_port > u16::MAX as u32 {
            return Err(ConfigError::InvalidPort(self.p2p_port));
        }

        if self.identities.is_empty() {
            return Err(ConfigError::NoIdentities);
        }

        for identity in &self.identities {
            if !Principal::is_wellformed(identity.principal.as_str()) {
                return Err(ConfigError::InvalidPrincipal(
                    identity.principal.as_str().to_string(),
                ));
            }

            if let Some(nick) = &identity.nick {
                if !is_valid_nick(nick) {
                    return Err(ConfigError::InvalidNick(nick.clone()));
                }
            }

            for entry in &identity.allowed_remote_peers {
                if entry != WILDCARD_PEER && !Principal::is_wellformed(entry) {
                    return Err(ConfigError::InvalidAllowedPeer(entry.clone()));
                }
            }
        }

        let mut principals = std::collections::HashSet::new();
        let mut nicks = std::collections::HashSet::new();
        for identity in &self.identities {
            if !principals.insert(identity.principal.as_str()) {
                return Err(ConfigError::DuplicatePrincipal(
                    identity.principal.as_str().to_string(),
                ));
            }
            if let Some(nick) = &identity.nick {
                if !nicks.insert(nick.as_str()) {
                    return Err(ConfigError::DuplicateNick(nick.clone()));
                }
            }
        }

        Ok(())
    }

    /// Load and validate the config from the store root
    pub fn load(paths: &GatewayPaths) -> Result<Self, ConfigError> {
        let path = paths.config_path();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }

        let contents = fs::read_to_string(&path)?;
        let config: GatewayConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and persist the config (atomic temp-file-then-rename)
    pub fn save(&self, paths: &GatewayPaths) -> Result<(), ConfigError> {
        self.validate()?;

        fs::create_dir_all(paths.root())?;
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(&paths.config_path(), contents.as_bytes())?;
        Ok(())
    }

    /// Add an identity to the roster
    pub fn add_identity(&mut self, identity: IdentityConfig) -> Result<(), ConfigError> {
        if self
            .identities
            .iter()
            .any(|existing| existing.principal == identity.principal)
        {
            return Err(ConfigError::DuplicatePrincipal(
                identity.principal.as_str().to_string(),
            ));
        }

        self.identities.push(identity);
        self.validate()
    }

    /// Remove an identity by principal or nick
    ///
    /// The identity's on-disk files are untouched; only the roster entry
    /// goes away. Removing the last entry is refused.
    pub fn remove_identity(&mut self, selector: &str) -> Result<IdentityConfig, ConfigError> {
        let index = self
            .identities
            .iter()
            .position(|id| id.principal.as_str() == selector || id.nick.as_deref() == Some(selector))
            .ok_or_else(|| ConfigError::UnknownIdentity(selector.to_string()))?;

        if self.identities.len() == 1 {
            return Err(ConfigError::LastIdentity);
        }

        Ok(self.identities.remove(index))
    }

    /// Find a roster entry by principal or nick
    pub fn find_identity(&self, selector: &str) -> Option<&IdentityConfig> {
        self.identities
            .iter()
            .find(|id| id.principal.as_str() == selector || id.nick.as_deref() == Some(selector))
    }
}

/// Existence predicate on the config file; what to do about the answer
/// belongs to the orchestrator
pub fn is_gateway_mode(paths: &GatewayPaths) -> bool {
    paths.config_path().exists()
}

fn is_valid_nick(nick: &str) -> bool {
    !nick.is_empty()
        && nick
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data)?;
    fs::rename(temp_path, path)
}
