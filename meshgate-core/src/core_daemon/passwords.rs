//! Password sources for identity autoload
//!
//! Decryption passwords are supplied per principal at startup. Library
//! embedders usually hand passwords in programmatically; the CLI relies
//! on the per-identity `password` file in the identity's directory.

use super::errors::DaemonError;
use crate::config::GatewayPaths;
use crate::core_identity::Principal;
use secrecy::SecretString;
use std::fs;

/// Supplies the decryption password for a principal
pub trait PasswordSource {
    fn password_for(&self, principal: &Principal) -> Result<SecretString, DaemonError>;
}

/// Reads `<identity-dir>/password`, trimming trailing whitespace
pub struct FilePasswords {
    paths: GatewayPaths,
}

impl FilePasswords {
    pub fn new(paths: GatewayPaths) -> Self {
        FilePasswords { paths }
    }
}

impl PasswordSource for FilePasswords {
    fn password_for(&self, principal: &Principal) -> Result<SecretString, DaemonError> {
        let path = self.paths.identity_dir(principal).join("password");
        let raw = fs::read_to_string(&path).map_err(|e| DaemonError::Password {
            principal: principal.clone(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        Ok(SecretString::new(raw.trim_end().to_string()))
    }
}

/// One fixed password for every principal (tests, single-operator setups)
pub struct StaticPassword(pub SecretString);

impl PasswordSource for StaticPassword {
    fn password_for(&self, _principal: &Principal) -> Result<SecretString, DaemonError> {
        Ok(self.0.clone())
    }
}
