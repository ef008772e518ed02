//! On-disk layout of a gateway store
//!
//! ```text
//! <store-root>/
//!   gateway-config.json
//!   identities/
//!     <principal>/
//!       identity.enc
//!       password            (optional, written by the CLI)
//!       inbox.json
//!       outbox.json
//!       peers.json
//! ```

use crate::core_identity::Principal;
use std::env;
use std::path::{Path, PathBuf};

/// File name of the gateway configuration inside the store root
pub const GATEWAY_CONFIG_FILE: &str = "gateway-config.json";

/// Environment variable overriding the store root
pub const DATA_DIR_ENV: &str = "MESHGATE_DATA_DIR";

/// Resolved store-root paths for one gateway
///
/// Every path a gateway touches derives from here, so two gateways with
/// distinct roots can never share state (and tests can run against temp
/// directories without global setup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaths {
    root: PathBuf,
}

impl GatewayPaths {
    /// Use an explicit store root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GatewayPaths { root: root.into() }
    }

    /// Resolve the default store root: `$MESHGATE_DATA_DIR`, falling
    /// back to `$HOME/.meshgate`, falling back to `./.meshgate`
    pub fn resolve() -> Self {
        if let Some(dir) = env::var_os(DATA_DIR_ENV) {
            return GatewayPaths::new(dir);
        }
        if let Some(home) = env::var_os("HOME") {
            return GatewayPaths::new(PathBuf::from(home).join(".meshgate"));
        }
        GatewayPaths::new(PathBuf::from(".meshgate"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `gateway-config.json`
    pub fn config_path(&self) -> PathBuf {
        self.root.join(GATEWAY_CONFIG_FILE)
    }

    /// Directory holding all per-identity directories
    pub fn identities_dir(&self) -> PathBuf {
        self.root.join("identities")
    }

    /// The isolated directory owned by one identity
    pub fn identity_dir(&self, principal: &Principal) -> PathBuf {
        self.identities_dir().join(principal.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_dirs_are_distinct_per_principal() {
        let paths = GatewayPaths::new("/tmp/meshgate-test");
        let a = Principal::parse("stacks:ST1AAA").unwrap();
        let b = Principal::parse("stacks:ST1BBB").unwrap();

        assert_ne!(paths.identity_dir(&a), paths.identity_dir(&b));
        assert!(paths
            .identity_dir(&a)
            .starts_with(paths.identities_dir()));
    }

    #[test]
    fn config_path_is_under_root() {
        let paths = GatewayPaths::new("/tmp/meshgate-test");
        assert_eq!(
            paths.config_path(),
            PathBuf::from("/tmp/meshgate-test/gateway-config.json")
        );
    }
}
