//! Daemon error types

use crate::config::ConfigError;
use crate::core_gateway::GatewayError;
use crate::core_identity::Principal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// Fail-fast startup: one autoload identity failing aborts the start
    #[error("Failed to load autoload identity {principal}: {source}")]
    Autoload {
        principal: Principal,
        source: GatewayError,
    },

    #[error("At least one identity must be loaded to start the daemon")]
    NoIdentities,

    #[error("No password available for {principal}: {reason}")]
    Password {
        principal: Principal,
        reason: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
