//! Message routing and admission control
//!
//! Stateless decision logic over the identity registry. The router holds
//! no state of its own: every method is a pure function of the registry
//! it is handed, which keeps admission decisions trivially atomic with
//! respect to registry mutation (nothing here ever suspends).
//!
//! Admission is fail-closed: an identity whose `allowedRemotePeers` list
//! is empty, or simply does not name a sender exactly, rejects that
//! sender. There is no prefix or partial matching.

use crate::core_gateway::{IdentityManager, LoadedIdentity, Message};
use crate::core_identity::Principal;
use crate::metrics;
use thiserror::Error;
use tracing::debug;

/// Routing rejections
///
/// These are structured results, not failures of the router itself: the
/// message is simply never delivered and the reason travels back to the
/// caller. No retry happens here.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No loaded identity found for {0}")]
    NoIdentity(String),

    #[error("Sender {sender} not in allowedRemotePeers for {to}")]
    NotAllowed { sender: Principal, to: Principal },

    #[error("No identities loaded")]
    NoIdentities,

    /// Registry refused the delivery (should not happen after a
    /// successful resolve, but never panics)
    #[error(transparent)]
    Registry(#[from] crate::core_gateway::GatewayError),
}

/// Outcome of a successful inbound routing decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReceipt {
    /// Principal whose inbox received the message
    pub principal: Principal,
    /// Nick of the receiving identity, if configured
    pub nick: Option<String>,
    /// Whether the receiving identity wants the wake hook fired
    pub wake: bool,
}

/// Stateless router over an `IdentityManager`
///
/// A unit struct rather than free functions so the daemon can take it as
/// an explicit constructor-injected dependency.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        MessageRouter
    }

    /// Admit (or reject) an inbound message from an authenticated sender
    ///
    /// On acceptance the message is appended to the target's inbox and a
    /// receipt describing the target comes back. Persistence is the
    /// caller's responsibility.
    pub fn route_inbound(
        &self,
        manager: &mut IdentityManager,
        message: Message,
        sender: &Principal,
    ) -> Result<RouteReceipt, RouteError> {
        let target = match manager.get_identity(message.to.as_str()) {
            Some(record) => record,
            None => {
                metrics::record_inbound_rejected("unknown_recipient");
                return Err(RouteError::NoIdentity(message.to.to_string()));
            }
        };

        if !target.config.admits(sender) {
            metrics::record_inbound_rejected("acl");
            debug!(
                sender = %sender,
                to = %target.principal(),
                "Rejected inbound message: sender not in allowedRemotePeers"
            );
            return Err(RouteError::NotAllowed {
                sender: sender.clone(),
                to: target.principal().clone(),
            });
        }

        let receipt = RouteReceipt {
            principal: target.principal().clone(),
            nick: target.nick().map(str::to_string),
            wake: target.config.openclaw_wake,
        };

        manager.add_to_inbox(&receipt.principal, message)?;
        metrics::record_inbound_accepted();
        Ok(receipt)
    }

    /// The identity used when a caller supplies no selector: the first
    /// identity registered, in load order (not config array order)
    pub fn default_identity<'a>(&self, manager: &'a IdentityManager) -> Option<&'a LoadedIdentity> {
        manager.all_identities().next()
    }

    /// Resolve an optional selector to an identity
    ///
    /// No selector means the default identity; otherwise a dual-key
    /// principal/nick lookup. Absence is `None`, never an error.
    pub fn resolve_identity<'a>(
        &self,
        manager: &'a IdentityManager,
        selector: Option<&str>,
    ) -> Option<&'a LoadedIdentity> {
        match selector {
            Some(sel) => manager.get_identity(sel),
            None => self.default_identity(manager),
        }
    }

    /// Find the source identity for an outbound message
    ///
    /// `message.from` picks the source; an empty `from` falls back to the
    /// default identity.
    pub fn route_outbound<'a>(
        &self,
        manager: &'a IdentityManager,
        message: &Message,
    ) -> Result<&'a LoadedIdentity, RouteError> {
        if manager.is_empty() {
            return Err(RouteError::NoIdentities);
        }

        if message.from.as_str().is_empty() {
            return self.default_identity(manager).ok_or(RouteError::NoIdentities);
        }

        manager
            .get_identity(message.from.as_str())
            .ok_or_else(|| RouteError::NoIdentity(message.from.to_string()))
    }

    /// Whether local (same-host) callers may act as this identity
    pub fn is_local_access_allowed(&self, manager: &IdentityManager, selector: &str) -> bool {
        manager
            .get_identity(selector)
            .map(|record| record.config.allow_local)
            .unwrap_or(false)
    }

    /// All identities whose ACL admits the given remote peer
    pub fn identities_for_peer<'a>(
        &self,
        manager: &'a IdentityManager,
        peer: &Principal,
    ) -> Vec<&'a LoadedIdentity> {
        manager
            .all_identities()
            .filter(|record| record.config.admits(peer))
            .collect()
    }
}
