//! Gateway daemon orchestration
//!
//! The daemon sequences startup (autoload identities, fail-fast),
//! answers the command contract, and bridges traffic between the wire
//! transport and the router/registry. It owns its `IdentityManager`
//! outright; the router and wake hook are injected at construction so
//! tests can assemble daemons without global state.

use super::command::{CommandRequest, CommandResponse};
use super::errors::DaemonError;
use super::passwords::PasswordSource;
use super::transport::Transport;
use super::wake::{wake_mode_for, NoopWake, WakeNotifier};
use crate::config::GatewayConfig;
use crate::core_gateway::{
    now_millis, GatewayError, IdentityManager, Message, MessageStatus, PeerRecord,
};
use crate::core_identity::Principal;
use crate::core_router::{MessageRouter, RouteError, RouteReceipt};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// What happens to outbound messages the transport keeps refusing
///
/// Each `pump_outbound` pass attempts every pending message once; a
/// message that fails its `max_attempts`-th attempt transitions to
/// `Failed` and stays in the outbox for inspection. Pump cadence (and
/// any backoff between passes) belongs to the embedding process.
#[derive(Debug, Clone, Copy)]
pub struct OutboundPolicy {
    pub max_attempts: u32,
}

impl Default for OutboundPolicy {
    fn default() -> Self {
        OutboundPolicy { max_attempts: 3 }
    }
}

/// Result of one outbound pump pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Messages handed to the transport or delivered locally
    pub delivered: usize,
    /// Messages that exhausted their attempts this pass
    pub failed: usize,
}

/// One gateway process: identity lifecycle + command surface + bridges
pub struct Daemon {
    config: GatewayConfig,
    manager: IdentityManager,
    router: MessageRouter,
    wake: Arc<dyn WakeNotifier>,
    policy: OutboundPolicy,
    events: broadcast::Sender<Message>,
    coordinator: ShutdownCoordinator,
    /// Delivery attempts per outbound message id
    attempts: HashMap<String, u32>,
}

impl Daemon {
    /// Assemble a daemon from its parts; nothing is loaded yet
    pub fn new(config: GatewayConfig, manager: IdentityManager, router: MessageRouter) -> Self {
        let (events, _) = broadcast::channel(256);
        Daemon {
            config,
            manager,
            router,
            wake: Arc::new(NoopWake),
            policy: OutboundPolicy::default(),
            events,
            coordinator: ShutdownCoordinator::new(),
            attempts: HashMap::new(),
        }
    }

    pub fn with_wake(mut self, wake: Arc<dyn WakeNotifier>) -> Self {
        self.wake = wake;
        self
    }

    pub fn with_policy(mut self, policy: OutboundPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn manager(&self) -> &IdentityManager {
        &self.manager
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Subscribe to messages as they land in any inbox
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    /// Load every autoload identity from the config, in array order
    ///
    /// Fail-fast: the first identity that cannot be loaded aborts the
    /// whole start. The daemon never runs with a reduced identity set.
    pub fn start(&mut self, passwords: &dyn PasswordSource) -> Result<(), DaemonError> {
        for identity_config in self.config.identities.clone() {
            if !identity_config.autoload {
                continue;
            }

            let principal = identity_config.principal.clone();
            let password = passwords.password_for(&principal)?;
            self.manager
                .load_identity(&principal, &password, identity_config)
                .map_err(|source| {
                    error!(principal = %principal, error = %source, "Autoload failed, aborting start");
                    DaemonError::Autoload { principal: principal.clone(), source }
                })?;
        }

        let default = self
            .router
            .default_identity(&self.manager)
            .ok_or(DaemonError::NoIdentities)?;
        info!(
            default = %default.principal(),
            loaded = self.manager.len(),
            p2p_port = self.config.p2p_port,
            "Gateway started"
        );
        Ok(())
    }

    /// Flush every identity to disk and signal shutdown
    pub fn stop(&mut self) -> Result<(), DaemonError> {
        self.manager.unload_all()?;
        self.coordinator.shutdown();
        info!("Gateway stopped");
        Ok(())
    }

    /// Inbound bridge: the transport calls this for every wire message,
    /// passing the authenticated sender principal
    ///
    /// Routing (including the ACL check) runs synchronously; on
    /// acceptance the target inbox is persisted, the wake hook fires if
    /// the target asked for it, and the message goes out on the event
    /// channel. A rejection is a structured error, never a retry.
    pub fn deliver_inbound(
        &mut self,
        message: Message,
        sender: &Principal,
    ) -> Result<RouteReceipt, RouteError> {
        let message = message.with_status(MessageStatus::Delivered);
        let receipt = match self.router.route_inbound(&mut self.manager, message.clone(), sender) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(sender = %sender, error = %e, "Inbound message rejected");
                return Err(e);
            }
        };

        self.manager.save_inbox(&receipt.principal)?;

        if receipt.wake {
            self.wake.notify(&message, wake_mode_for(&message.content));
        }
        let _ = self.events.send(message);
        Ok(receipt)
    }

    /// Outbound bridge: push pending messages through the transport,
    /// FIFO per identity, applying the outbound policy
    pub async fn pump_outbound(
        &mut self,
        transport: &mut dyn Transport,
    ) -> Result<PumpStats, GatewayError> {
        let mut stats = PumpStats::default();

        for principal in self.manager.load_order().to_vec() {
            let pending: Vec<Message> = match self.manager.get_identity(principal.as_str()) {
                Some(record) => record.pending_outbox().cloned().collect(),
                None => continue,
            };

            let mut dirty = false;
            for message in pending {
                // a recipient loaded since the send is deliverable locally
                if self.manager.is_loaded(message.to.as_str()) {
                    self.deliver_local(&message)?;
                    stats.delivered += 1;
                    continue;
                }

                match transport.deliver(&message).await {
                    Ok(()) => {
                        self.manager.mark_outbox_status(
                            &principal,
                            &message.id,
                            MessageStatus::Delivered,
                        )?;
                        self.attempts.remove(&message.id);
                        metrics::record_outbound_delivered();
                        stats.delivered += 1;
                        dirty = true;
                    }
                    Err(e) => {
                        let attempts = self.attempts.entry(message.id.clone()).or_insert(0);
                        *attempts += 1;
                        warn!(
                            to = %message.to,
                            attempt = *attempts,
                            error = %e,
                            "Outbound delivery attempt failed"
                        );

                        if *attempts >= self.policy.max_attempts {
                            self.manager.mark_outbox_status(
                                &principal,
                                &message.id,
                                MessageStatus::Failed,
                            )?;
                            self.attempts.remove(&message.id);
                            metrics::record_outbound_failed();
                            stats.failed += 1;
                            dirty = true;
                        }
                    }
                }
            }

            if dirty {
                self.manager.save_outbox(&principal)?;
            }
        }

        Ok(stats)
    }

    /// Execute one command from the external CLI/IPC layer
    ///
    /// Every failure comes back as `{ok: false, error}`; this never
    /// panics and never leaks an Err to the framing layer.
    pub fn execute(&mut self, request: CommandRequest) -> CommandResponse {
        match request {
            CommandRequest::Send {
                to,
                content,
                selector,
            } => self.cmd_send(&to, content, selector.as_deref()),

            CommandRequest::Recv { since, selector } => {
                let record = match self.router.resolve_identity(&self.manager, selector.as_deref())
                {
                    Some(record) => record,
                    None => return CommandResponse::err(selector_error(selector.as_deref())),
                };
                let since = since.unwrap_or(0);
                let messages: Vec<&Message> =
                    record.inbox.iter().filter(|m| m.timestamp > since).collect();
                CommandResponse::ok(messages)
            }

            CommandRequest::Inbox { selector } => {
                match self.router.resolve_identity(&self.manager, selector.as_deref()) {
                    Some(record) => CommandResponse::ok(&record.inbox),
                    None => CommandResponse::err(selector_error(selector.as_deref())),
                }
            }

            CommandRequest::Outbox { selector } => {
                match self.router.resolve_identity(&self.manager, selector.as_deref()) {
                    Some(record) => CommandResponse::ok(&record.outbox),
                    None => CommandResponse::err(selector_error(selector.as_deref())),
                }
            }

            CommandRequest::Peers { selector } => {
                match self.router.resolve_identity(&self.manager, selector.as_deref()) {
                    Some(record) => CommandResponse::ok(&record.peers),
                    None => CommandResponse::err(selector_error(selector.as_deref())),
                }
            }

            CommandRequest::PeerAdd {
                principal,
                address,
                alias,
                selector,
            } => self.cmd_peer_add(&principal, address, alias, selector.as_deref()),

            CommandRequest::PeerRemove {
                principal,
                selector,
            } => self.cmd_peer_remove(&principal, selector.as_deref()),

            CommandRequest::Status { selector } => {
                let identity = self.router.resolve_identity(&self.manager, selector.as_deref());
                let loaded: Vec<_> = self
                    .manager
                    .all_identities()
                    .map(|record| {
                        json!({
                            "principal": record.principal().to_string(),
                            "nick": record.nick(),
                        })
                    })
                    .collect();

                CommandResponse::ok(json!({
                    "principal": identity
                        .map(|r| r.principal().to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    "p2pPort": self.config.p2p_port,
                    "inboxCount": identity.map(|r| r.inbox.len()).unwrap_or(0),
                    "outboxPending": identity.map(|r| r.pending_outbox().count()).unwrap_or(0),
                    "loadedIdentities": loaded,
                }))
            }

            CommandRequest::Stop => match self.stop() {
                Ok(()) => CommandResponse::ok(json!({"status": "stopping"})),
                Err(e) => CommandResponse::err(e.to_string()),
            },
        }
    }

    fn cmd_send(
        &mut self,
        to: &str,
        content: String,
        selector: Option<&str>,
    ) -> CommandResponse {
        let source = match self.router.resolve_identity(&self.manager, selector) {
            Some(record) => record.principal().clone(),
            None => return CommandResponse::err(selector_error(selector)),
        };

        let recipient = match self.resolve_recipient(to) {
            Some(principal) => principal,
            None => return CommandResponse::err(format!("Unknown recipient: {}", to)),
        };

        let message = Message::new(source.clone(), recipient, content);
        if let Err(e) = self.manager.add_to_outbox(&source, message.clone()) {
            return CommandResponse::err(e.to_string());
        }
        if let Err(e) = self.manager.save_outbox(&source) {
            return CommandResponse::err(e.to_string());
        }

        // co-hosted recipient: skip the wire entirely
        if self.manager.is_loaded(message.to.as_str()) {
            if let Err(e) = self.deliver_local(&message) {
                return CommandResponse::err(e.to_string());
            }
        }

        CommandResponse::ok(json!({"id": message.id, "status": "queued"}))
    }

    fn cmd_peer_add(
        &mut self,
        principal: &str,
        address: String,
        alias: Option<String>,
        selector: Option<&str>,
    ) -> CommandResponse {
        let peer_principal = match Principal::parse(principal) {
            Ok(p) => p,
            Err(e) => return CommandResponse::err(e.to_string()),
        };
        let owner = match self.router.resolve_identity(&self.manager, selector) {
            Some(record) => record.principal().clone(),
            None => return CommandResponse::err(selector_error(selector)),
        };

        let peer = PeerRecord {
            principal: peer_principal,
            address,
            alias,
            last_seen: Some(now_millis()),
        };

        if let Err(e) = self.manager.add_or_update_peer(&owner, peer.clone()) {
            return CommandResponse::err(e.to_string());
        }
        if let Err(e) = self.manager.save_peers(&owner) {
            return CommandResponse::err(e.to_string());
        }
        CommandResponse::ok(peer)
    }

    fn cmd_peer_remove(&mut self, principal: &str, selector: Option<&str>) -> CommandResponse {
        let peer_principal = match Principal::parse(principal) {
            Ok(p) => p,
            Err(e) => return CommandResponse::err(e.to_string()),
        };
        let owner = match self.router.resolve_identity(&self.manager, selector) {
            Some(record) => record.principal().clone(),
            None => return CommandResponse::err(selector_error(selector)),
        };

        if let Err(e) = self.manager.remove_peer(&owner, &peer_principal) {
            return CommandResponse::err(e.to_string());
        }
        if let Err(e) = self.manager.save_peers(&owner) {
            return CommandResponse::err(e.to_string());
        }
        CommandResponse::ok_empty()
    }

    /// Deliver a queued message to a co-hosted identity's inbox
    fn deliver_local(&mut self, message: &Message) -> Result<(), GatewayError> {
        let delivered = message.clone().with_status(MessageStatus::Delivered);

        let wants_wake = self
            .manager
            .get_identity(message.to.as_str())
            .map(|record| record.config.openclaw_wake)
            .ok_or_else(|| GatewayError::NotLoaded(message.to.to_string()))?;

        self.manager.add_to_inbox(&message.to, delivered.clone())?;
        self.manager.save_inbox(&message.to)?;

        if self.manager.is_loaded(message.from.as_str()) {
            self.manager
                .mark_outbox_status(&message.from, &message.id, MessageStatus::Delivered)?;
            self.manager.save_outbox(&message.from)?;
        }

        if wants_wake {
            self.wake.notify(&delivered, wake_mode_for(&delivered.content));
        }
        let _ = self.events.send(delivered);
        metrics::record_inbound_accepted();
        Ok(())
    }

    /// Resolve a recipient string: a principal passes through, anything
    /// else is tried as a peer alias across all loaded identities
    fn resolve_recipient(&self, to: &str) -> Option<Principal> {
        if Principal::is_wellformed(to) {
            return Principal::parse(to).ok();
        }
        self.manager
            .all_identities()
            .flat_map(|record| record.peers.iter())
            .find(|peer| peer.alias.as_deref() == Some(to))
            .map(|peer| peer.principal.clone())
    }
}

fn selector_error(selector: Option<&str>) -> String {
    match selector {
        Some(sel) => format!("Identity not found: {}", sel),
        None => "No identities loaded".to_string(),
    }
}
