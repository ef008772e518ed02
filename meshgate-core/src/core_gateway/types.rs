//! Core data types for the gateway layer

use crate::config::IdentityConfig;
use crate::core_identity::{FullIdentity, Principal};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Delivery state of a message; the only mutable field of [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Queued, not yet handed to the transport
    Pending,
    /// Landed in the recipient's inbox (local) or accepted by the wire
    Delivered,
    /// Gave up after exhausting delivery attempts
    Failed,
}

/// One message in an inbox or outbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Sending principal
    pub from: Principal,
    /// Receiving principal
    pub to: Principal,
    /// Sender's nick, when the transport knew it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_nick: Option<String>,
    /// Message body
    pub content: String,
    /// Creation time, milliseconds since epoch
    pub timestamp: u64,
    /// Delivery state
    pub status: MessageStatus,
}

impl Message {
    /// Create a fresh pending message
    pub fn new(from: Principal, to: Principal, content: impl Into<String>) -> Self {
        Message {
            id: Uuid::new_v4().simple().to_string(),
            from,
            to,
            from_nick: None,
            content: content.into(),
            timestamp: now_millis(),
            status: MessageStatus::Pending,
        }
    }

    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.from_nick = Some(nick.into());
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }
}

/// Entry in one identity's peer list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    /// Peer's principal
    pub principal: Principal,
    /// Transport address (opaque to the core)
    pub address: String,
    /// Local alias for addressing the peer by a short name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Last time the peer was seen, milliseconds since epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

/// In-memory runtime record for one active identity
///
/// Exclusively owned by `IdentityManager`. Every piece of mutable
/// per-identity state is reachable only through this record; no two
/// records ever share storage.
#[derive(Debug)]
pub struct LoadedIdentity {
    /// Decrypted key material
    pub identity: FullIdentity,
    /// Roster entry this identity was loaded with
    pub config: IdentityConfig,
    /// This identity's isolated storage directory
    pub data_dir: PathBuf,
    /// Received messages, strict arrival order
    pub inbox: Vec<Message>,
    /// Queued outbound messages, strict submission order
    pub outbox: Vec<Message>,
    /// Known peers
    pub peers: Vec<PeerRecord>,
}

impl LoadedIdentity {
    pub fn principal(&self) -> &Principal {
        &self.identity.principal
    }

    pub fn nick(&self) -> Option<&str> {
        self.config.nick.as_deref()
    }

    /// Messages still waiting for the transport
    pub fn pending_outbox(&self) -> impl Iterator<Item = &Message> {
        self.outbox
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(s: &str) -> Principal {
        Principal::parse(s).unwrap()
    }

    #[test]
    fn new_message_is_pending_with_unique_id() {
        let a = Message::new(principal("stacks:ST1A"), principal("stacks:ST1B"), "hi");
        let b = Message::new(principal("stacks:ST1A"), principal("stacks:ST1B"), "hi");

        assert_eq!(a.status, MessageStatus::Pending);
        assert_ne!(a.id, b.id);
        assert!(a.timestamp > 0);
    }

    #[test]
    fn message_serde_uses_wire_field_names() {
        let msg = Message::new(principal("stacks:ST1A"), principal("stacks:ST1B"), "hello")
            .with_nick("alice");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["from"], "stacks:ST1A");
        assert_eq!(value["fromNick"], "alice");
        assert_eq!(value["status"], "pending");

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn peer_record_serde_round_trip() {
        let peer = PeerRecord {
            principal: principal("stacks:ST1PEER"),
            address: "203.0.113.9:9000".into(),
            alias: Some("buddy".into()),
            last_seen: Some(now_millis()),
        };
        let json = serde_json::to_string(&peer).unwrap();
        assert!(json.contains("lastSeen"));

        let back: PeerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peer);
    }
}
