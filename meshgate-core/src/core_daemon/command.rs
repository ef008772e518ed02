//! Command contract consumed by external CLI/IPC layers
//!
//! Requests are `{cmd, as?, ...payload}`, responses `{ok, data?, error?}`.
//! The framing (unix socket, pipe, whatever) is the caller's concern;
//! this module only fixes the JSON shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// A request against the daemon
///
/// `as` selects the acting identity by principal or nick; when absent
/// the default identity is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum CommandRequest {
    /// Queue a message for delivery
    Send {
        to: String,
        content: String,
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Fetch inbox messages newer than `since` (ms since epoch)
    Recv {
        #[serde(skip_serializing_if = "Option::is_none")]
        since: Option<u64>,
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Full inbox of the selected identity
    Inbox {
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Full outbox of the selected identity
    Outbox {
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Peer list of the selected identity
    Peers {
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Add or update a peer record
    PeerAdd {
        principal: String,
        address: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Remove a peer record
    PeerRemove {
        principal: String,
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Gateway status snapshot
    Status {
        #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Flush all identities and begin shutdown
    Stop,
}

/// A response from the daemon; `ok` tells which of `data`/`error` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Success carrying a payload
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => CommandResponse {
                ok: true,
                data: Some(value),
                error: None,
            },
            Err(e) => {
                error!(error = %e, "Failed to serialize command response payload");
                CommandResponse::err(format!("Internal serialization error: {}", e))
            }
        }
    }

    /// Success without a payload
    pub fn ok_empty() -> Self {
        CommandResponse {
            ok: true,
            data: None,
            error: None,
        }
    }

    /// Failure with a reason
    pub fn err(message: impl Into<String>) -> Self {
        CommandResponse {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
