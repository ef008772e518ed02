//! Transport boundary
//!
//! The P2P wire protocol (connection handshake, peer exchange, NAT
//! traversal) lives outside this crate. The daemon only needs one thing
//! from it: a way to hand over an outbound message. Inbound traffic
//! flows the other way, through `Daemon::deliver_inbound`.

use crate::core_gateway::Message;
use async_trait::async_trait;
use thiserror::Error;

/// Transport-level delivery failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Transport failure: {0}")]
    Other(String),
}

/// Outbound half of the wire transport
#[async_trait]
pub trait Transport: Send {
    /// Hand one message to the wire for delivery to `message.to`
    async fn deliver(&mut self, message: &Message) -> Result<(), TransportError>;
}
