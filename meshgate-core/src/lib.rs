//! meshgate-core: multi-identity P2P messaging gateway
//!
//! One daemon process hosts several independent identities, each with
//! its own isolated inbox/outbox/peer storage, and enforces per-identity
//! access control on inbound traffic. The wire transport, key
//! derivation, and CLI/IPC framing live outside this crate; everything
//! behind those boundaries lives here.

pub mod config;
pub mod core_daemon;
pub mod core_gateway;
pub mod core_identity;
pub mod core_router;
pub mod logging;
pub mod metrics;
pub mod shutdown;
pub mod test_utils;

pub use config::{GatewayConfig, GatewayPaths, IdentityConfig};
pub use core_daemon::{CommandRequest, CommandResponse, Daemon};
pub use core_gateway::{IdentityManager, Message, MessageStatus};
pub use core_identity::Principal;
pub use core_router::MessageRouter;
