//! Daemon orchestration surface
//!
//! Startup sequencing, the command contract, and the bridges to the
//! external transport and wake integrations.

mod command;
mod daemon;
mod errors;
mod passwords;
mod transport;
mod wake;

pub use command::{CommandRequest, CommandResponse};
pub use daemon::{Daemon, OutboundPolicy, PumpStats};
pub use errors::DaemonError;
pub use passwords::{FilePasswords, PasswordSource, StaticPassword};
pub use transport::{Transport, TransportError};
pub use wake::{wake_mode_for, NoopWake, WakeMode, WakeNotifier};
