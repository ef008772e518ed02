//! Test fixtures for assembling gateways in tests
//!
//! Factory helpers for on-disk identities, plus mock implementations of
//! the transport and wake boundaries.

use crate::config::{GatewayPaths, IdentityConfig};
use crate::core_daemon::{Transport, TransportError, WakeMode, WakeNotifier};
use crate::core_gateway::Message;
use crate::core_identity::{FileKeystore, FullIdentity, Keystore, Principal};
use async_trait::async_trait;
use secrecy::SecretString;
use std::fs;
use std::sync::Mutex;

/// Default password all generated test identities are encrypted with
pub const TEST_PASSWORD: &str = "test-password-123";

/// A generated identity plus the roster entry and password to load it
pub struct TestIdentity {
    pub identity: FullIdentity,
    pub config: IdentityConfig,
    password: SecretString,
}

impl TestIdentity {
    /// Generate a fresh identity with the given nick and default config
    /// (autoload, local access, wildcard ACL, wake enabled)
    pub fn generate(nick: &str) -> Self {
        let identity = FullIdentity::generate(Some(nick.to_string()));
        let config = IdentityConfig::new(identity.principal.clone()).with_nick(nick);
        TestIdentity {
            identity,
            config,
            password: SecretString::new(TEST_PASSWORD.to_string()),
        }
    }

    /// Replace the ACL
    pub fn allowed_peers(mut self, peers: Vec<String>) -> Self {
        self.config.allowed_remote_peers = peers;
        self
    }

    /// Disable the wake hook for this identity
    pub fn without_wake(mut self) -> Self {
        self.config.openclaw_wake = false;
        self
    }

    pub fn principal(&self) -> Principal {
        self.identity.principal.clone()
    }

    pub fn password(&self) -> SecretString {
        self.password.clone()
    }
}

/// Materialize a test identity inside a gateway store: creates the
/// identity directory, the encrypted `identity.enc`, and the `password`
/// file the daemon's default password source reads
pub fn write_identity_files(paths: &GatewayPaths, identity: &TestIdentity) {
    let dir = paths.identity_dir(&identity.identity.principal);
    fs::create_dir_all(&dir).unwrap();

    FileKeystore::new(&dir)
        .save(&identity.identity, &identity.password)
        .unwrap();
    fs::write(dir.join("password"), TEST_PASSWORD).unwrap();
}

/// Transport double that records deliveries and can be told to fail
#[derive(Default)]
pub struct MockTransport {
    /// Messages successfully handed over, in order
    pub delivered: Vec<Message>,
    /// Number of upcoming deliveries to fail
    pub fail_next: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` delivery attempts, then succeed
    pub fn failing(n: usize) -> Self {
        MockTransport {
            delivered: Vec::new(),
            fail_next: n,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn deliver(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(TransportError::Unreachable(message.to.to_string()));
        }
        self.delivered.push(message.clone());
        Ok(())
    }
}

/// Wake double that records every notification
#[derive(Default)]
pub struct RecordingWake {
    notifications: Mutex<Vec<(Message, WakeMode)>>,
}

impl RecordingWake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<(Message, WakeMode)> {
        std::mem::take(&mut *self.notifications.lock().unwrap())
    }
}

impl WakeNotifier for RecordingWake {
    fn notify(&self, message: &Message, mode: WakeMode) {
        self.notifications.lock().unwrap().push((message.clone(), mode));
    }
}
