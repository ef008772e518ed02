//! Identity registry for gateway mode
//!
//! `IdentityManager` is the authoritative, exclusively-owned registry of
//! active identities, indexed by principal and (secondarily) by nick.
//! Each identity's mutable state lives only inside its `LoadedIdentity`
//! record, and each record's `data_dir` is a distinct path derived from
//! its principal, so operations on one identity can never observe or
//! mutate another's state.
//!
//! Registry operations are synchronous and run to completion: an ACL
//! check against this registry is atomic with respect to any other
//! in-process mutation. I/O happens only inside `load_identity`,
//! `unload_identity`, and the explicit `save_*` calls.

use super::errors::GatewayError;
use super::mailbox::{self, INBOX_FILE, OUTBOX_FILE, PEERS_FILE};
use super::types::{LoadedIdentity, Message, MessageStatus, PeerRecord};
use crate::config::{GatewayPaths, IdentityConfig};
use crate::core_identity::{FileKeystore, Keystore, Principal};
use crate::metrics;
use secrecy::SecretString;
use std::collections::HashMap;
use tracing::{debug, info};

/// Registry of loaded identities, keyed by principal and nick
pub struct IdentityManager {
    paths: GatewayPaths,
    /// principal -> record
    identities: HashMap<Principal, LoadedIdentity>,
    /// nick -> principal, secondary unique index over the same records
    nicknames: HashMap<String, Principal>,
    /// Principals in the order they were loaded
    load_order: Vec<Principal>,
}

impl IdentityManager {
    /// Create an empty registry over the given store root
    pub fn new(paths: GatewayPaths) -> Self {
        IdentityManager {
            paths,
            identities: HashMap::new(),
            nicknames: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    pub fn paths(&self) -> &GatewayPaths {
        &self.paths
    }

    /// Load an identity from its per-identity directory
    ///
    /// All checks and I/O happen before the registry is touched, so a
    /// failure at any step leaves the registry exactly as it was. There
    /// is no partially-loaded identity.
    pub fn load_identity(
        &mut self,
        principal: &Principal,
        password: &SecretString,
        config: IdentityConfig,
    ) -> Result<(), GatewayError> {
        if self.identities.contains_key(principal) {
            return Err(GatewayError::AlreadyLoaded(principal.clone()));
        }

        if let Some(nick) = &config.nick {
            if self.nicknames.contains_key(nick) {
                return Err(GatewayError::NickInUse(nick.clone()));
            }
        }

        let data_dir = self.paths.identity_dir(principal);
        if !data_dir.is_dir() {
            return Err(GatewayError::DirectoryNotFound(data_dir));
        }

        let identity = FileKeystore::new(&data_dir).load(password)?;
        if identity.principal != *principal {
            return Err(GatewayError::PrincipalMismatch {
                expected: principal.clone(),
                found: identity.principal,
            });
        }

        let inbox: Vec<Message> = mailbox::read_list(&data_dir.join(INBOX_FILE));
        let outbox: Vec<Message> = mailbox::read_list(&data_dir.join(OUTBOX_FILE));
        let peers: Vec<PeerRecord> = mailbox::read_list(&data_dir.join(PEERS_FILE));

        let record = LoadedIdentity {
            identity,
            config,
            data_dir,
            inbox,
            outbox,
            peers,
        };

        if let Some(nick) = &record.config.nick {
            self.nicknames.insert(nick.clone(), principal.clone());
        }
        self.identities.insert(principal.clone(), record);
        self.load_order.push(principal.clone());

        info!(principal = %principal, "Loaded identity");
        metrics::record_identity_loaded(self.identities.len());
        Ok(())
    }

    /// Flush an identity's state to disk and remove it from the registry
    ///
    /// Idempotent: unloading a principal that is not loaded is a no-op.
    /// A flush failure aborts the unload and the identity stays
    /// registered, since memory is authoritative until persisted.
    pub fn unload_identity(&mut self, principal: &Principal) -> Result<(), GatewayError> {
        if !self.identities.contains_key(principal) {
            debug!(principal = %principal, "Unload requested for identity that is not loaded");
            return Ok(());
        }

        self.save_inbox(principal)?;
        self.save_outbox(principal)?;
        self.save_peers(principal)?;

        if let Some(record) = self.identities.remove(principal) {
            if let Some(nick) = &record.config.nick {
                self.nicknames.remove(nick);
            }
        }
        self.load_order.retain(|p| p != principal);

        info!(principal = %principal, "Unloaded identity");
        metrics::record_identity_unloaded(self.identities.len());
        Ok(())
    }

    /// Flush and unload every identity, in load order
    pub fn unload_all(&mut self) -> Result<(), GatewayError> {
        for principal in self.load_order.clone() {
            self.unload_identity(&principal)?;
        }
        Ok(())
    }

    /// Look up a loaded identity by principal or nick
    pub fn get_identity(&self, selector: &str) -> Option<&LoadedIdentity> {
        if let Some(record) = self.identities.get(selector) {
            return Some(record);
        }
        self.nicknames
            .get(selector)
            .and_then(|principal| self.identities.get(principal))
    }

    /// Mutable variant of [`get_identity`](Self::get_identity)
    pub fn get_identity_mut(&mut self, selector: &str) -> Option<&mut LoadedIdentity> {
        let principal = if self.identities.contains_key(selector) {
            None
        } else {
            self.nicknames.get(selector).cloned()
        };

        match principal {
            Some(p) => self.identities.get_mut(&p),
            None => self.identities.get_mut(selector),
        }
    }

    /// Whether a principal or nick is currently loaded
    pub fn is_loaded(&self, selector: &str) -> bool {
        self.get_identity(selector).is_some()
    }

    /// All loaded identities, in load order
    pub fn all_identities(&self) -> impl Iterator<Item = &LoadedIdentity> {
        self.load_order
            .iter()
            .filter_map(|principal| self.identities.get(principal))
    }

    /// Principals in load order
    pub fn load_order(&self) -> &[Principal] {
        &self.load_order
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Append a message to an identity's inbox (in-memory only;
    /// durability is explicit via [`save_inbox`](Self::save_inbox))
    pub fn add_to_inbox(
        &mut self,
        principal: &Principal,
        message: Message,
    ) -> Result<(), GatewayError> {
        let record = self
            .identities
            .get_mut(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;
        record.inbox.push(message);
        Ok(())
    }

    /// Append a message to an identity's outbox (in-memory only)
    pub fn add_to_outbox(
        &mut self,
        principal: &Principal,
        message: Message,
    ) -> Result<(), GatewayError> {
        let record = self
            .identities
            .get_mut(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;
        record.outbox.push(message);
        Ok(())
    }

    /// Update the status of an outbox message; returns whether it existed
    pub fn mark_outbox_status(
        &mut self,
        principal: &Principal,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<bool, GatewayError> {
        let record = self
            .identities
            .get_mut(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;

        match record.outbox.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert or merge a peer record in an identity's peer list
    ///
    /// An existing record (matched by peer principal) keeps fields the
    /// update leaves unset.
    pub fn add_or_update_peer(
        &mut self,
        principal: &Principal,
        peer: PeerRecord,
    ) -> Result<(), GatewayError> {
        let record = self
            .identities
            .get_mut(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;

        match record
            .peers
            .iter_mut()
            .find(|p| p.principal == peer.principal)
        {
            Some(existing) => {
                existing.address = peer.address;
                if peer.alias.is_some() {
                    existing.alias = peer.alias;
                }
                if peer.last_seen.is_some() {
                    existing.last_seen = peer.last_seen;
                }
            }
            None => record.peers.push(peer),
        }
        Ok(())
    }

    /// Drop a peer from an identity's peer list; returns whether it existed
    pub fn remove_peer(
        &mut self,
        principal: &Principal,
        peer: &Principal,
    ) -> Result<bool, GatewayError> {
        let record = self
            .identities
            .get_mut(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;

        let before = record.peers.len();
        record.peers.retain(|p| p.principal != *peer);
        Ok(record.peers.len() != before)
    }

    /// Persist an identity's inbox
    pub fn save_inbox(&self, principal: &Principal) -> Result<(), GatewayError> {
        let record = self
            .identities
            .get(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;
        mailbox::write_list_atomic(&record.data_dir.join(INBOX_FILE), &record.inbox)
    }

    /// Persist an identity's outbox
    pub fn save_outbox(&self, principal: &Principal) -> Result<(), GatewayError> {
        let record = self
            .identities
            .get(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;
        mailbox::write_list_atomic(&record.data_dir.join(OUTBOX_FILE), &record.outbox)
    }

    /// Persist an identity's peer list
    pub fn save_peers(&self, principal: &Principal) -> Result<(), GatewayError> {
        let record = self
            .identities
            .get(principal)
            .ok_or_else(|| GatewayError::NotLoaded(principal.to_string()))?;
        mailbox::write_list_atomic(&record.data_dir.join(PEERS_FILE), &record.peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_identity_files, TestIdentity};
    use tempfile::TempDir;

    fn setup() -> (TempDir, GatewayPaths, IdentityManager) {
        let dir = TempDir::new().unwrap();
        let paths = GatewayPaths::new(dir.path());
        let manager = IdentityManager::new(paths.clone());
        (dir, paths, manager)
    }

    fn loaded(manager: &mut IdentityManager, paths: &GatewayPaths, nick: &str) -> TestIdentity {
        let test_identity = TestIdentity::generate(nick);
        write_identity_files(paths, &test_identity);
        manager
            .load_identity(
                &test_identity.principal(),
                &test_identity.password(),
                test_identity.config.clone(),
            )
            .unwrap();
        test_identity
    }

    #[test]
    fn load_registers_under_both_keys() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");

        assert!(manager.is_loaded(alice.principal().as_str()));
        assert!(manager.is_loaded("alice"));

        let by_nick = manager.get_identity("alice").unwrap();
        assert_eq!(by_nick.principal(), &alice.principal());
        assert!(by_nick.inbox.is_empty());
        assert!(by_nick.outbox.is_empty());
        assert!(by_nick.peers.is_empty());
    }

    #[test]
    fn load_fails_without_identity_directory() {
        let (_dir, _paths, mut manager) = setup();
        let principal = Principal::parse("stacks:ST1NONEXISTENT").unwrap();
        let config = IdentityConfig::new(principal.clone());

        let err = manager
            .load_identity(&principal, &SecretString::new("pw".into()), config)
            .unwrap_err();
        assert!(matches!(err, GatewayError::DirectoryNotFound(_)));
        assert!(!manager.is_loaded(principal.as_str()));
    }

    #[test]
    fn load_twice_fails_with_already_loaded() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");

        let err = manager
            .load_identity(
                &alice.principal(),
                &alice.password(),
                alice.config.clone(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("already loaded"));
    }

    #[test]
    fn nick_collision_fails_and_leaves_registry_unchanged() {
        let (_dir, paths, mut manager) = setup();
        loaded(&mut manager, &paths, "alice");

        let impostor = TestIdentity::generate("alice");
        write_identity_files(&paths, &impostor);

        let err = manager
            .load_identity(
                &impostor.principal(),
                &impostor.password(),
                impostor.config.clone(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("already in use"));

        // all-or-nothing: the second identity must not be registered at all
        assert!(!manager.is_loaded(impostor.principal().as_str()));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn wrong_password_fails_and_leaves_registry_empty() {
        let (_dir, paths, mut manager) = setup();
        let alice = TestIdentity::generate("alice");
        write_identity_files(&paths, &alice);

        let err = manager
            .load_identity(
                &alice.principal(),
                &SecretString::new("not-the-password".into()),
                alice.config.clone(),
            )
            .unwrap_err();
        assert!(matches!(err, GatewayError::Keystore(_)));
        assert!(manager.is_empty());
    }

    #[test]
    fn unload_is_idempotent() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");

        manager.unload_identity(&alice.principal()).unwrap();
        assert!(!manager.is_loaded(alice.principal().as_str()));
        assert!(!manager.is_loaded("alice"));

        // second unload of the same principal is a silent no-op
        manager.unload_identity(&alice.principal()).unwrap();
        assert!(!manager.is_loaded(alice.principal().as_str()));

        // as is unloading a principal that never was loaded
        let stranger = Principal::parse("stacks:ST1NEVER").unwrap();
        manager.unload_identity(&stranger).unwrap();
    }

    #[test]
    fn unload_flushes_state() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");
        let bob = loaded(&mut manager, &paths, "bob");

        manager
            .add_to_inbox(
                &alice.principal(),
                Message::new(bob.principal(), alice.principal(), "hello"),
            )
            .unwrap();
        manager.unload_identity(&alice.principal()).unwrap();

        // a fresh load sees the flushed message
        manager
            .load_identity(&alice.principal(), &alice.password(), alice.config.clone())
            .unwrap();
        let record = manager.get_identity("alice").unwrap();
        assert_eq!(record.inbox.len(), 1);
        assert_eq!(record.inbox[0].content, "hello");
    }

    #[test]
    fn mailboxes_are_isolated_between_identities() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");
        let bob = loaded(&mut manager, &paths, "bob");

        manager
            .add_to_inbox(
                &alice.principal(),
                Message::new(bob.principal(), alice.principal(), "Hello Alice"),
            )
            .unwrap();
        manager
            .add_to_inbox(
                &bob.principal(),
                Message::new(alice.principal(), bob.principal(), "Hello Bob"),
            )
            .unwrap();
        manager
            .add_to_outbox(
                &alice.principal(),
                Message::new(alice.principal(), bob.principal(), "From Alice"),
            )
            .unwrap();

        let alice_record = manager.get_identity("alice").unwrap();
        let bob_record = manager.get_identity("bob").unwrap();

        assert_eq!(alice_record.inbox.len(), 1);
        assert_eq!(alice_record.inbox[0].content, "Hello Alice");
        assert_eq!(alice_record.outbox.len(), 1);

        assert_eq!(bob_record.inbox.len(), 1);
        assert_eq!(bob_record.inbox[0].content, "Hello Bob");
        assert!(bob_record.outbox.is_empty());

        // distinct storage on disk as well
        assert_ne!(alice_record.data_dir, bob_record.data_dir);
    }

    #[test]
    fn save_inbox_round_trips_through_fresh_load() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");
        let sender = Principal::parse("stacks:ST1SENDER").unwrap();

        for n in 0..3 {
            manager
                .add_to_inbox(
                    &alice.principal(),
                    Message::new(sender.clone(), alice.principal(), format!("msg {}", n)),
                )
                .unwrap();
        }
        manager.save_inbox(&alice.principal()).unwrap();

        // a second manager over the same store sees the same ordered list
        let mut fresh = IdentityManager::new(paths.clone());
        fresh
            .load_identity(&alice.principal(), &alice.password(), alice.config.clone())
            .unwrap();
        let record = fresh.get_identity("alice").unwrap();
        let contents: Vec<_> = record.inbox.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2"]);
    }

    #[test]
    fn mailbox_ops_require_loaded_identity() {
        let (_dir, _paths, mut manager) = setup();
        let ghost = Principal::parse("stacks:ST1GHOST").unwrap();
        let message = Message::new(ghost.clone(), ghost.clone(), "boo");

        assert!(matches!(
            manager.add_to_inbox(&ghost, message.clone()),
            Err(GatewayError::NotLoaded(_))
        ));
        assert!(matches!(
            manager.add_to_outbox(&ghost, message),
            Err(GatewayError::NotLoaded(_))
        ));
        assert!(matches!(
            manager.save_inbox(&ghost),
            Err(GatewayError::NotLoaded(_))
        ));
    }

    #[test]
    fn peer_upsert_merges_by_principal() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");
        let peer_principal = Principal::parse("stacks:ST1PEER").unwrap();

        manager
            .add_or_update_peer(
                &alice.principal(),
                PeerRecord {
                    principal: peer_principal.clone(),
                    address: "198.51.100.1:9000".into(),
                    alias: Some("buddy".into()),
                    last_seen: None,
                },
            )
            .unwrap();
        manager
            .add_or_update_peer(
                &alice.principal(),
                PeerRecord {
                    principal: peer_principal.clone(),
                    address: "198.51.100.2:9000".into(),
                    alias: None,
                    last_seen: Some(42),
                },
            )
            .unwrap();

        let record = manager.get_identity("alice").unwrap();
        assert_eq!(record.peers.len(), 1);
        assert_eq!(record.peers[0].address, "198.51.100.2:9000");
        // unset fields in the update keep the previous values
        assert_eq!(record.peers[0].alias.as_deref(), Some("buddy"));
        assert_eq!(record.peers[0].last_seen, Some(42));

        assert!(manager.remove_peer(&alice.principal(), &peer_principal).unwrap());
        assert!(!manager.remove_peer(&alice.principal(), &peer_principal).unwrap());
    }

    #[test]
    fn get_identity_mut_resolves_both_keys() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");

        manager.get_identity_mut("alice").unwrap().peers.push(PeerRecord {
            principal: Principal::parse("stacks:ST1PEER").unwrap(),
            address: "198.51.100.9:9000".into(),
            alias: None,
            last_seen: None,
        });

        let by_principal = manager
            .get_identity_mut(alice.principal().as_str())
            .unwrap();
        assert_eq!(by_principal.peers.len(), 1);
        assert!(manager.get_identity_mut("stranger").is_none());
    }

    #[test]
    fn load_order_is_preserved() {
        let (_dir, paths, mut manager) = setup();
        let alice = loaded(&mut manager, &paths, "alice");
        let bob = loaded(&mut manager, &paths, "bob");
        let carol = loaded(&mut manager, &paths, "carol");

        let order: Vec<_> = manager.all_identities().map(|r| r.principal().clone()).collect();
        assert_eq!(order, vec![alice.principal(), bob.principal(), carol.principal()]);

        manager.unload_identity(&bob.principal()).unwrap();
        let order: Vec<_> = manager.all_identities().map(|r| r.principal().clone()).collect();
        assert_eq!(order, vec![alice.principal(), carol.principal()]);
    }
}
