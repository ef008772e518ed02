//! Command contract tests
//!
//! Drives the daemon through the same JSON request/response shapes an
//! external CLI/IPC layer would use.

use meshgate_core::config::{GatewayConfig, GatewayPaths, CONFIG_VERSION};
use meshgate_core::core_daemon::{CommandRequest, CommandResponse, Daemon, FilePasswords};
use meshgate_core::core_gateway::MessageStatus;
use meshgate_core::core_router::MessageRouter;
use meshgate_core::test_utils::{write_identity_files, TestIdentity};
use meshgate_core::IdentityManager;
use tempfile::TempDir;

fn started_gateway(identities: &[&TestIdentity]) -> (TempDir, Daemon) {
    let dir = TempDir::new().unwrap();
    let paths = GatewayPaths::new(dir.path());

    for identity in identities {
        write_identity_files(&paths, identity);
    }

    let config = GatewayConfig {
        version: CONFIG_VERSION,
        p2p_port: 9000,
        identities: identities.iter().map(|t| t.config.clone()).collect(),
    };
    config.save(&paths).unwrap();

    let mut daemon = Daemon::new(config, IdentityManager::new(paths.clone()), MessageRouter::new());
    daemon.start(&FilePasswords::new(paths)).unwrap();
    (dir, daemon)
}

/// Parse a raw JSON request line the way an IPC layer would
fn request(raw: &str) -> CommandRequest {
    serde_json::from_str(raw).unwrap()
}

fn execute_raw(daemon: &mut Daemon, raw: &str) -> CommandResponse {
    daemon.execute(request(raw))
}

#[test]
fn send_between_cohosted_identities_delivers_locally() {
    let alice = TestIdentity::generate("alice");
    let bob = TestIdentity::generate("bob");
    let (_dir, mut daemon) = started_gateway(&[&alice, &bob]);

    let raw = format!(
        r#"{{"cmd":"send","to":"{}","content":"hi bob","as":"alice"}}"#,
        bob.principal()
    );
    let response = execute_raw(&mut daemon, &raw);
    assert!(response.ok, "send failed: {:?}", response.error);
    let data = response.data.unwrap();
    assert_eq!(data["status"], "queued");

    // landed in bob's inbox without any transport involved
    let response = execute_raw(&mut daemon, r#"{"cmd":"inbox","as":"bob"}"#);
    let inbox = response.data.unwrap();
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["content"], "hi bob");
    assert_eq!(inbox[0]["status"], "delivered");

    // and alice's outbox copy is marked delivered
    let response = execute_raw(&mut daemon, r#"{"cmd":"outbox","as":"alice"}"#);
    let outbox = response.data.unwrap();
    assert_eq!(outbox[0]["status"], "delivered");

    // nothing leaked into alice's inbox
    let response = execute_raw(&mut daemon, r#"{"cmd":"inbox","as":"alice"}"#);
    assert_eq!(response.data.unwrap().as_array().unwrap().len(), 0);
}

#[test]
fn send_to_remote_recipient_queues_pending() {
    let alice = TestIdentity::generate("alice");
    let (_dir, mut daemon) = started_gateway(&[&alice]);

    let response = execute_raw(
        &mut daemon,
        r#"{"cmd":"send","to":"stacks:ST1REMOTE","content":"hello out there"}"#,
    );
    assert!(response.ok);

    let outbox = &daemon.manager().get_identity("alice").unwrap().outbox;
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].status, MessageStatus::Pending);
}

#[test]
fn send_resolves_peer_alias() {
    let alice = TestIdentity::generate("alice");
    let bob = TestIdentity::generate("bob");
    let (_dir, mut daemon) = started_gateway(&[&alice, &bob]);

    let raw = format!(
        r#"{{"cmd":"peer_add","principal":"{}","address":"203.0.113.7:9000","alias":"bobby","as":"alice"}}"#,
        bob.principal()
    );
    assert!(execute_raw(&mut daemon, &raw).ok);

    let response = execute_raw(
        &mut daemon,
        r#"{"cmd":"send","to":"bobby","content":"via alias","as":"alice"}"#,
    );
    assert!(response.ok, "{:?}", response.error);

    let inbox = &daemon.manager().get_identity("bob").unwrap().inbox;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].content, "via alias");
}

#[test]
fn send_with_unknown_alias_fails() {
    let alice = TestIdentity::generate("alice");
    let (_dir, mut daemon) = started_gateway(&[&alice]);

    let response = execute_raw(
        &mut daemon,
        r#"{"cmd":"send","to":"nobody-i-know","content":"hi"}"#,
    );
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("Unknown recipient"));
}

#[test]
fn selector_resolution_uses_default_and_nick() {
    let alice = TestIdentity::generate("alice");
    let bob = TestIdentity::generate("bob");
    let (_dir, mut daemon) = started_gateway(&[&alice, &bob]);

    // no selector: default identity is the first loaded (alice)
    let response = execute_raw(&mut daemon, r#"{"cmd":"status"}"#);
    let data = response.data.unwrap();
    assert_eq!(data["principal"], alice.principal().as_str());
    assert_eq!(data["p2pPort"], 9000);
    assert_eq!(data["loadedIdentities"].as_array().unwrap().len(), 2);

    // nick selector
    let response = execute_raw(&mut daemon, r#"{"cmd":"status","as":"bob"}"#);
    assert_eq!(response.data.unwrap()["principal"], bob.principal().as_str());

    // unknown selector is a structured error
    let response = execute_raw(&mut daemon, r#"{"cmd":"inbox","as":"mallory"}"#);
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("Identity not found: mallory"));
}

#[test]
fn recv_filters_by_since() {
    let alice = TestIdentity::generate("alice");
    let bob = TestIdentity::generate("bob");
    let (_dir, mut daemon) = started_gateway(&[&alice, &bob]);

    let raw = format!(
        r#"{{"cmd":"send","to":"{}","content":"early","as":"alice"}}"#,
        bob.principal()
    );
    execute_raw(&mut daemon, &raw);

    let cutoff = daemon.manager().get_identity("bob").unwrap().inbox[0].timestamp;

    let raw = format!(
        r#"{{"cmd":"send","to":"{}","content":"late","as":"alice"}}"#,
        bob.principal()
    );
    // make sure the second message lands strictly after the cutoff
    std::thread::sleep(std::time::Duration::from_millis(5));
    execute_raw(&mut daemon, &raw);

    let raw = format!(r#"{{"cmd":"recv","since":{},"as":"bob"}}"#, cutoff);
    let response = execute_raw(&mut daemon, &raw);
    let messages = response.data.unwrap();
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["content"], "late");

    // without since, everything comes back
    let response = execute_raw(&mut daemon, r#"{"cmd":"recv","as":"bob"}"#);
    assert_eq!(response.data.unwrap().as_array().unwrap().len(), 2);
}

#[test]
fn peer_lifecycle() {
    let alice = TestIdentity::generate("alice");
    let (_dir, mut daemon) = started_gateway(&[&alice]);

    let response = execute_raw(
        &mut daemon,
        r#"{"cmd":"peer_add","principal":"stacks:ST1PEER","address":"198.51.100.1:9000","alias":"pal"}"#,
    );
    assert!(response.ok);
    let peer = response.data.unwrap();
    assert_eq!(peer["principal"], "stacks:ST1PEER");
    assert_eq!(peer["alias"], "pal");

    let response = execute_raw(&mut daemon, r#"{"cmd":"peers"}"#);
    assert_eq!(response.data.unwrap().as_array().unwrap().len(), 1);

    let response = execute_raw(
        &mut daemon,
        r#"{"cmd":"peer_remove","principal":"stacks:ST1PEER"}"#,
    );
    assert!(response.ok);

    let response = execute_raw(&mut daemon, r#"{"cmd":"peers"}"#);
    assert_eq!(response.data.unwrap().as_array().unwrap().len(), 0);

    // malformed principal is rejected up front
    let response = execute_raw(
        &mut daemon,
        r#"{"cmd":"peer_add","principal":"not-a-principal","address":"x"}"#,
    );
    assert!(!response.ok);
}

#[test]
fn status_counts_pending_outbox_only() {
    let alice = TestIdentity::generate("alice");
    let bob = TestIdentity::generate("bob");
    let (_dir, mut daemon) = started_gateway(&[&alice, &bob]);

    // one local (delivered immediately), one remote (stays pending)
    let raw = format!(
        r#"{{"cmd":"send","to":"{}","content":"local","as":"alice"}}"#,
        bob.principal()
    );
    execute_raw(&mut daemon, &raw);
    execute_raw(
        &mut daemon,
        r#"{"cmd":"send","to":"stacks:ST1REMOTE","content":"remote","as":"alice"}"#,
    );

    let response = execute_raw(&mut daemon, r#"{"cmd":"status","as":"alice"}"#);
    let data = response.data.unwrap();
    assert_eq!(data["outboxPending"], 1);
    assert_eq!(data["inboxCount"], 0);
}

#[test]
fn stop_command_flushes_and_reports() {
    let alice = TestIdentity::generate("alice");
    let (_dir, mut daemon) = started_gateway(&[&alice]);

    let response = execute_raw(&mut daemon, r#"{"cmd":"stop"}"#);
    assert!(response.ok);
    assert_eq!(response.data.unwrap()["status"], "stopping");
    assert!(daemon.manager().is_empty());
    assert!(daemon.coordinator().is_shutting_down());
}

#[test]
fn commands_after_stop_report_no_identities() {
    let alice = TestIdentity::generate("alice");
    let (_dir, mut daemon) = started_gateway(&[&alice]);
    execute_raw(&mut daemon, r#"{"cmd":"stop"}"#);

    let response = execute_raw(&mut daemon, r#"{"cmd":"inbox"}"#);
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("No identities loaded"));
}
