//! Gateway scenario harness
//!
//! Spins up a real gateway in a temporary store, runs a scripted
//! exchange between two co-hosted identities plus one unreachable remote
//! peer, and prints what happened. Handy for eyeballing the full
//! lifecycle without wiring up a transport.

use anyhow::Result;
use clap::Parser;
use meshgate_core::config::{GatewayConfig, GatewayPaths, CONFIG_VERSION};
use meshgate_core::core_daemon::{CommandRequest, FilePasswords, OutboundPolicy};
use meshgate_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use meshgate_core::test_utils::{write_identity_files, MockTransport, TestIdentity};
use meshgate_core::{Daemon, IdentityManager, MessageRouter};
use tempfile::TempDir;

#[derive(Parser, Debug)]
#[command(name = "test-harness")]
#[command(about = "Meshgate scenario harness", long_about = None)]
struct Args {
    /// P2P port written into the scenario config
    #[arg(short, long, default_value_t = 9000)]
    port: u32,

    /// Transport failures to inject before deliveries succeed
    #[arg(long, default_value_t = 1)]
    flaky_failures: usize,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = args.log_level.parse().unwrap_or(LogLevel::Info);
    let _ = init_logging_with_config(LogConfig::new(level));
    meshgate_core::metrics::init_metrics();

    let store = TempDir::new()?;
    let paths = GatewayPaths::new(store.path());

    // two co-hosted identities; bob only accepts mail from alice
    let alice = TestIdentity::generate("alice");
    let bob =
        TestIdentity::generate("bob").allowed_peers(vec![alice.principal().to_string()]);
    write_identity_files(&paths, &alice);
    write_identity_files(&paths, &bob);

    let config = GatewayConfig {
        version: CONFIG_VERSION,
        p2p_port: args.port,
        identities: vec![alice.config.clone(), bob.config.clone()],
    };
    config.save(&paths)?;

    let mut daemon = Daemon::new(
        config,
        IdentityManager::new(paths.clone()),
        MessageRouter::new(),
    )
    .with_policy(OutboundPolicy { max_attempts: 3 });
    daemon.start(&FilePasswords::new(paths))?;

    // local delivery between co-hosted identities
    let send = daemon.execute(CommandRequest::Send {
        to: bob.principal().to_string(),
        content: "hello from alice".into(),
        selector: Some("alice".into()),
    });
    println!("send alice->bob: {}", serde_json::to_string(&send)?);

    // a remote recipient the mock transport has to work for
    let send = daemon.execute(CommandRequest::Send {
        to: "stacks:ST1REMOTEPEER".into(),
        content: "hello remote".into(),
        selector: Some("bob".into()),
    });
    println!("send bob->remote: {}", serde_json::to_string(&send)?);

    let mut transport = MockTransport::failing(args.flaky_failures);
    loop {
        let stats = daemon.pump_outbound(&mut transport).await?;
        println!(
            "pump: delivered={} failed={}",
            stats.delivered, stats.failed
        );
        let pending: usize = daemon
            .manager()
            .all_identities()
            .map(|r| r.pending_outbox().count())
            .sum();
        if pending == 0 {
            break;
        }
    }

    let status = daemon.execute(CommandRequest::Status {
        selector: Some("bob".into()),
    });
    println!("status bob: {}", serde_json::to_string_pretty(&status)?);

    let stop = daemon.execute(CommandRequest::Stop);
    println!("stop: {}", serde_json::to_string(&stop)?);

    Ok(())
}
