//! Gateway management CLI
//!
//! Operates on the on-disk gateway store only: initializing gateway
//! mode, managing the identity roster, validating the config. Talking to
//! a running daemon is the job of a separate IPC client; this binary
//! never assumes one is running.
//!
//! All output is structured JSON (`{ok, data?, error?}`) with a non-zero
//! exit status on failure.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use meshgate_core::config::{is_gateway_mode, GatewayConfig, GatewayPaths, IdentityConfig};
use meshgate_core::core_identity::{FileKeystore, FullIdentity, Keystore};
use meshgate_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use secrecy::SecretString;
use serde_json::json;
use std::fs;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "meshgate")]
#[command(author, version, about = "Multi-identity P2P messaging gateway", long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Override the store root (defaults to $MESHGATE_DATA_DIR or ~/.meshgate)
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize gateway mode with a fresh identity
    Init {
        /// P2P listen port
        #[arg(short, long, default_value_t = 9000)]
        port: u32,

        /// Nickname for the initial identity
        #[arg(short, long)]
        nick: Option<String>,

        /// Password to encrypt the identity (min 12 chars)
        #[arg(long)]
        password: String,

        /// Also write the password file so the daemon can autoload
        #[arg(long)]
        store_password: bool,
    },

    /// Manage the identity roster
    #[command(subcommand)]
    Identity(IdentityCommand),

    /// Validate the gateway configuration
    Validate,
}

#[derive(Subcommand, Debug)]
enum IdentityCommand {
    /// List configured identities
    List,

    /// Create a new identity and add it to the roster
    Add {
        /// Nickname for the identity
        #[arg(short, long)]
        nick: Option<String>,

        /// Password to encrypt the identity (min 12 chars)
        #[arg(long)]
        password: String,

        /// Comma-separated allowed peer principals (* for all)
        #[arg(long)]
        allow_peers: Option<String>,

        /// Do not autoload this identity on daemon start
        #[arg(long)]
        no_autoload: bool,

        /// Also write the password file so the daemon can autoload
        #[arg(long)]
        store_password: bool,
    },

    /// Remove an identity from the roster (files are kept)
    Remove {
        /// Principal or nickname
        selector: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = LogLevel::from_str(&args.log_level).unwrap_or(LogLevel::Warn);
    let _ = init_logging_with_config(LogConfig::new(level).json_format(args.json_logs));

    let paths = match &args.data_dir {
        Some(dir) => GatewayPaths::new(dir.as_str()),
        None => GatewayPaths::resolve(),
    };

    match run(args.command, &paths) {
        Ok(data) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"ok": true, "data": data}))
                    .unwrap_or_else(|_| r#"{"ok":true}"#.to_string())
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"ok": false, "error": e.to_string()}))
                    .unwrap_or_else(|_| r#"{"ok":false}"#.to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, paths: &GatewayPaths) -> Result<serde_json::Value> {
    match command {
        Command::Init {
            port,
            nick,
            password,
            store_password,
        } => {
            if is_gateway_mode(paths) {
                return Err(anyhow!(
                    "Gateway mode already initialized at {}",
                    paths.config_path().display()
                ));
            }

            let identity = create_identity(paths, nick.clone(), &password, store_password)?;
            let config = GatewayConfig::initial(identity.principal.clone(), nick, port);
            config.save(paths)?;

            info!(principal = %identity.principal, "Gateway mode initialized");
            Ok(json!({
                "principal": identity.principal.as_str(),
                "p2pPort": port,
                "configPath": paths.config_path(),
            }))
        }

        Command::Identity(IdentityCommand::List) => {
            let config = GatewayConfig::load(paths)?;
            Ok(json!({
                "identities": config.identities,
                "count": config.identities.len(),
            }))
        }

        Command::Identity(IdentityCommand::Add {
            nick,
            password,
            allow_peers,
            no_autoload,
            store_password,
        }) => {
            let mut config = GatewayConfig::load(paths)?;

            let identity = create_identity(paths, nick.clone(), &password, store_password)?;
            let mut entry = IdentityConfig::new(identity.principal.clone());
            entry.nick = nick;
            entry.autoload = !no_autoload;
            if let Some(peers) = allow_peers {
                entry.allowed_remote_peers =
                    peers.split(',').map(|p| p.trim().to_string()).collect();
            }

            config.add_identity(entry.clone())?;
            config.save(paths)?;

            info!(principal = %identity.principal, "Identity added");
            Ok(json!({"identity": entry}))
        }

        Command::Identity(IdentityCommand::Remove { selector }) => {
            let mut config = GatewayConfig::load(paths)?;
            let removed = config.remove_identity(&selector)?;
            config.save(paths)?;

            info!(principal = %removed.principal, "Identity removed from config");
            Ok(json!({
                "removed": removed.principal.as_str(),
                "note": "Identity files are not deleted, only removed from config",
            }))
        }

        Command::Validate => {
            let config = GatewayConfig::load(paths)?;
            Ok(json!({
                "valid": true,
                "identities": config.identities.len(),
                "p2pPort": config.p2p_port,
            }))
        }
    }
}

/// Generate a fresh identity and persist it into its own directory
fn create_identity(
    paths: &GatewayPaths,
    nick: Option<String>,
    password: &str,
    store_password: bool,
) -> Result<FullIdentity> {
    if password.len() < 12 {
        return Err(anyhow!("Password must be at least 12 characters"));
    }

    let identity = FullIdentity::generate(nick);
    let dir = paths.identity_dir(&identity.principal);
    fs::create_dir_all(&dir)?;

    let secret = SecretString::new(password.to_string());
    FileKeystore::new(&dir).save(&identity, &secret)?;

    if store_password {
        fs::write(dir.join("password"), password)?;
    }

    Ok(identity)
}
