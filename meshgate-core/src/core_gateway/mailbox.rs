//! JSON state files backing an identity's inbox, outbox, and peer list
//!
//! Each list is one JSON array in the identity's own directory. Writes go
//! through a temp file followed by a rename, so a crash mid-write can
//! never leave a half-written state file behind; the previous file
//! survives intact.

use super::errors::GatewayError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const INBOX_FILE: &str = "inbox.json";
pub const OUTBOX_FILE: &str = "outbox.json";
pub const PEERS_FILE: &str = "peers.json";

/// Read a JSON list state file
///
/// A missing file is an empty list (fresh identity). An unreadable or
/// corrupt file is also treated as empty, with a warning.
pub fn read_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(items) => items,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt state file");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read state file");
            Vec::new()
        }
    }
}

/// Persist a JSON list state file atomically (temp file, then rename)
pub fn write_list_atomic<T: Serialize>(path: &Path, items: &[T]) -> Result<(), GatewayError> {
    let contents = serde_json::to_string_pretty(items)?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents.as_bytes())?;
    fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_gateway::types::{Message, MessageStatus};
    use crate::core_identity::Principal;
    use tempfile::TempDir;

    fn sample(content: &str) -> Message {
        Message::new(
            Principal::parse("stacks:ST1FROM").unwrap(),
            Principal::parse("stacks:ST1TO").unwrap(),
            content,
        )
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let messages: Vec<Message> = read_list(&dir.path().join(INBOX_FILE));
        assert!(messages.is_empty());
    }

    #[test]
    fn round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OUTBOX_FILE);

        let messages = vec![sample("first"), sample("second"), sample("third")];
        write_list_atomic(&path, &messages).unwrap();

        let loaded: Vec<Message> = read_list(&path);
        assert_eq!(loaded, messages);
        assert_eq!(loaded[0].content, "first");
        assert_eq!(loaded[2].content, "third");
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PEERS_FILE);
        fs::write(&path, b"{not json").unwrap();

        let messages: Vec<Message> = read_list(&path);
        assert!(messages.is_empty());
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INBOX_FILE);

        write_list_atomic(&path, &[sample("old")]).unwrap();
        let updated = vec![sample("new").with_status(MessageStatus::Delivered)];
        write_list_atomic(&path, &updated).unwrap();

        let loaded: Vec<Message> = read_list(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "new");
        assert_eq!(loaded[0].status, MessageStatus::Delivered);
    }

    #[test]
    fn no_temp_file_survives_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INBOX_FILE);
        write_list_atomic(&path, &[sample("x")]).unwrap();

        assert!(!dir.path().join("inbox.tmp").exists());
    }
}
