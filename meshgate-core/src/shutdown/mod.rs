//! Graceful shutdown coordinator

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::info;

/// Broadcast-based shutdown signal shared between the daemon and any
/// loops the embedding process runs (outbound pump, IPC accept loop)
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    stopping: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        ShutdownCoordinator {
            stopping: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Subscribe to the shutdown notification
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal shutdown; repeated calls are harmless
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutdown signalled");
        // no subscribers is fine
        let _ = self.tx.send(());
    }

    pub fn is_shutting_down(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is signalled
    pub async fn wait_for_shutdown(&self) {
        if self.is_shutting_down() {
            return;
        }
        let mut rx = self.subscribe();
        let _ = rx.recv().await;
    }
}
