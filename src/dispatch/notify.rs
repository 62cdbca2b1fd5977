//! Change notification boundary.

use async_trait::async_trait;
use tokio::sync::broadcast;

/// Receives one "changed at locator" signal per resolved notification target.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify_change(&self, locator: &str);
}

/// Publishes changed locators on a tokio broadcast channel. Signals sent while nobody
/// is subscribed are dropped.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<String>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ChangeNotifier for BroadcastNotifier {
    async fn notify_change(&self, locator: &str) {
        let _ = self.tx.send(locator.to_string());
    }
}
