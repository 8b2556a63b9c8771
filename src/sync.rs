//! Named wait/signal registry for cross-script rendezvous.
//!
//! One script (or scope) blocks on a name until another signals the same
//! name. Signals are not sticky: a signal sent while nobody waits is lost,
//! and one signal releases every waiter currently parked on the name.
//! Entries are created lazily on first reference and are process-wide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
pub struct SyncCenter {
    entries: Mutex<HashMap<String, Arc<Notify>>>,
}

impl SyncCenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entry(&self, name: &str) -> Arc<Notify> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Block until `signal(name)` or until `timeout` elapses; `None` blocks
    /// indefinitely. Returns the actually-elapsed wait so callers can
    /// account for the time spent. A timeout is a normal (early) return,
    /// not an error.
    pub async fn wait(&self, name: &str, timeout: Option<Duration>) -> Duration {
        if name.is_empty() {
            return Duration::ZERO;
        }
        let notify = self.entry(name);
        let start = tokio::time::Instant::now();
        let notified = notify.notified();
        tokio::pin!(notified);
        // Register before awaiting so a signal racing this call cannot be
        // lost between entry lookup and the first poll.
        notified.as_mut().enable();
        match timeout {
            None => notified.await,
            Some(t) => {
                let _ = tokio::time::timeout(t, notified).await;
            }
        }
        start.elapsed()
    }

    /// Wake all current waiters on `name`. No-op when nobody waits.
    pub fn signal(&self, name: &str) {
        if name.is_empty() {
            return;
        }
        self.entry(name).notify_waiters();
    }
}
