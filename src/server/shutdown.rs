//! Graceful shutdown signaling: a broadcast notifying every connection task
//! that it's time to wind down, paired with an mpsc channel whose closing
//! tells [`Shutdown::linger`] that every task has actually finished.

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

/// Coordinates graceful shutdown across every connection task spawned by a
/// [`crate::server::Server`].
#[derive(Debug)]
pub struct Shutdown {
    notify_tx: RwLock<Option<broadcast::Sender<()>>>,
    complete_tx: RwLock<Option<mpsc::Sender<()>>>,
    complete_rx: Mutex<mpsc::Receiver<()>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// A fresh shutdown coordinator with no subscribers yet.
    pub fn new() -> Self {
        let (notify_tx, _) = broadcast::channel(1);
        let (complete_tx, complete_rx) = mpsc::channel(1);
        Shutdown { notify_tx: RwLock::new(Some(notify_tx)), complete_tx: RwLock::new(Some(complete_tx)), complete_rx: Mutex::new(complete_rx) }
    }

    /// Tells every current and future [`Shutdown::subscribe`]r that shutdown
    /// has begun. Idempotent.
    pub async fn notify(&self) {
        drop(self.notify_tx.write().await.take());
        drop(self.complete_tx.write().await.take());
    }

    /// Waits until every outstanding [`Signal`] has been dropped, i.e. every
    /// connection task has finished winding down.
    pub async fn linger(&self) {
        let _ = self.complete_rx.lock().await.recv().await;
    }

    /// Hands out a fresh [`Signal`] for one connection task to hold for its
    /// lifetime.
    pub async fn subscribe(&self) -> Signal {
        let notify_tx = self.notify_tx.read().await;
        let complete_tx = self.complete_tx.read().await;
        Signal { already_shutdown: notify_tx.is_none(), notify_rx: notify_tx.as_ref().map(|tx| tx.subscribe()), _complete_tx: complete_tx.clone() }
    }
}

/// Held by a single connection task; dropping it (task exit) is what lets
/// [`Shutdown::linger`] eventually return.
pub struct Signal {
    already_shutdown: bool,
    notify_rx: Option<broadcast::Receiver<()>>,
    _complete_tx: Option<mpsc::Sender<()>>,
}

impl Signal {
    /// Resolves once shutdown has been notified; resolves immediately if it
    /// already had been when this signal was created.
    pub async fn triggered(&mut self) {
        if self.already_shutdown {
            return;
        }
        let _ = self.notify_rx.as_mut().expect("subscribed signal always carries a receiver").recv().await;
        self.already_shutdown = true;
    }
}
