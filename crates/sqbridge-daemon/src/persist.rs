//! Writes the state store to the database whenever it changes.

use std::sync::Arc;

use parking_lot::Mutex;
use sqbridge_core::StateStore;
use sqbridge_db::Database;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Spawn the persistence task.
///
/// Subscribes before returning, so no change made after this call is missed.
/// A burst of changes is written as a single snapshot.
pub fn spawn(store: Arc<StateStore>, db: Arc<Mutex<Database>>) -> JoinHandle<()> {
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "State changed"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Persistence fell behind, writing latest snapshot");
                }
                Err(RecvError::Closed) => break,
            }
            while events.try_recv().is_ok() {}
            save(&store, &db);
        }
    })
}

/// Write the current snapshot, logging instead of failing.
pub fn save(store: &StateStore, db: &Mutex<Database>) {
    let snapshot = store.snapshot();
    if let Err(e) = db.lock().save_snapshot(&snapshot) {
        error!(error = %e, "Failed to persist channel state");
    } else {
        debug!(channels = snapshot.channels.len(), "Channel state persisted");
    }
}
