//! In-memory mirror of the console's channel configuration.

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::channel::{ChannelState, ControlChange, GAIN_MAX_DB, GAIN_MIN_DB, PreampBus};
use crate::error::{Error, Result};

/// Channel list and active show, as stored and persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub channels: Vec<ChannelState>,
    pub current_show: String,
}

/// Change notifications published by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The whole channel list was replaced
    Replaced { count: usize },
    /// A single control was updated on matching channels
    ControlUpdated { bus: PreampBus, preamp_id: i64, change: ControlChange },
    /// The active show name changed
    CurrentShowChanged(String),
    /// Channels and active show were cleared
    Reset,
}

/// Authoritative in-process copy of all channel strips.
///
/// Readers share the lock; writers are exclusive. Every snapshot handed out is
/// an owned copy.
pub struct StateStore {
    inner: RwLock<StoreSnapshot>,
    events: broadcast::Sender<StoreEvent>,
}

impl StateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }

    /// Create a store seeded with previously persisted state.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { inner: RwLock::new(snapshot), events }
    }

    /// Copy of the current channel list.
    #[must_use]
    pub fn get(&self) -> Vec<ChannelState> {
        self.inner.read().channels.clone()
    }

    /// Copy of channels and active show together.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().clone()
    }

    /// Validate and atomically swap in a new channel list.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for the first invalid entry; the store is
    /// left unchanged.
    pub fn replace(&self, channels: Vec<ChannelState>) -> Result<Vec<ChannelState>> {
        let mut seen = HashSet::with_capacity(channels.len());
        for channel in &channels {
            channel.validate()?;
            if !seen.insert(channel.id) {
                return Err(Error::validation(channel.id, "id", "is duplicated"));
            }
        }

        let count = channels.len();
        self.inner.write().channels.clone_from(&channels);
        info!(count, "Channel state replaced");
        self.publish(StoreEvent::Replaced { count });
        Ok(channels)
    }

    /// Update one control on every channel whose left preamp is `(bus, preamp_id)`.
    ///
    /// Returns how many channels were touched. Out-of-range gains are ignored.
    pub fn update_control(&self, bus: PreampBus, preamp_id: i64, change: ControlChange) -> usize {
        if let ControlChange::Gain(db) = change {
            if !(GAIN_MIN_DB..=GAIN_MAX_DB).contains(&db) {
                warn!(%bus, preamp_id, db, "Ignoring out-of-range gain for state mirror");
                return 0;
            }
        }

        let updated = {
            let mut inner = self.inner.write();
            let mut updated = 0;
            for channel in inner
                .channels
                .iter_mut()
                .filter(|c| c.preamp_bus == bus && c.preamp_id == preamp_id)
            {
                change.apply_to(channel);
                updated += 1;
            }
            updated
        };

        debug!(
            %bus,
            preamp_id,
            control = %change.kind(),
            value = %change,
            updated,
            "Mirror updated"
        );
        if updated > 0 {
            self.publish(StoreEvent::ControlUpdated { bus, preamp_id, change });
        }
        updated
    }

    /// Name of the active show (empty when none).
    #[must_use]
    pub fn current_show(&self) -> String {
        self.inner.read().current_show.clone()
    }

    /// Set the active show name.
    pub fn set_current_show(&self, name: &str) {
        self.inner.write().current_show = name.to_string();
        self.publish(StoreEvent::CurrentShowChanged(name.to_string()));
    }

    /// Clear channels and the active show.
    pub fn reset(&self) {
        *self.inner.write() = StoreSnapshot::default();
        info!("Channel state reset");
        self.publish(StoreEvent::Reset);
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
