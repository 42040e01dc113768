//! sqbridge core - preamp control for SQ mixing consoles.
//!
//! This crate holds the domain model, the 8-byte command encoder, the
//! in-memory channel mirror, and the background sync engine. Network I/O sits
//! behind the [`Transport`] trait.

pub mod channel;
pub mod command;
pub mod control;
pub mod error;
pub mod show;
pub mod store;
pub mod sync;
pub mod transport;

pub use channel::{ChannelState, ControlChange, ControlKind, PreampBus};
pub use command::Command;
pub use control::{ControlOutcome, apply_control};
pub use error::{Error, Result};
pub use show::Show;
pub use store::{StateStore, StoreEvent, StoreSnapshot};
pub use sync::{SyncEngine, SyncOutcome, SyncState, SyncStatus};
pub use transport::{ConsoleAddress, MemoryTransport, Transport, TransportError};
