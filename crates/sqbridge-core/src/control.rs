//! Immediate single-control writes.

use tracing::{debug, info};

use crate::channel::{ControlChange, GAIN_MAX_DB, GAIN_MIN_DB, PreampBus};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::store::StateStore;
use crate::transport::{ConsoleAddress, Transport};

/// What happened to a single-control write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlOutcome {
    /// Command handed to the transport; `mirrored` channels were updated
    Sent { command: Command, mirrored: usize },
    /// Local line input: acknowledged, nothing sent, mirror untouched
    LineInput,
}

/// Write one line per command accepted by the transport.
pub fn log_tx(bus: PreampBus, preamp_id: i64, change: ControlChange) {
    info!("TX {} preamp {preamp_id} {} {change}", bus.label(), change.kind());
}

/// Validate, encode, and send one control change, then mirror it.
///
/// The mirror is only updated after the transport accepted the command.
///
/// # Errors
/// - [`Error::InvalidPreamp`] / [`Error::InvalidGain`] before any I/O
/// - [`Error::ConsoleNotConfigured`] when a command must be sent but no address is known
/// - [`Error::Transport`] when the send fails
pub async fn apply_control<T: Transport>(
    transport: &T,
    store: &StateStore,
    addr: Option<&ConsoleAddress>,
    bus: PreampBus,
    preamp_id: i64,
    change: ControlChange,
) -> Result<ControlOutcome> {
    if !bus.accepts(preamp_id) {
        return Err(Error::InvalidPreamp { bus, id: preamp_id });
    }
    if let ControlChange::Gain(db) = change {
        if !(GAIN_MIN_DB..=GAIN_MAX_DB).contains(&db) {
            return Err(Error::InvalidGain(db));
        }
    }
    if bus.is_line_input(preamp_id) {
        debug!(preamp_id, control = %change.kind(), "Line input, nothing to send");
        return Ok(ControlOutcome::LineInput);
    }

    let addr = addr.ok_or(Error::ConsoleNotConfigured)?;
    let command = Command::encode(bus, preamp_id, change);
    debug!(%addr, %command, "Sending command");
    transport.send(addr, command).await?;
    log_tx(bus, preamp_id, change);

    let mirrored = store.update_control(bus, preamp_id, change);
    Ok(ControlOutcome::Sent { command, mirrored })
}
