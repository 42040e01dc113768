//! Console command encoding.
//!
//! Every preamp control change is a fixed 8-byte packet:
//! `F7 0C 0C [subtype] [channel] [block] [v1] [v2]`.
//!
//! Encoding is total: out-of-range preamp ids and gains are clamped, never
//! rejected. Deciding whether a command should be sent at all (local line
//! inputs, range validation) is the caller's job.

use std::fmt;

use crate::channel::{
    ControlChange, ControlKind, GAIN_MAX_DB, GAIN_MIN_DB, PreampBus, TALKBACK_PREAMP,
};

/// Length of every console command.
pub const COMMAND_LEN: usize = 8;

/// Fixed packet header.
pub const HEADER: [u8; 3] = [0xF7, 0x0C, 0x0C];

/// Raw gain value for 0 dB.
pub const GAIN_RAW_MIN: u16 = 0x0080;

/// Raw gain value for 60 dB.
pub const GAIN_RAW_MAX: u16 = 0x00BC;

/// Device channel index of the talkback input.
pub const TALKBACK_CHANNEL: u8 = 58;

const BLOCK_LOCAL: u8 = 0x01;
const BLOCK_SLINK: u8 = 0x02;

const SUBTYPE_GAIN: u8 = 0x0C;
const SUBTYPE_PHANTOM: u8 = 0x0D;
const SUBTYPE_PAD: u8 = 0x0E;

/// A single encoded console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command([u8; COMMAND_LEN]);

impl Command {
    /// Encode a control change for a 1-based preamp id on `bus`.
    #[must_use]
    pub fn encode(bus: PreampBus, preamp_id: i64, change: ControlChange) -> Self {
        let channel = channel_index(bus, preamp_id);
        let (v1, v2) = match change {
            ControlChange::Phantom(on) | ControlChange::Pad(on) => (u8::from(on), 0x00),
            ControlChange::Gain(db) => {
                let [hi, lo] = gain_raw(db).to_be_bytes();
                (hi, lo)
            }
        };
        Self([HEADER[0], HEADER[1], HEADER[2], subtype(change.kind()), channel, block(bus), v1, v2])
    }

    #[must_use]
    pub fn phantom(bus: PreampBus, preamp_id: i64, on: bool) -> Self {
        Self::encode(bus, preamp_id, ControlChange::Phantom(on))
    }

    #[must_use]
    pub fn pad(bus: PreampBus, preamp_id: i64, on: bool) -> Self {
        Self::encode(bus, preamp_id, ControlChange::Pad(on))
    }

    #[must_use]
    pub fn gain(bus: PreampBus, preamp_id: i64, db: f64) -> Self {
        Self::encode(bus, preamp_id, ControlChange::Gain(db))
    }

    /// Raw packet bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; COMMAND_LEN] {
        &self.0
    }

    #[must_use]
    pub fn subtype(&self) -> u8 {
        self.0[3]
    }

    /// 0-based device channel index.
    #[must_use]
    pub fn channel(&self) -> u8 {
        self.0[4]
    }

    #[must_use]
    pub fn block(&self) -> u8 {
        self.0[5]
    }

    /// Payload bytes as a big-endian value.
    #[must_use]
    pub fn value(&self) -> u16 {
        u16::from_be_bytes([self.0[6], self.0[7]])
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Map a 1-based preamp id to the device channel index, clamping to the bus range.
///
/// Local 1-16 map to 0-15 and 17 (talkback) maps to 58. S-Link 1-40 map to 0-39.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn channel_index(bus: PreampBus, preamp_id: i64) -> u8 {
    match bus {
        PreampBus::Local => match preamp_id.clamp(1, TALKBACK_PREAMP) {
            TALKBACK_PREAMP => TALKBACK_CHANNEL,
            id => (id - 1) as u8,
        },
        PreampBus::SLink => (preamp_id.clamp(1, bus.max_preamp()) - 1) as u8,
    }
}

/// Interpolate a dB value onto the console's raw gain scale.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gain_raw(db: f64) -> u16 {
    let db = if db.is_nan() { GAIN_MIN_DB } else { db.clamp(GAIN_MIN_DB, GAIN_MAX_DB) };
    let span = f64::from(GAIN_RAW_MAX - GAIN_RAW_MIN);
    let raw = (f64::from(GAIN_RAW_MIN) + db / GAIN_MAX_DB * span).round() as u16;
    raw.clamp(GAIN_RAW_MIN, GAIN_RAW_MAX)
}

fn block(bus: PreampBus) -> u8 {
    match bus {
        PreampBus::Local => BLOCK_LOCAL,
        PreampBus::SLink => BLOCK_SLINK,
    }
}

fn subtype(kind: ControlKind) -> u8 {
    match kind {
        ControlKind::Phantom => SUBTYPE_PHANTOM,
        ControlKind::Pad => SUBTYPE_PAD,
        ControlKind::Gain => SUBTYPE_GAIN,
    }
}
