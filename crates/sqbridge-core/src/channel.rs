//! Channel strip definitions and preamp addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest valid local preamp id (1-16 inputs, 17 talkback, 18-21 stereo line).
pub const LOCAL_PREAMP_MAX: i64 = 21;

/// Highest valid S-Link preamp id.
pub const SLINK_PREAMP_MAX: i64 = 40;

/// Local talkback preamp id.
pub const TALKBACK_PREAMP: i64 = 17;

/// Local stereo line inputs (ST1 L/R, ST2 L/R). No phantom, pad, or gain.
pub const LOCAL_LINE_PREAMPS: [i64; 4] = [18, 19, 20, 21];

/// Lowest accepted gain in dB.
pub const GAIN_MIN_DB: f64 = 0.0;

/// Highest accepted gain in dB.
pub const GAIN_MAX_DB: f64 = 60.0;

/// Bus a preamp is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PreampBus {
    /// On-console inputs plus talkback
    #[default]
    #[serde(rename = "local", alias = "")]
    Local,
    /// Inputs carried over the S-Link digital connection
    #[serde(rename = "slink")]
    SLink,
}

impl PreampBus {
    /// Parse a free-form bus name. Anything other than `slink` is the local bus.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("slink") { Self::SLink } else { Self::Local }
    }

    /// Highest preamp id accepted for this bus.
    #[must_use]
    pub fn max_preamp(self) -> i64 {
        match self {
            Self::Local => LOCAL_PREAMP_MAX,
            Self::SLink => SLINK_PREAMP_MAX,
        }
    }

    /// Whether `id` is a valid preamp id on this bus.
    #[must_use]
    pub fn accepts(self, id: i64) -> bool {
        (1..=self.max_preamp()).contains(&id)
    }

    /// Whether `id` is a local line input that must never be sent to the console.
    #[must_use]
    pub fn is_line_input(self, id: i64) -> bool {
        self == Self::Local && LOCAL_LINE_PREAMPS.contains(&id)
    }

    /// Label used in TX log lines.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::SLink => "S-Link",
        }
    }
}

impl fmt::Display for PreampBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::SLink => "slink",
        })
    }
}

/// Kind of preamp control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Phantom,
    Pad,
    Gain,
}

impl ControlKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phantom => "phantom",
            Self::Pad => "pad",
            Self::Gain => "gain",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control together with its target value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlChange {
    /// 48V phantom power on/off
    Phantom(bool),
    /// Input pad on/off
    Pad(bool),
    /// Preamp gain in dB
    Gain(f64),
}

impl ControlChange {
    #[must_use]
    pub fn kind(&self) -> ControlKind {
        match self {
            Self::Phantom(_) => ControlKind::Phantom,
            Self::Pad(_) => ControlKind::Pad,
            Self::Gain(_) => ControlKind::Gain,
        }
    }

    /// The three controls of a channel, in the order the console expects them.
    #[must_use]
    pub fn sequence_for(channel: &ChannelState) -> [Self; 3] {
        [Self::Phantom(channel.phantom), Self::Pad(channel.pad), Self::Gain(channel.gain)]
    }

    /// Write this change into a channel's fields.
    pub fn apply_to(&self, channel: &mut ChannelState) {
        match *self {
            Self::Phantom(on) => channel.phantom = on,
            Self::Pad(on) => channel.pad = on,
            Self::Gain(db) => channel.gain = db,
        }
    }
}

impl fmt::Display for ControlChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Phantom(on) | Self::Pad(on) => f.write_str(if on { "on" } else { "off" }),
            Self::Gain(db) => write!(f, "{db:.0} dB"),
        }
    }
}

/// One logical mixer channel strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    /// Stable identifier, unique within the list
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Bus both preamps live on
    #[serde(default)]
    pub preamp_bus: PreampBus,
    /// Left (or mono) preamp
    pub preamp_id: i64,
    /// Right preamp, 0 for mono
    #[serde(default)]
    pub preamp_id_r: i64,
    #[serde(default)]
    pub phantom: bool,
    #[serde(default)]
    pub pad: bool,
    /// Gain in dB (0-60)
    #[serde(default)]
    pub gain: f64,
}

impl ChannelState {
    /// Create a mono channel with all controls off.
    #[must_use]
    pub fn mono(id: i64, name: &str, bus: PreampBus, preamp_id: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            preamp_bus: bus,
            preamp_id,
            preamp_id_r: 0,
            phantom: false,
            pad: false,
            gain: 0.0,
        }
    }

    /// Create a stereo channel with all controls off.
    #[must_use]
    pub fn stereo(id: i64, name: &str, bus: PreampBus, left: i64, right: i64) -> Self {
        Self { preamp_id_r: right, ..Self::mono(id, name, bus, left) }
    }

    #[must_use]
    pub fn is_stereo(&self) -> bool {
        self.preamp_id_r != 0
    }

    /// Preamps of this channel that are actually transmitted to the console.
    ///
    /// Local line inputs are dropped, and a right preamp equal to the left one
    /// is only sent once.
    #[must_use]
    pub fn transmitted_preamps(&self) -> Vec<i64> {
        let mut ids = vec![self.preamp_id];
        if self.is_stereo() && self.preamp_id_r != self.preamp_id {
            ids.push(self.preamp_id_r);
        }
        ids.retain(|&id| !self.preamp_bus.is_line_input(id));
        ids
    }

    /// Check the bus range and gain constraints.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] naming this channel and the offending field.
    pub fn validate(&self) -> Result<()> {
        let bus = self.preamp_bus;
        let max = bus.max_preamp();
        if !bus.accepts(self.preamp_id) {
            return Err(Error::validation(
                self.id,
                "preampId",
                format!("must be 1-{max} for {bus} bus (got {})", self.preamp_id),
            ));
        }
        if self.is_stereo() && !bus.accepts(self.preamp_id_r) {
            return Err(Error::validation(
                self.id,
                "preampIdR",
                format!("must be 0 or 1-{max} for {bus} bus (got {})", self.preamp_id_r),
            ));
        }
        if !self.gain.is_finite() || !(GAIN_MIN_DB..=GAIN_MAX_DB).contains(&self.gain) {
            return Err(Error::validation(
                self.id,
                "gain",
                format!("must be {GAIN_MIN_DB}-{GAIN_MAX_DB} dB (got {})", self.gain),
            ));
        }
        Ok(())
    }
}
