//! Named shows: saved snapshots of the full channel list.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelState;

/// Longest stored show name.
pub const MAX_SHOW_NAME_LEN: usize = 64;

/// Name used when a show is saved without one.
pub const DEFAULT_SHOW_NAME: &str = "show";

/// A saved channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    /// Show name (always sanitized before storage)
    pub name: String,
    /// Channel list snapshot
    #[serde(default)]
    pub channels: Vec<ChannelState>,
    /// Console host the show was made for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_host: Option<String>,
}

impl Show {
    /// Create a show with a sanitized name.
    #[must_use]
    pub fn new(name: &str, channels: Vec<ChannelState>) -> Self {
        Self { name: sanitize_show_name(name), channels, console_host: None }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Turn user input into a storable show name.
///
/// Trims, replaces every character outside `[A-Za-z0-9_-]` with `_`, and
/// truncates to [`MAX_SHOW_NAME_LEN`]. Empty input becomes [`DEFAULT_SHOW_NAME`].
#[must_use]
pub fn sanitize_show_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return DEFAULT_SHOW_NAME.to_string();
    }
    trimmed
        .chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .take(MAX_SHOW_NAME_LEN)
        .collect()
}

/// Whether `name` can be used to look up a stored show as-is.
#[must_use]
pub fn is_safe_show_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}
