//! Database query functions.

use rusqlite::{OptionalExtension, params};
use sqbridge_core::show::{is_safe_show_name, sanitize_show_name};
use sqbridge_core::{ChannelState, PreampBus, Show, StoreSnapshot};
use tracing::debug;

use crate::{Database, DbResult};

const CURRENT_SHOW_KEY: &str = "current_show";
const CONSOLE_HOST_KEY: &str = "console_host";

impl Database {
    /// Load the channel mirror in list order.
    pub fn load_channels(&self) -> DbResult<Vec<ChannelState>> {
        let mut stmt = self.conn.prepare(
            r"SELECT id, name, preamp_bus, preamp_id, preamp_id_r, phantom, pad, gain
              FROM channels
              ORDER BY position",
        )?;

        let channels = stmt
            .query_map([], |row| {
                let bus: String = row.get(2)?;
                Ok(ChannelState {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    preamp_bus: PreampBus::parse_lossy(&bus),
                    preamp_id: row.get(3)?,
                    preamp_id_r: row.get(4)?,
                    phantom: row.get(5)?,
                    pad: row.get(6)?,
                    gain: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(channels)
    }

    /// Replace the stored channel mirror with `channels`, keeping their order.
    pub fn save_channels(&mut self, channels: &[ChannelState]) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM channels", [])?;
        {
            let mut stmt = tx.prepare(
                r"INSERT INTO channels
                  (position, id, name, preamp_bus, preamp_id, preamp_id_r, phantom, pad, gain)
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (position, ch) in (0_i64..).zip(channels) {
                stmt.execute(params![
                    position,
                    ch.id,
                    ch.name,
                    ch.preamp_bus.to_string(),
                    ch.preamp_id,
                    ch.preamp_id_r,
                    ch.phantom,
                    ch.pad,
                    ch.gain,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = channels.len(), "Channels saved");
        Ok(())
    }

    /// Load channels and the active show together.
    pub fn load_snapshot(&self) -> DbResult<StoreSnapshot> {
        Ok(StoreSnapshot { channels: self.load_channels()?, current_show: self.current_show()? })
    }

    /// Persist channels and the active show together.
    pub fn save_snapshot(&mut self, snapshot: &StoreSnapshot) -> DbResult<()> {
        self.save_channels(&snapshot.channels)?;
        self.set_current_show(&snapshot.current_show)
    }

    /// Clear the channel mirror and the active show.
    pub fn reset_state(&mut self) -> DbResult<()> {
        self.save_snapshot(&StoreSnapshot::default())
    }

    /// Read a setting.
    pub fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Write a setting.
    pub fn set_setting(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r"INSERT INTO settings (key, value, updated_at)
              VALUES (?, ?, datetime('now'))
              ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// Name of the active show (empty when none).
    pub fn current_show(&self) -> DbResult<String> {
        Ok(self.get_setting(CURRENT_SHOW_KEY)?.unwrap_or_default())
    }

    pub fn set_current_show(&self, name: &str) -> DbResult<()> {
        self.set_setting(CURRENT_SHOW_KEY, name)
    }

    /// Console host set at runtime, if any.
    pub fn console_host(&self) -> DbResult<Option<String>> {
        Ok(self
            .get_setting(CONSOLE_HOST_KEY)?
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty()))
    }

    pub fn set_console_host(&self, host: &str) -> DbResult<()> {
        self.set_setting(CONSOLE_HOST_KEY, host.trim())
    }

    /// Names of all saved shows, sorted.
    pub fn list_shows(&self) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM shows ORDER BY name")?;
        let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Load a show by name. Names that are not storable are never found.
    pub fn load_show(&self, name: &str) -> DbResult<Option<Show>> {
        if !is_safe_show_name(name) {
            return Ok(None);
        }
        let body: Option<String> = self
            .conn
            .query_row("SELECT body FROM shows WHERE name = ?", params![name], |row| row.get(0))
            .optional()?;

        body.map(|json| serde_json::from_str::<Show>(&json)).transpose().map_err(Into::into)
    }

    /// Save a show under its sanitized name (insert or update).
    ///
    /// Returns the name it was stored under.
    pub fn save_show(&self, show: &Show) -> DbResult<String> {
        let name = sanitize_show_name(&show.name);
        let stored = Show { name: name.clone(), ..show.clone() };
        let body = serde_json::to_string_pretty(&stored)?;

        self.conn.execute(
            r"INSERT INTO shows (name, body, updated_at)
              VALUES (?, ?, datetime('now'))
              ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                updated_at = datetime('now')",
            params![name, body],
        )?;
        debug!(name = %name, channels = show.channels.len(), "Show saved");
        Ok(name)
    }

    /// Delete a show. Returns whether it existed.
    pub fn delete_show(&self, name: &str) -> DbResult<bool> {
        if !is_safe_show_name(name) {
            return Ok(false);
        }
        let deleted = self.conn.execute("DELETE FROM shows WHERE name = ?", params![name])?;
        Ok(deleted > 0)
    }
}
