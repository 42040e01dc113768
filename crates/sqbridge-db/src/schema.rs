//! Database schema definition.

/// Initial schema (version 1).
pub const SCHEMA_V1: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Mirror of the console channel strips, in list order
CREATE TABLE IF NOT EXISTS channels (
    position INTEGER PRIMARY KEY,
    id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    preamp_bus TEXT NOT NULL DEFAULT 'local' CHECK (preamp_bus IN ('local', 'slink')),
    preamp_id INTEGER NOT NULL,
    preamp_id_r INTEGER NOT NULL DEFAULT 0,
    phantom BOOLEAN NOT NULL DEFAULT FALSE,
    pad BOOLEAN NOT NULL DEFAULT FALSE,
    gain REAL NOT NULL DEFAULT 0.0
);

-- Key/value settings (current show, console host)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Saved shows, stored as JSON documents
CREATE TABLE IF NOT EXISTS shows (
    name TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// Default data to insert after schema creation.
pub const DEFAULT_DATA: &str = r"
INSERT OR IGNORE INTO settings (key, value) VALUES ('current_show', '');
";
