//! sqbridge Database - SQLite persistence layer.
//!
//! Stores the channel mirror, runtime settings, and named shows so the
//! daemon can restart without losing the console picture.

pub mod error;
pub mod migrations;
pub mod queries;
pub mod schema;

pub use error::{DbError, DbResult};

use directories::ProjectDirs;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{debug, info};

/// Database handle for sqbridge.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at the default location.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open() -> DbResult<Self> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open or create the database at a specific path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_at(path: PathBuf) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(?path, "Opening database");
        let conn = Connection::open(&path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        let mut db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory() -> DbResult<Self> {
        debug!("Opening in-memory database");
        let conn = Connection::open_in_memory()?;

        let mut db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the default database path.
    ///
    /// # Errors
    /// Returns [`DbError::NoDataDir`] if no home directory can be determined.
    pub fn default_path() -> DbResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "sqbridge", "sqbridge").ok_or(DbError::NoDataDir)?;
        Ok(dirs.data_dir().join("sqbridge.db"))
    }

    fn run_migrations(&mut self) -> DbResult<()> {
        migrations::run(&mut self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
