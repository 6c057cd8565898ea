// Database module

pub mod calendar;
pub mod filters;
pub mod groups;
pub mod migrations;
pub mod photos;
pub mod sessions;
pub mod settings;

use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

/// Open or create a database at the given path.
pub fn open_db(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    // Per-connection pragmas
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// In-memory database with the full schema, for tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
