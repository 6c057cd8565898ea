// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;

use crate::error::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Photos, keyed by canonical library path
    CREATE TABLE photos (
        file_path TEXT PRIMARY KEY,
        original_filepath TEXT,
        sha256_hash TEXT NOT NULL,
        dhash TEXT,
        file_size INTEGER NOT NULL DEFAULT 0,
        date_time TEXT,
        camera_make TEXT,
        camera_model TEXT,
        width INTEGER,
        height INTEGER,
        orientation INTEGER CHECK (orientation BETWEEN 1 AND 8),
        latitude REAL,
        longitude REAL,
        iso INTEGER,
        f_number REAL,
        exposure_time REAL,
        focal_length REAL,
        file_format TEXT NOT NULL DEFAULT '',
        mime_type TEXT NOT NULL DEFAULT '',
        is_video INTEGER NOT NULL DEFAULT 0,
        duration INTEGER,
        file_created_at TEXT,
        file_modified_at TEXT,
        city TEXT,
        state TEXT,
        country_name TEXT,
        is_curated INTEGER NOT NULL DEFAULT 0,
        is_trashed INTEGER NOT NULL DEFAULT 0,
        rating INTEGER NOT NULL DEFAULT 0 CHECK (rating BETWEEN 0 AND 5),
        notes TEXT,
        thumbnail_path TEXT,
        group_id INTEGER REFERENCES photo_groups(group_id),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Trip groups
    CREATE TABLE photo_groups (
        group_id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time TEXT,
        end_time TEXT,
        photo_count INTEGER NOT NULL DEFAULT 0,
        total_size INTEGER NOT NULL DEFAULT 0,
        latitude REAL,
        longitude REAL,
        city TEXT,
        state TEXT,
        country_name TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Gazetteer
    CREATE TABLE cities (
        geoname_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        state TEXT,
        country_code TEXT,
        country_name TEXT,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL
    );

    CREATE VIRTUAL TABLE cities_rtree USING rtree(
        id,
        min_lat, max_lat,
        min_lon, max_lon
    );

    -- Albums (managed by the album feature; tables owned here)
    CREATE TABLE albums (
        album_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        cover_photo_path TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE album_photos (
        album_id INTEGER NOT NULL REFERENCES albums(album_id) ON DELETE CASCADE,
        file_path TEXT NOT NULL REFERENCES photos(file_path),
        added_at TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY (album_id, file_path)
    );

    -- Import bookkeeping
    CREATE TABLE import_sessions (
        import_id INTEGER PRIMARY KEY AUTOINCREMENT,
        import_path TEXT NOT NULL,
        import_mode TEXT NOT NULL DEFAULT 'move' CHECK (import_mode IN ('move', 'copy')),
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_seconds INTEGER,
        total_scanned INTEGER NOT NULL DEFAULT 0,
        already_imported INTEGER NOT NULL DEFAULT 0,
        unique_files INTEGER NOT NULL DEFAULT 0,
        duplicate_groups INTEGER NOT NULL DEFAULT 0,
        duplicates_removed INTEGER NOT NULL DEFAULT 0,
        moved_to_library INTEGER NOT NULL DEFAULT 0,
        error_count INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        status TEXT NOT NULL DEFAULT 'scanning'
            CHECK (status IN ('scanning', 'hashing', 'checking_imported',
                              'finding_duplicates', 'importing', 'completed', 'error')),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE imported_photos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        import_id INTEGER NOT NULL REFERENCES import_sessions(import_id),
        file_path TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('success', 'error', 'skipped')),
        error_message TEXT,
        imported_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Export bookkeeping (the copy loop lives in the export feature)
    CREATE TABLE export_sessions (
        export_id INTEGER PRIMARY KEY AUTOINCREMENT,
        export_path TEXT NOT NULL,
        min_rating INTEGER NOT NULL DEFAULT 0,
        curation_status TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_seconds INTEGER,
        total_photos INTEGER NOT NULL DEFAULT 0,
        exported_photos INTEGER NOT NULL DEFAULT 0,
        error_count INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        status TEXT NOT NULL DEFAULT 'collecting'
            CHECK (status IN ('collecting', 'copying', 'completed', 'error')),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE exported_photos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        export_id INTEGER NOT NULL REFERENCES export_sessions(export_id),
        file_path TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('success', 'error', 'skipped')),
        error_message TEXT,
        exported_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Settings
    CREATE TABLE settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Indexes for common queries
    CREATE INDEX idx_photos_sha256 ON photos(sha256_hash);
    CREATE INDEX idx_photos_date_time ON photos(date_time);
    CREATE INDEX idx_photos_group ON photos(group_id);
    CREATE INDEX idx_photos_curation ON photos(is_curated, is_trashed);
    CREATE INDEX idx_imported_photos_session ON imported_photos(import_id);
    CREATE INDEX idx_exported_photos_session ON exported_photos(export_id);
    CREATE INDEX idx_cities_country ON cities(country_name);
    "#,
];

/// Get current schema version from database.
fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Run all pending migrations (crash-safe).
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = MIGRATIONS.len() as u32;

    // Refuse to open a DB created by a newer build
    if current_version > target_version {
        return Err(crate::error::DarkroomError::Other(format!(
            "Database schema version {} is newer than this build supports (max {})",
            current_version, target_version
        )));
    }

    if current_version == target_version {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        conn.execute_batch(migration)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", migration_version))?;

        log::info!("applied migration {}", migration_version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_cleanly() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        // Running twice is a no-op
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), MIGRATIONS.len() as u32);
    }

    #[test]
    fn required_tables_exist() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "photos", "photo_groups", "cities", "cities_rtree", "albums", "album_photos",
            "import_sessions", "imported_photos", "export_sessions", "exported_photos", "settings",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(count >= 1, "missing table {}", table);
        }
    }

    #[test]
    fn newer_schema_is_refused() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        assert!(run_migrations(&conn).is_err());
    }
}
