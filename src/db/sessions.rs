// Import and export session bookkeeping

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;

fn now_rfc3339() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ----- Import sessions -----

/// State walk of one ingest run. A session only moves forward, ending in
/// Completed or Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Scanning,
    Hashing,
    CheckingImported,
    FindingDuplicates,
    Importing,
    Completed,
    Error,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Scanning => "scanning",
            ImportStatus::Hashing => "hashing",
            ImportStatus::CheckingImported => "checking_imported",
            ImportStatus::FindingDuplicates => "finding_duplicates",
            ImportStatus::Importing => "importing",
            ImportStatus::Completed => "completed",
            ImportStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSession {
    pub import_id: i64,
    pub import_path: String,
    pub import_mode: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub total_scanned: i64,
    pub already_imported: i64,
    pub unique_files: i64,
    pub duplicate_groups: i64,
    pub duplicates_removed: i64,
    pub moved_to_library: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
    pub status: String,
    pub created_at: String,
}

fn import_session_from_row(row: &Row) -> rusqlite::Result<ImportSession> {
    Ok(ImportSession {
        import_id: row.get(0)?,
        import_path: row.get(1)?,
        import_mode: row.get(2)?,
        started_at: row.get(3)?,
        completed_at: row.get(4)?,
        duration_seconds: row.get(5)?,
        total_scanned: row.get(6)?,
        already_imported: row.get(7)?,
        unique_files: row.get(8)?,
        duplicate_groups: row.get(9)?,
        duplicates_removed: row.get(10)?,
        moved_to_library: row.get(11)?,
        error_count: row.get(12)?,
        error_message: row.get(13)?,
        status: row.get(14)?,
        created_at: row.get(15)?,
    })
}

const IMPORT_SESSION_COLUMNS: &str = "import_id, import_path, import_mode, started_at, completed_at,
    duration_seconds, total_scanned, already_imported, unique_files,
    duplicate_groups, duplicates_removed, moved_to_library,
    error_count, error_message, status, created_at";

pub fn create_import_session(conn: &Connection, import_path: &str, import_mode: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO import_sessions (import_path, import_mode, started_at, status)
         VALUES (?1, ?2, ?3, ?4)",
        params![import_path, import_mode, now_rfc3339(), ImportStatus::Scanning.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_import_session_status(conn: &Connection, import_id: i64, status: ImportStatus) -> Result<()> {
    conn.execute(
        "UPDATE import_sessions SET status = ?1 WHERE import_id = ?2",
        params![status.as_str(), import_id],
    )?;
    Ok(())
}

/// Analysis counters, written as each phase resolves them.
pub fn update_import_session_stats(
    conn: &Connection,
    import_id: i64,
    total_scanned: i64,
    already_imported: i64,
    unique_files: i64,
    duplicate_groups: i64,
    duplicates_removed: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE import_sessions
         SET total_scanned = ?1, already_imported = ?2, unique_files = ?3,
             duplicate_groups = ?4, duplicates_removed = ?5
         WHERE import_id = ?6",
        params![total_scanned, already_imported, unique_files, duplicate_groups, duplicates_removed, import_id],
    )?;
    Ok(())
}

/// Close out a session. An error message forces status `error`.
pub fn complete_import_session(
    conn: &Connection,
    import_id: i64,
    moved_to_library: i64,
    started_at: DateTime<Utc>,
    error_message: Option<&str>,
) -> Result<()> {
    let completed_at = Utc::now();
    let duration = (completed_at - started_at).num_seconds();
    let status = if error_message.is_some() { ImportStatus::Error } else { ImportStatus::Completed };

    conn.execute(
        "UPDATE import_sessions
         SET completed_at = ?1, duration_seconds = ?2, moved_to_library = ?3,
             error_message = ?4, status = ?5
         WHERE import_id = ?6",
        params![
            completed_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            duration,
            moved_to_library,
            error_message,
            status.as_str(),
            import_id
        ],
    )?;
    Ok(())
}

pub fn increment_import_errors(conn: &Connection, import_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE import_sessions SET error_count = error_count + 1 WHERE import_id = ?1",
        params![import_id],
    )?;
    Ok(())
}

pub fn get_import_session(conn: &Connection, import_id: i64) -> Result<Option<ImportSession>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM import_sessions WHERE import_id = ?1", IMPORT_SESSION_COLUMNS),
            params![import_id],
            import_session_from_row,
        )
        .optional()?;
    Ok(result)
}

pub fn get_import_sessions(conn: &Connection, limit: i64) -> Result<Vec<ImportSession>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM import_sessions ORDER BY started_at DESC LIMIT ?1",
        IMPORT_SESSION_COLUMNS
    ))?;
    let rows = stmt.query_map(params![limit], import_session_from_row)?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }
    Ok(sessions)
}

// ----- Per-file audit rows -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Success,
    Error,
    Skipped,
}

impl FileOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FileOutcome::Success => "success",
            FileOutcome::Error => "error",
            FileOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedPhoto {
    pub id: i64,
    pub import_id: i64,
    pub file_path: String,
    pub status: String,
    pub error_message: Option<String>,
    pub imported_at: String,
}

pub fn record_imported_photo(
    conn: &Connection,
    import_id: i64,
    file_path: &str,
    outcome: FileOutcome,
    error_message: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO imported_photos (import_id, file_path, status, error_message, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![import_id, file_path, outcome.as_str(), error_message, now_rfc3339()],
    )?;
    Ok(())
}

pub fn get_imported_photos(conn: &Connection, import_id: i64) -> Result<Vec<ImportedPhoto>> {
    let mut stmt = conn.prepare(
        "SELECT id, import_id, file_path, status, error_message, imported_at
         FROM imported_photos WHERE import_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![import_id], |row| {
        Ok(ImportedPhoto {
            id: row.get(0)?,
            import_id: row.get(1)?,
            file_path: row.get(2)?,
            status: row.get(3)?,
            error_message: row.get(4)?,
            imported_at: row.get(5)?,
        })
    })?;
    let mut photos = Vec::new();
    for row in rows {
        photos.push(row?);
    }
    Ok(photos)
}

// ----- Export sessions -----
// The copy loop belongs to the export feature; the engine owns the records.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSession {
    pub export_id: i64,
    pub export_path: String,
    pub min_rating: i64,
    pub curation_status: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub total_photos: i64,
    pub exported_photos: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub fn create_export_session(
    conn: &Connection,
    export_path: &str,
    min_rating: i64,
    curation_status: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO export_sessions (export_path, min_rating, curation_status, started_at, status)
         VALUES (?1, ?2, ?3, ?4, 'collecting')",
        params![export_path, min_rating, curation_status, now_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_export_session_status(conn: &Connection, export_id: i64, status: &str) -> Result<()> {
    conn.execute(
        "UPDATE export_sessions SET status = ?1 WHERE export_id = ?2",
        params![status, export_id],
    )?;
    Ok(())
}

pub fn complete_export_session(
    conn: &Connection,
    export_id: i64,
    total_photos: i64,
    exported_photos: i64,
    started_at: DateTime<Utc>,
    error_message: Option<&str>,
) -> Result<()> {
    let completed_at = Utc::now();
    let duration = (completed_at - started_at).num_seconds();
    let status = if error_message.is_some() { "error" } else { "completed" };

    conn.execute(
        "UPDATE export_sessions
         SET completed_at = ?1, duration_seconds = ?2, total_photos = ?3,
             exported_photos = ?4, error_message = ?5, status = ?6
         WHERE export_id = ?7",
        params![
            completed_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            duration,
            total_photos,
            exported_photos,
            error_message,
            status,
            export_id
        ],
    )?;
    Ok(())
}

pub fn record_exported_photo(
    conn: &Connection,
    export_id: i64,
    file_path: &str,
    outcome: FileOutcome,
    error_message: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO exported_photos (export_id, file_path, status, error_message, exported_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![export_id, file_path, outcome.as_str(), error_message, now_rfc3339()],
    )?;
    Ok(())
}
