// Settings store and the validator over recognised keys

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::constants::{
    BURST_DHASH_THRESHOLD_RANGE, BURST_TIME_THRESHOLD_RANGE, DEFAULT_BURST_DHASH_THRESHOLD,
    DEFAULT_BURST_TIME_THRESHOLD_SECS, DEFAULT_GROUP_DISTANCE_KM, DEFAULT_GROUP_TIME_GAP_MINUTES,
    GROUP_DISTANCE_RANGE, GROUP_TIME_GAP_RANGE,
};
use crate::error::{DarkroomError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub created_at: String,
    pub updated_at: String,
}

/// How transfer places files into the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Move,
    Copy,
}

impl ImportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportMode::Move => "move",
            ImportMode::Copy => "copy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "move" => Some(ImportMode::Move),
            "copy" => Some(ImportMode::Copy),
            _ => None,
        }
    }
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

pub fn get_all_settings(conn: &Connection) -> Result<Vec<Setting>> {
    let mut stmt =
        conn.prepare("SELECT key, value, created_at, updated_at FROM settings ORDER BY key ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Setting {
            key: row.get(0)?,
            value: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    })?;
    let mut settings = Vec::new();
    for row in rows {
        settings.push(row?);
    }
    Ok(settings)
}

/// Validated write. A value outside the key's range is rejected and the
/// stored value stays as it was.
pub fn upsert_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    validate_setting(key, value)?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
    Ok(())
}

fn invalid(key: &str, reason: impl Into<String>) -> DarkroomError {
    DarkroomError::InvalidSetting { key: key.to_string(), reason: reason.into() }
}

pub fn validate_setting(key: &str, value: &str) -> Result<()> {
    match key {
        "import_mode" => {
            if ImportMode::parse(value).is_none() {
                return Err(invalid(key, "must be 'move' or 'copy'"));
            }
        }
        "export_min_rating" => {
            let rating: i64 =
                value.parse().map_err(|_| invalid(key, "must be a number"))?;
            if !(0..=5).contains(&rating) {
                return Err(invalid(key, "must be between 0 and 5"));
            }
        }
        "export_curation_status" => {
            if value != "all" && value != "pick" {
                return Err(invalid(key, "must be 'all' or 'pick'"));
            }
        }
        "export_cleanup_enabled" | "export_deduplication_enabled" | "burst_detection_enabled" => {
            if value != "true" && value != "false" {
                return Err(invalid(key, "must be 'true' or 'false'"));
            }
        }
        "export_organization_mode" => {
            if value != "organized" && value != "flat" {
                return Err(invalid(key, "must be 'organized' or 'flat'"));
            }
        }
        "burst_time_threshold" => {
            let secs: i64 = value.parse().map_err(|_| invalid(key, "must be a number"))?;
            let (lo, hi) = BURST_TIME_THRESHOLD_RANGE;
            if !(lo..=hi).contains(&secs) {
                return Err(invalid(key, format!("must be between {} and {} seconds", lo, hi)));
            }
        }
        "burst_dhash_threshold" => {
            let bits: u32 = value.parse().map_err(|_| invalid(key, "must be a number"))?;
            let (lo, hi) = BURST_DHASH_THRESHOLD_RANGE;
            if !(lo..=hi).contains(&bits) {
                return Err(invalid(key, format!("must be between {} and {} bits", lo, hi)));
            }
        }
        "group_time_gap" => {
            let minutes: i64 = value.parse().map_err(|_| invalid(key, "must be a number"))?;
            let (lo, hi) = GROUP_TIME_GAP_RANGE;
            if !(lo..=hi).contains(&minutes) {
                return Err(invalid(key, format!("must be between {} and {} minutes", lo, hi)));
            }
        }
        "group_distance" => {
            let km: f64 = value.parse().map_err(|_| invalid(key, "must be a number"))?;
            let (lo, hi) = GROUP_DISTANCE_RANGE;
            if !(lo..=hi).contains(&km) {
                return Err(invalid(key, format!("must be between {} and {} km", lo, hi)));
            }
        }
        // Unrecognised keys are stored as-is
        _ => {}
    }
    Ok(())
}

// ----- Typed getters with defaults -----

pub fn get_import_mode(conn: &Connection) -> ImportMode {
    get_setting(conn, "import_mode")
        .ok()
        .flatten()
        .and_then(|v| ImportMode::parse(&v))
        .unwrap_or(ImportMode::Move)
}

pub fn get_burst_detection_enabled(conn: &Connection) -> bool {
    match get_setting(conn, "burst_detection_enabled").ok().flatten() {
        Some(v) => v == "true",
        None => true,
    }
}

pub fn get_burst_time_threshold(conn: &Connection) -> i64 {
    get_setting(conn, "burst_time_threshold")
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_BURST_TIME_THRESHOLD_SECS)
}

pub fn get_burst_dhash_threshold(conn: &Connection) -> u32 {
    get_setting(conn, "burst_dhash_threshold")
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_BURST_DHASH_THRESHOLD)
}

pub fn get_group_time_gap(conn: &Connection) -> i64 {
    get_setting(conn, "group_time_gap")
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_GROUP_TIME_GAP_MINUTES)
}

pub fn get_group_distance(conn: &Connection) -> f64 {
    get_setting(conn, "group_distance")
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_GROUP_DISTANCE_KM)
}
