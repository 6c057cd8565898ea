// Photo table types and query helpers

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::filters::{build_filter_conditions, PhotoFilters};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub file_path: String,
    pub original_filepath: Option<String>,
    pub sha256_hash: String,
    pub dhash: Option<String>,
    pub file_size: i64,
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub iso: Option<i64>,
    pub f_number: Option<f64>,
    pub exposure_time: Option<f64>,
    pub focal_length: Option<f64>,
    pub file_format: String,
    pub mime_type: String,
    pub is_video: bool,
    pub duration: Option<i64>,
    pub file_created_at: Option<String>,
    pub file_modified_at: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_name: Option<String>,
    pub is_curated: bool,
    pub is_trashed: bool,
    pub rating: i64,
    pub notes: Option<String>,
    pub thumbnail_path: Option<String>,
    pub group_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Photo {
    /// Dimensions as the photo displays. When both sides are known, the
    /// EXIF orientation decides: values 5-8 are stored sideways and swap
    /// width and height.
    pub fn display_dimensions(&self) -> Option<(i64, i64)> {
        let (width, height) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            _ => return None,
        };
        match self.orientation {
            Some(5..=8) => Some((height, width)),
            _ => Some((width, height)),
        }
    }
}

/// Fields written by ingest. Curation flags, notes and the thumbnail path
/// are owned by other flows and never pass through here.
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub file_path: String,
    pub original_filepath: Option<String>,
    pub sha256_hash: String,
    pub dhash: Option<String>,
    pub file_size: i64,
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub iso: Option<i64>,
    pub f_number: Option<f64>,
    pub exposure_time: Option<f64>,
    pub focal_length: Option<f64>,
    pub file_format: String,
    pub mime_type: String,
    pub is_video: bool,
    pub duration: Option<i64>,
    pub file_created_at: Option<String>,
    pub file_modified_at: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_name: Option<String>,
}

pub(crate) const PHOTO_COLUMNS_SQL: &str = "file_path, original_filepath, sha256_hash, dhash, file_size, date_time,
    camera_make, camera_model, width, height, orientation,
    latitude, longitude, iso, f_number, exposure_time, focal_length,
    file_format, mime_type, is_video, duration,
    file_created_at, file_modified_at,
    city, state, country_name,
    is_curated, is_trashed, rating, notes,
    thumbnail_path, group_id, created_at, updated_at";

pub(crate) fn photo_row(row: &Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        file_path: row.get(0)?,
        original_filepath: row.get(1)?,
        sha256_hash: row.get(2)?,
        dhash: row.get(3)?,
        file_size: row.get(4)?,
        date_time: row.get(5)?,
        camera_make: row.get(6)?,
        camera_model: row.get(7)?,
        width: row.get(8)?,
        height: row.get(9)?,
        orientation: row.get(10)?,
        latitude: row.get(11)?,
        longitude: row.get(12)?,
        iso: row.get(13)?,
        f_number: row.get(14)?,
        exposure_time: row.get(15)?,
        focal_length: row.get(16)?,
        file_format: row.get(17)?,
        mime_type: row.get(18)?,
        is_video: row.get(19)?,
        duration: row.get(20)?,
        file_created_at: row.get(21)?,
        file_modified_at: row.get(22)?,
        city: row.get(23)?,
        state: row.get(24)?,
        country_name: row.get(25)?,
        is_curated: row.get(26)?,
        is_trashed: row.get(27)?,
        rating: row.get(28)?,
        notes: row.get(29)?,
        thumbnail_path: row.get(30)?,
        group_id: row.get(31)?,
        created_at: row.get(32)?,
        updated_at: row.get(33)?,
    })
}

/// Upsert keyed by file_path. A re-ingest overwrites content identity and
/// capture facts but never clobbers user curation (flags, rating, notes),
/// the thumbnail path, or the group assignment.
pub fn upsert_photo(conn: &Connection, photo: &NewPhoto) -> Result<()> {
    conn.execute(
        "INSERT INTO photos (
            file_path, original_filepath, sha256_hash, dhash, file_size, date_time,
            camera_make, camera_model, width, height, orientation,
            latitude, longitude, iso, f_number, exposure_time, focal_length,
            file_format, mime_type, is_video, duration,
            file_created_at, file_modified_at,
            city, state, country_name
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
        ON CONFLICT(file_path) DO UPDATE SET
            original_filepath = excluded.original_filepath,
            sha256_hash = excluded.sha256_hash,
            dhash = excluded.dhash,
            file_size = excluded.file_size,
            date_time = excluded.date_time,
            camera_make = excluded.camera_make,
            camera_model = excluded.camera_model,
            width = excluded.width,
            height = excluded.height,
            orientation = excluded.orientation,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            iso = excluded.iso,
            f_number = excluded.f_number,
            exposure_time = excluded.exposure_time,
            focal_length = excluded.focal_length,
            file_format = excluded.file_format,
            mime_type = excluded.mime_type,
            is_video = excluded.is_video,
            duration = excluded.duration,
            file_created_at = excluded.file_created_at,
            file_modified_at = excluded.file_modified_at,
            city = excluded.city,
            state = excluded.state,
            country_name = excluded.country_name,
            updated_at = datetime('now')",
        params![
            photo.file_path,
            photo.original_filepath,
            photo.sha256_hash,
            photo.dhash,
            photo.file_size,
            photo.date_time,
            photo.camera_make,
            photo.camera_model,
            photo.width,
            photo.height,
            photo.orientation,
            photo.latitude,
            photo.longitude,
            photo.iso,
            photo.f_number,
            photo.exposure_time,
            photo.focal_length,
            photo.file_format,
            photo.mime_type,
            photo.is_video,
            photo.duration,
            photo.file_created_at,
            photo.file_modified_at,
            photo.city,
            photo.state,
            photo.country_name,
        ],
    )?;
    Ok(())
}

pub fn get_photo(conn: &Connection, file_path: &str) -> Result<Option<Photo>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM photos WHERE file_path = ?1", PHOTO_COLUMNS_SQL),
            params![file_path],
            photo_row,
        )
        .optional()?;
    Ok(result)
}

/// The ingest idempotence check: has this content already entered the library?
pub fn sha256_exists(conn: &Connection, sha256: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM photos WHERE sha256_hash = ?1",
        params![sha256],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Which curation slice of the library a page query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    Curated,
    Uncurated,
    Trashed,
}

impl PageShape {
    pub(crate) fn where_clause(self) -> &'static str {
        match self {
            PageShape::Curated => "WHERE is_curated = 1 AND is_trashed = 0",
            PageShape::Uncurated => "WHERE is_curated = 0 AND is_trashed = 0",
            PageShape::Trashed => "WHERE is_trashed = 1",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub total_records: i64,
    pub page_start_record: i64,
    pub page_end_record: i64,
}

pub(crate) fn count_photos(
    conn: &Connection,
    where_clause: &str,
    args: &[Value],
) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM photos {}", where_clause);
    let count = conn.query_row(&sql, params_from_iter(args.iter().cloned()), |row| row.get(0))?;
    Ok(count)
}

/// Page of photos for one curation shape, newest capture first.
pub fn get_photos_page(
    conn: &Connection,
    shape: PageShape,
    limit: i64,
    offset: i64,
    filters: Option<&PhotoFilters>,
) -> Result<PhotoPage> {
    let (filter_sql, filter_args) = build_filter_conditions(filters);
    let where_clause = format!("{}{}", shape.where_clause(), filter_sql);

    let total_records = count_photos(conn, &where_clause, &filter_args)?;

    let sql = format!(
        "SELECT {} FROM photos {} ORDER BY date_time DESC, created_at DESC LIMIT ? OFFSET ?",
        PHOTO_COLUMNS_SQL, where_clause
    );

    let mut args = filter_args;
    args.push(Value::Integer(limit));
    args.push(Value::Integer(offset));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter().cloned()), photo_row)?;
    let mut photos = Vec::new();
    for row in rows {
        photos.push(row?);
    }

    let (page_start_record, page_end_record) = page_bounds(offset, photos.len() as i64, total_records);

    Ok(PhotoPage { photos, total_records, page_start_record, page_end_record })
}

pub(crate) fn page_bounds(offset: i64, page_len: i64, total: i64) -> (i64, i64) {
    if total == 0 || page_len == 0 {
        return (0, 0);
    }
    (offset + 1, (offset + page_len).min(total))
}

/// A calendar day's slice of the current page, for the timeline view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    pub date: String,
    pub photo_count: i64,
    pub total_size: i64,
}

/// Lighter grouping than trips: bucket the page by the date prefix of
/// date_time. Photos without a date land in "Unknown".
pub fn get_photos_with_day_groups(
    conn: &Connection,
    shape: PageShape,
    limit: i64,
    offset: i64,
    filters: Option<&PhotoFilters>,
) -> Result<(PhotoPage, Vec<DayGroup>)> {
    let page = get_photos_page(conn, shape, limit, offset, filters)?;

    let (filter_sql, filter_args) = build_filter_conditions(filters);
    let where_clause = format!("{}{}", shape.where_clause(), filter_sql);

    let sql = format!(
        "SELECT COALESCE(SUBSTR(date_time, 1, 10), 'Unknown') AS day_date,
                COUNT(*) AS photo_count,
                COALESCE(SUM(file_size), 0) AS total_size
         FROM (
             SELECT date_time, file_size FROM photos {}
             ORDER BY date_time DESC, created_at DESC
             LIMIT ? OFFSET ?
         )
         GROUP BY day_date
         ORDER BY day_date DESC",
        where_clause
    );

    let mut args = filter_args;
    args.push(Value::Integer(limit));
    args.push(Value::Integer(offset));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter().cloned()), |row| {
        Ok(DayGroup { date: row.get(0)?, photo_count: row.get(1)?, total_size: row.get(2)? })
    })?;
    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }

    Ok((page, groups))
}

/// Curation update. Rating is clamped to 0..=5; everything else about the
/// row is untouched.
pub fn update_curation(
    conn: &Connection,
    file_path: &str,
    is_curated: bool,
    is_trashed: bool,
    rating: i64,
) -> Result<()> {
    let rating = rating.clamp(0, 5);
    conn.execute(
        "UPDATE photos
         SET is_curated = ?1, is_trashed = ?2, rating = ?3, updated_at = datetime('now')
         WHERE file_path = ?4",
        params![is_curated, is_trashed, rating, file_path],
    )?;
    Ok(())
}

pub fn update_notes(conn: &Connection, file_path: &str, notes: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE photos SET notes = ?1, updated_at = datetime('now') WHERE file_path = ?2",
        params![notes, file_path],
    )?;
    Ok(())
}

pub fn update_thumbnail_path(conn: &Connection, file_path: &str, thumbnail_path: &str) -> Result<()> {
    conn.execute(
        "UPDATE photos SET thumbnail_path = ?1, updated_at = datetime('now') WHERE file_path = ?2",
        params![thumbnail_path, file_path],
    )?;
    Ok(())
}

pub fn update_dhash(conn: &Connection, file_path: &str, dhash: &str) -> Result<()> {
    conn.execute(
        "UPDATE photos SET dhash = ?1, updated_at = datetime('now') WHERE file_path = ?2",
        params![dhash, file_path],
    )?;
    Ok(())
}

pub fn update_group_id(conn: &Connection, file_path: &str, group_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE photos SET group_id = ?1, updated_at = datetime('now') WHERE file_path = ?2",
        params![group_id, file_path],
    )?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct AdjacentPhotos {
    pub before: Option<Photo>,
    pub after: Option<Photo>,
}

/// Closest photo strictly before and strictly after a capture time.
/// Comparison is textual, which is exact for normalized RFC 3339 UTC values.
pub fn get_adjacent_photos(conn: &Connection, date_time: &str) -> Result<AdjacentPhotos> {
    let before = conn
        .query_row(
            &format!(
                "SELECT {} FROM photos WHERE date_time < ?1 ORDER BY date_time DESC LIMIT 1",
                PHOTO_COLUMNS_SQL
            ),
            params![date_time],
            photo_row,
        )
        .optional()?;

    let after = conn
        .query_row(
            &format!(
                "SELECT {} FROM photos WHERE date_time > ?1 ORDER BY date_time ASC LIMIT 1",
                PHOTO_COLUMNS_SQL
            ),
            params![date_time],
            photo_row,
        )
        .optional()?;

    Ok(AdjacentPhotos { before, after })
}

/// All photos ordered by capture time ascending, for the group rebuild.
pub fn all_photos_by_time(conn: &Connection) -> Result<Vec<Photo>> {
    photos_query(conn, &format!("SELECT {} FROM photos ORDER BY date_time ASC", PHOTO_COLUMNS_SQL))
}

/// Ungrouped photos ordered by capture time ascending.
pub fn ungrouped_photos_by_time(conn: &Connection) -> Result<Vec<Photo>> {
    photos_query(
        conn,
        &format!(
            "SELECT {} FROM photos WHERE group_id IS NULL ORDER BY date_time ASC",
            PHOTO_COLUMNS_SQL
        ),
    )
}

/// Non-video photo paths, newest first, for the burst rebuild.
pub fn all_image_paths(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT file_path FROM photos WHERE is_video = 0 ORDER BY date_time DESC")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut paths = Vec::new();
    for row in rows {
        paths.push(row?);
    }
    Ok(paths)
}

/// Every photo path with its orientation and video flag, for the thumbnail rebuild.
pub fn all_photo_paths(conn: &Connection) -> Result<Vec<(String, Option<i64>, bool)>> {
    let mut stmt = conn
        .prepare("SELECT file_path, orientation, is_video FROM photos ORDER BY date_time DESC")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    let mut paths = Vec::new();
    for row in rows {
        paths.push(row?);
    }
    Ok(paths)
}

fn photos_query(conn: &Connection, sql: &str) -> Result<Vec<Photo>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], photo_row)?;
    let mut photos = Vec::new();
    for row in rows {
        photos.push(row?);
    }
    Ok(photos)
}
