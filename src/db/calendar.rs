// Calendar summary: per-month photo counts for the timeline view
//
// This is the derived view behind the `calendar` ETag namespace: curation
// and ingest both invalidate it.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarMonth {
    pub year: i64,
    pub month: i64,
    pub month_name: String,
    pub curated_photos: i64,
    pub uncurated_photos: i64,
    pub cover_photo_path: Option<String>,
}

const SHORT_MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn short_month_name(month: i64) -> String {
    if !(1..=12).contains(&month) {
        return String::new();
    }
    SHORT_MONTH_NAMES[(month - 1) as usize].to_string()
}

/// Months that contain photos, newest first. The cover is the best-rated,
/// earliest untrashed photo of the month.
pub fn get_calendar_months(conn: &Connection) -> Result<Vec<CalendarMonth>> {
    let mut stmt = conn.prepare(
        "SELECT
            CAST(strftime('%Y', date_time) AS INTEGER) AS year,
            CAST(strftime('%m', date_time) AS INTEGER) AS month,
            SUM(CASE WHEN is_curated = 1 THEN 1 ELSE 0 END) AS curated_count,
            SUM(CASE WHEN is_curated = 0 THEN 1 ELSE 0 END) AS uncurated_count,
            (SELECT file_path FROM photos p2
             WHERE strftime('%Y-%m', p2.date_time) = strftime('%Y-%m', p1.date_time)
               AND p2.is_trashed = 0
             ORDER BY p2.rating DESC, p2.date_time ASC
             LIMIT 1) AS cover_photo
         FROM photos p1
         WHERE strftime('%Y-%m', date_time) IS NOT NULL
           AND is_trashed = 0
         GROUP BY strftime('%Y-%m', date_time)
         ORDER BY year DESC, month DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        let month: i64 = row.get(1)?;
        Ok(CalendarMonth {
            year: row.get(0)?,
            month,
            month_name: short_month_name(month),
            curated_photos: row.get(2)?,
            uncurated_photos: row.get(3)?,
            cover_photo_path: row.get(4)?,
        })
    })?;

    let mut months = Vec::new();
    for row in rows {
        months.push(row?);
    }
    Ok(months)
}
