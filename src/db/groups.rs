// Photo group (trip) records and grouped pagination

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::filters::{build_filter_conditions, PhotoFilters};
use super::photos::{page_bounds, PageShape, Photo};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub group_id: i64,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub photo_count: i64,
    pub total_size: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl GroupRecord {
    /// "City, Country" display label, mirroring the photo location fields.
    pub fn location(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        for part in [&self.city, &self.state, &self.country_name] {
            if let Some(p) = part {
                if !p.is_empty() {
                    parts.push(p);
                }
            }
        }
        match parts.len() {
            0 => None,
            1 => Some(parts[0].to_string()),
            _ => Some(format!("{}, {}", parts[0], parts[parts.len() - 1])),
        }
    }
}

const GROUP_COLUMNS: &str = "group_id, start_time, end_time, photo_count, total_size,
    latitude, longitude, city, state, country_name, created_at, updated_at";

fn group_from_row(row: &Row) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        group_id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        photo_count: row.get(3)?,
        total_size: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        city: row.get(7)?,
        state: row.get(8)?,
        country_name: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn create_group(
    conn: &Connection,
    start_time: Option<&str>,
    end_time: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<&str>,
    state: Option<&str>,
    country_name: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO photo_groups
            (start_time, end_time, photo_count, total_size, latitude, longitude, city, state, country_name)
         VALUES (?1, ?2, 0, 0, ?3, ?4, ?5, ?6, ?7)",
        params![start_time, end_time, latitude, longitude, city, state, country_name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_group(conn: &Connection, group_id: i64) -> Result<Option<GroupRecord>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM photo_groups WHERE group_id = ?1", GROUP_COLUMNS),
            params![group_id],
            group_from_row,
        )
        .optional()?;
    Ok(result)
}

pub fn get_groups_by_ids(conn: &Connection, group_ids: &[i64]) -> Result<Vec<GroupRecord>> {
    if group_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; group_ids.len()].join(",");
    let sql = format!(
        "SELECT {} FROM photo_groups WHERE group_id IN ({}) ORDER BY start_time DESC",
        GROUP_COLUMNS, placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params_from_iter(group_ids.iter().map(|id| Value::Integer(*id))),
        group_from_row,
    )?;
    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok(groups)
}

/// Recompute a group's derived fields from its member set. Called whenever
/// membership changes so the stored aggregates never drift from the photos.
pub fn update_group_metadata(conn: &Connection, group_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE photo_groups
         SET photo_count = (SELECT COUNT(*) FROM photos WHERE group_id = ?1),
             total_size = (SELECT COALESCE(SUM(file_size), 0) FROM photos WHERE group_id = ?1),
             start_time = (SELECT MIN(date_time) FROM photos WHERE group_id = ?1),
             end_time = (SELECT MAX(date_time) FROM photos WHERE group_id = ?1),
             latitude = (SELECT AVG(latitude) FROM photos WHERE group_id = ?1),
             longitude = (SELECT AVG(longitude) FROM photos WHERE group_id = ?1),
             updated_at = datetime('now')
         WHERE group_id = ?1",
        params![group_id],
    )?;
    Ok(())
}

/// Delete a group after its members have been detached. The back-pointer
/// null-out and this delete must share a transaction (see grouping::rebuild).
pub fn delete_empty_group(conn: &Connection, group_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM photo_groups WHERE group_id = ?1
         AND NOT EXISTS (SELECT 1 FROM photos WHERE group_id = ?1)",
        params![group_id],
    )?;
    Ok(())
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedPage {
    pub photos: Vec<Photo>,
    pub groups: Vec<GroupRecord>,
    pub total_records: i64,
    pub page_start_record: i64,
    pub page_end_record: i64,
}

/// Page photos by whole trip groups.
///
/// Groups are ordered by their newest capture time; the page covers the
/// contiguous run of groups whose member photos intersect
/// [offset, offset + limit), so a group is never split across pages.
pub fn get_photos_with_groups(
    conn: &Connection,
    shape: PageShape,
    limit: i64,
    offset: i64,
    filters: Option<&PhotoFilters>,
) -> Result<GroupedPage> {
    let (filter_sql, filter_args) = build_filter_conditions(filters);
    let where_clause = format!("{} AND group_id IS NOT NULL{}", shape.where_clause(), filter_sql);

    let total_records = super::photos::count_photos(conn, &where_clause, &filter_args)?;

    // The run of groups, newest first
    let run_sql = format!(
        "SELECT group_id, COUNT(*) AS cnt
         FROM photos {}
         GROUP BY group_id
         ORDER BY MAX(date_time) DESC",
        where_clause
    );
    let mut stmt = conn.prepare(&run_sql)?;
    let rows = stmt.query_map(params_from_iter(filter_args.iter().cloned()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut selected: Vec<i64> = Vec::new();
    let mut cumulative: i64 = 0;
    let page_end = offset + limit;
    for row in rows {
        let (group_id, count) = row?;
        let group_start = cumulative;
        cumulative += count;
        if cumulative <= offset {
            continue;
        }
        if group_start >= page_end {
            break;
        }
        selected.push(group_id);
    }

    if selected.is_empty() {
        return Ok(GroupedPage { total_records, ..Default::default() });
    }

    // Member photos of the selected groups, in capture order
    let placeholders = vec!["?"; selected.len()].join(",");
    let photos_sql = format!(
        "SELECT {cols} FROM photos {where_clause} AND group_id IN ({ph})
         ORDER BY date_time DESC, created_at DESC",
        cols = super::photos::PHOTO_COLUMNS_SQL,
        where_clause = where_clause,
        ph = placeholders,
    );

    let mut args = filter_args;
    args.extend(selected.iter().map(|id| Value::Integer(*id)));

    let mut stmt = conn.prepare(&photos_sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter().cloned()), super::photos::photo_row)?;
    let mut photos = Vec::new();
    for row in rows {
        photos.push(row?);
    }

    let groups = get_groups_by_ids(conn, &selected)?;
    let (page_start_record, page_end_record) = page_bounds(offset, photos.len() as i64, total_records);

    Ok(GroupedPage { photos, groups, total_records, page_start_record, page_end_record })
}
