// Photo filters and the distinct-value option sets

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::constants::FILTER_OPTIONS_TTL_SECS;
use crate::error::Result;

/// A conjunction of photo filters. Empty lists contribute nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoFilters {
    pub ratings: Vec<i64>,
    pub media_type: Option<MediaTypeFilter>,
    pub orientation: Option<OrientationFilter>,
    pub years: Vec<i64>,
    pub camera_makes: Vec<String>,
    pub camera_models: Vec<String>,
    pub countries: Vec<String>,
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub file_formats: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeFilter {
    Photos,
    Videos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientationFilter {
    Landscape,
    Portrait,
    Square,
}

impl PhotoFilters {
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
            && self.media_type.is_none()
            && self.orientation.is_none()
            && self.years.is_empty()
            && self.camera_makes.is_empty()
            && self.camera_models.is_empty()
            && self.countries.is_empty()
            && self.states.is_empty()
            && self.cities.is_empty()
            && self.file_formats.is_empty()
    }
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

/// Translate filters into " AND ..." SQL plus bound values. Returns an
/// empty string when no filter applies.
pub fn build_filter_conditions(filters: Option<&PhotoFilters>) -> (String, Vec<Value>) {
    let filters = match filters {
        Some(f) if !f.is_empty() => f,
        _ => return (String::new(), Vec::new()),
    };

    let mut conditions: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if !filters.ratings.is_empty() {
        conditions.push(format!("rating IN ({})", placeholders(filters.ratings.len())));
        args.extend(filters.ratings.iter().map(|r| Value::Integer(*r)));
    }

    match filters.media_type {
        Some(MediaTypeFilter::Photos) => conditions.push("is_video = 0".to_string()),
        Some(MediaTypeFilter::Videos) => conditions.push("is_video = 1".to_string()),
        None => {}
    }

    match filters.orientation {
        Some(OrientationFilter::Landscape) => conditions.push("width > height".to_string()),
        Some(OrientationFilter::Portrait) => conditions.push("width < height".to_string()),
        Some(OrientationFilter::Square) => conditions.push("width = height".to_string()),
        None => {}
    }

    if !filters.years.is_empty() {
        conditions.push(format!(
            "CAST(strftime('%Y', date_time) AS INTEGER) IN ({})",
            placeholders(filters.years.len())
        ));
        args.extend(filters.years.iter().map(|y| Value::Integer(*y)));
    }

    for (column, values) in [
        ("camera_make", &filters.camera_makes),
        ("camera_model", &filters.camera_models),
        ("country_name", &filters.countries),
        ("state", &filters.states),
        ("city", &filters.cities),
        ("file_format", &filters.file_formats),
    ] {
        if !values.is_empty() {
            conditions.push(format!("{} IN ({})", column, placeholders(values.len())));
            args.extend(values.iter().map(|v| Value::Text(v.clone())));
        }
    }

    if conditions.is_empty() {
        return (String::new(), Vec::new());
    }

    (format!(" AND {}", conditions.join(" AND ")), args)
}

/// The value sets the filter UI can offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub camera_makes: Vec<String>,
    pub camera_models: Vec<String>,
    pub countries: Vec<String>,
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub file_formats: Vec<String>,
    pub years: Vec<i64>,
}

/// TTL cache for the option sets. Reads are double-checked under one lock;
/// ingest and curation invalidate.
pub struct FilterOptionsCache {
    inner: Mutex<Option<(Instant, FilterOptions)>>,
    ttl: Duration,
}

impl Default for FilterOptionsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterOptionsCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
            ttl: Duration::from_secs(FILTER_OPTIONS_TTL_SECS),
        }
    }

    pub fn invalidate(&self) {
        let mut guard = self.inner.lock().unwrap();
        *guard = None;
    }

    pub fn get(&self, conn: &Connection) -> Result<FilterOptions> {
        let mut guard = self.inner.lock().unwrap();
        if let Some((at, options)) = guard.as_ref() {
            if at.elapsed() < self.ttl {
                return Ok(options.clone());
            }
        }

        let options = load_filter_options(conn)?;
        *guard = Some((Instant::now(), options.clone()));
        Ok(options)
    }
}

fn load_filter_options(conn: &Connection) -> Result<FilterOptions> {
    Ok(FilterOptions {
        camera_makes: distinct_strings(conn, "camera_make")?,
        camera_models: distinct_strings(conn, "camera_model")?,
        countries: distinct_strings(conn, "country_name")?,
        states: distinct_strings(conn, "state")?,
        cities: distinct_strings(conn, "city")?,
        file_formats: distinct_strings(conn, "file_format")?,
        years: distinct_years(conn)?,
    })
}

fn distinct_strings(conn: &Connection, column: &str) -> Result<Vec<String>> {
    // Column names come from the fixed list above, never from input.
    let sql = format!(
        "SELECT DISTINCT {col} FROM photos WHERE {col} IS NOT NULL AND {col} != '' ORDER BY {col} ASC",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

fn distinct_years(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT CAST(strftime('%Y', date_time) AS INTEGER) AS year
         FROM photos WHERE strftime('%Y', date_time) IS NOT NULL ORDER BY year DESC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut years = Vec::new();
    for row in rows {
        years.push(row?);
    }
    Ok(years)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_contribute_nothing() {
        let (sql, args) = build_filter_conditions(None);
        assert_eq!(sql, "");
        assert!(args.is_empty());

        let (sql, args) = build_filter_conditions(Some(&PhotoFilters::default()));
        assert_eq!(sql, "");
        assert!(args.is_empty());
    }

    #[test]
    fn conjunction_of_conditions() {
        let filters = PhotoFilters {
            ratings: vec![4, 5],
            media_type: Some(MediaTypeFilter::Photos),
            orientation: Some(OrientationFilter::Landscape),
            years: vec![2023],
            countries: vec!["United States".to_string()],
            ..Default::default()
        };
        let (sql, args) = build_filter_conditions(Some(&filters));
        assert!(sql.starts_with(" AND "));
        assert!(sql.contains("rating IN (?,?)"));
        assert!(sql.contains("is_video = 0"));
        assert!(sql.contains("width > height"));
        assert!(sql.contains("strftime('%Y', date_time)"));
        assert!(sql.contains("country_name IN (?)"));
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn option_cache_invalidation() {
        let conn = crate::db::open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO photos (file_path, sha256_hash, camera_make, date_time)
             VALUES ('/lib/a.jpg', 'aa', 'Canon', '2023-06-15T05:00:45Z')",
            [],
        )
        .unwrap();

        let cache = FilterOptionsCache::new();
        let options = cache.get(&conn).unwrap();
        assert_eq!(options.camera_makes, vec!["Canon"]);
        assert_eq!(options.years, vec![2023]);

        conn.execute(
            "INSERT INTO photos (file_path, sha256_hash, camera_make)
             VALUES ('/lib/b.jpg', 'bb', 'Nikon')",
            [],
        )
        .unwrap();

        // Cached set until invalidated
        assert_eq!(cache.get(&conn).unwrap().camera_makes, vec!["Canon"]);
        cache.invalidate();
        assert_eq!(cache.get(&conn).unwrap().camera_makes, vec!["Canon", "Nikon"]);
    }
}
