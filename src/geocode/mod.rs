// Reverse geocoding over the GeoNames gazetteer
//
// Load happens once at startup and is skipped when the city table is
// already populated. Lookups probe the R*Tree with an expanding window
// around the query point and return the nearest city by squared distance
// in degree space.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::{
    GAZETTEER_LOG_INTERVAL, GEOCODE_INITIAL_EPSILON_DEG, GEOCODE_MAX_EPSILON_DEG,
};
use crate::error::{DarkroomError, Result};

const COUNTRY_INFO_FILE: &str = "countryInfo.txt";
const ADMIN1_FILE: &str = "admin1CodesASCII.txt";
const CITIES_FILE: &str = "cities1000.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country_name: String,
}

/// Load the gazetteer from a GeoNames directory. Missing files disable
/// geocoding for the run instead of failing it.
pub fn load_gazetteer(conn: &Connection, dir: &Path) -> Result<()> {
    if cities_count(conn)? > 0 {
        info!("geocoding data already loaded ({} cities)", cities_count(conn)?);
        return Ok(());
    }

    let country_path = dir.join(COUNTRY_INFO_FILE);
    let admin1_path = dir.join(ADMIN1_FILE);
    let cities_path = dir.join(CITIES_FILE);

    for path in [&country_path, &admin1_path, &cities_path] {
        if !path.exists() {
            warn!("geonames file not found, geocoding disabled: {}", path.display());
            return Ok(());
        }
    }

    info!("loading geocoding data from {}", dir.display());

    let countries = parse_country_info(&country_path)?;
    let admin1 = parse_admin1_codes(&admin1_path)?;
    let count = load_cities(conn, &cities_path, &countries, &admin1)?;

    info!("geocoding data loaded ({} cities)", count);
    Ok(())
}

/// countryInfo.txt: country code at column 0, display name at column 4.
/// Comment lines start with '#'.
fn parse_country_info(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path)
        .map_err(|e| DarkroomError::Geocode(format!("failed to open {}: {}", path.display(), e)))?;

    let mut countries = HashMap::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() >= 5 && !fields[0].is_empty() {
            countries.insert(fields[0].to_string(), fields[4].to_string());
        }
    }

    info!("parsed country names ({})", countries.len());
    Ok(countries)
}

/// admin1CodesASCII.txt: "CC.admin1" key at column 0, state name at column 1.
fn parse_admin1_codes(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path)
        .map_err(|e| DarkroomError::Geocode(format!("failed to open {}: {}", path.display(), e)))?;

    let mut admin1 = HashMap::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() >= 2 {
            admin1.insert(fields[0].to_string(), fields[1].to_string());
        }
    }

    info!("parsed admin1 codes ({})", admin1.len());
    Ok(admin1)
}

/// cities1000.txt columns: 0 geoname id, 1 name, 4 latitude, 5 longitude,
/// 8 country code, 10 admin1 code. Rows with fewer than 11 columns are
/// skipped. All inserts share one transaction.
fn load_cities(
    conn: &Connection,
    path: &Path,
    countries: &HashMap<String, String>,
    admin1: &HashMap<String, String>,
) -> Result<usize> {
    let file = File::open(path)
        .map_err(|e| DarkroomError::Geocode(format!("failed to open {}: {}", path.display(), e)))?;

    let tx = conn.unchecked_transaction()?;
    let mut count = 0usize;

    {
        let mut city_stmt = tx.prepare(
            "INSERT INTO cities (geoname_id, name, state, country_code, country_name, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let mut rtree_stmt = tx.prepare(
            "INSERT INTO cities_rtree (id, min_lat, max_lat, min_lon, max_lon)
             VALUES (?1, ?2, ?2, ?3, ?3)",
        )?;

        for line in BufReader::new(file).lines() {
            let line = line?;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 11 {
                continue;
            }

            let geoname_id: i64 = match fields[0].parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            let name = fields[1];
            let lat: f64 = match fields[4].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let lon: f64 = match fields[5].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let country_code = fields[8];
            let admin1_code = fields[10];

            let state = if admin1_code.is_empty() {
                ""
            } else {
                admin1
                    .get(&format!("{}.{}", country_code, admin1_code))
                    .map(String::as_str)
                    .unwrap_or("")
            };
            let country_name = countries.get(country_code).map(String::as_str).unwrap_or("");

            city_stmt.execute(params![geoname_id, name, state, country_code, country_name, lat, lon])?;
            rtree_stmt.execute(params![geoname_id, lat, lon])?;

            count += 1;
            if count % GAZETTEER_LOG_INTERVAL == 0 {
                info!("loading cities ({})", count);
            }
        }
    }

    tx.commit()?;
    Ok(count)
}

fn cities_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM cities", [], |row| row.get(0))?;
    Ok(count)
}

/// Nearest city to a coordinate, or None when nothing lies within the
/// widest search window (open ocean).
pub fn reverse_geocode(conn: &Connection, latitude: f64, longitude: f64) -> Result<Option<Location>> {
    reverse_geocode_with_epsilon(conn, latitude, longitude, GEOCODE_INITIAL_EPSILON_DEG)
}

fn reverse_geocode_with_epsilon(
    conn: &Connection,
    latitude: f64,
    longitude: f64,
    epsilon: f64,
) -> Result<Option<Location>> {
    let result = conn
        .query_row(
            "SELECT c.name, c.state, c.country_name,
                    ((c.latitude - ?1) * (c.latitude - ?1) +
                     (c.longitude - ?2) * (c.longitude - ?2)) AS dist
             FROM cities_rtree r
             JOIN cities c ON r.id = c.geoname_id
             WHERE r.min_lat >= ?3 AND r.max_lat <= ?4
               AND r.min_lon >= ?5 AND r.max_lon <= ?6
             ORDER BY dist ASC
             LIMIT 1",
            params![
                latitude,
                longitude,
                latitude - epsilon,
                latitude + epsilon,
                longitude - epsilon,
                longitude + epsilon
            ],
            |row| {
                Ok(Location {
                    city: row.get(0)?,
                    state: row.get(1)?,
                    country_name: row.get(2)?,
                })
            },
        )
        .optional()?;

    match result {
        Some(location) => Ok(Some(location)),
        None if epsilon < GEOCODE_MAX_EPSILON_DEG => {
            reverse_geocode_with_epsilon(conn, latitude, longitude, epsilon * 2.0)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use std::io::Write;

    fn insert_city(
        conn: &Connection,
        id: i64,
        name: &str,
        state: &str,
        country: &str,
        lat: f64,
        lon: f64,
    ) {
        conn.execute(
            "INSERT INTO cities (geoname_id, name, state, country_code, country_name, latitude, longitude)
             VALUES (?1, ?2, ?3, 'XX', ?4, ?5, ?6)",
            params![id, name, state, country, lat, lon],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cities_rtree (id, min_lat, max_lat, min_lon, max_lon)
             VALUES (?1, ?2, ?2, ?3, ?3)",
            params![id, lat, lon],
        )
        .unwrap();
    }

    #[test]
    fn nearest_city_within_initial_window() {
        let conn = open_in_memory().unwrap();
        insert_city(&conn, 1, "San Francisco", "California", "United States", 37.7749, -122.4194);
        insert_city(&conn, 2, "Oakland", "California", "United States", 37.8044, -122.2712);

        let location = reverse_geocode(&conn, 37.78, -122.41).unwrap().unwrap();
        assert_eq!(location.city, "San Francisco");
        assert_eq!(location.state, "California");
        assert_eq!(location.country_name, "United States");
    }

    #[test]
    fn expanding_search_finds_distant_city() {
        let conn = open_in_memory().unwrap();
        // ~0.5 degrees away: outside the first window, inside a doubled one
        insert_city(&conn, 1, "Sacramento", "California", "United States", 38.58, -121.49);

        let location = reverse_geocode(&conn, 38.2, -121.6).unwrap().unwrap();
        assert_eq!(location.city, "Sacramento");
    }

    #[test]
    fn open_ocean_is_absent_not_error() {
        let conn = open_in_memory().unwrap();
        insert_city(&conn, 1, "San Francisco", "California", "United States", 37.7749, -122.4194);
        assert_eq!(reverse_geocode(&conn, 0.0, 0.0).unwrap(), None);
    }

    #[test]
    fn gazetteer_load_joins_names() {
        let dir = tempfile::tempdir().unwrap();

        let mut f = std::fs::File::create(dir.path().join(COUNTRY_INFO_FILE)).unwrap();
        writeln!(f, "# comment line\tignored").unwrap();
        writeln!(f, "US\tUSA\t840\tUS\tUnited States\tWashington").unwrap();

        let mut f = std::fs::File::create(dir.path().join(ADMIN1_FILE)).unwrap();
        writeln!(f, "US.CA\tCalifornia\tCalifornia\t5332921").unwrap();

        let mut f = std::fs::File::create(dir.path().join(CITIES_FILE)).unwrap();
        // 11 tab-separated columns with the fields the loader reads
        writeln!(
            f,
            "5391959\tSan Francisco\tSan Francisco\t\t37.77493\t-122.41942\tP\tPPLA2\tUS\t\tCA"
        )
        .unwrap();
        writeln!(f, "short\trow").unwrap();

        let conn = open_in_memory().unwrap();
        load_gazetteer(&conn, dir.path()).unwrap();

        let location = reverse_geocode(&conn, 37.7749, -122.4194).unwrap().unwrap();
        assert_eq!(location.city, "San Francisco");
        assert_eq!(location.state, "California");
        assert_eq!(location.country_name, "United States");

        // Second load is a no-op
        load_gazetteer(&conn, dir.path()).unwrap();
        assert_eq!(cities_count(&conn).unwrap(), 1);
    }

    #[test]
    fn missing_files_disable_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_in_memory().unwrap();
        load_gazetteer(&conn, dir.path()).unwrap();
        assert_eq!(cities_count(&conn).unwrap(), 0);
    }
}
