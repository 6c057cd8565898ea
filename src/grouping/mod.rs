// Trip grouping: partition photos into chronologically and spatially
// coherent outings.

pub mod bursts;

use std::collections::HashMap;

use log::{error, info};
use rusqlite::Connection;

use crate::constants::MAX_GROUP_SPAN_HOURS;
use crate::db::photos::{self, Photo};
use crate::db::{groups, settings};
use crate::error::Result;
use crate::exif::datetime::parse_datetime;
use crate::progress::{Phase, ProgressTracker};

/// Great-circle distance in kilometres.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + (d_lon / 2.0).sin().powi(2) * lat1.to_radians().cos() * lat2.to_radians().cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Capture time used for grouping: the resolved EXIF time, then the file
/// mtime, then the row's insertion time.
pub(crate) fn photo_time(photo: &Photo) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Some(dt) = photo.date_time.as_deref().and_then(parse_datetime) {
        return Some(dt);
    }
    if let Some(dt) = photo.file_modified_at.as_deref().and_then(parse_datetime) {
        return Some(dt);
    }
    parse_datetime(&photo.created_at)
}

/// One linear pass over photos sorted by capture time ascending.
///
/// Returns a synthetic group id per index (ids start at 1); photos with no
/// parseable time get no entry. A new group starts when any of these
/// trips:
/// - the gap since the previous photo exceeds `time_gap_minutes`;
/// - the span since the group started exceeds the 12-hour cap;
/// - both the group anchor (first member with coordinates) and this photo
///   have coordinates more than `distance_km` apart.
pub fn detect_group_assignments(
    photos: &[Photo],
    time_gap_minutes: i64,
    distance_km: f64,
) -> HashMap<usize, i64> {
    let mut assignments = HashMap::new();
    if photos.is_empty() {
        return assignments;
    }

    let mut current_group: i64 = 1;
    let mut anchor: Option<(f64, f64)> = None;
    let mut last_time: Option<chrono::DateTime<chrono::Utc>> = None;
    let mut group_start: Option<chrono::DateTime<chrono::Utc>> = None;

    for (i, photo) in photos.iter().enumerate() {
        let time = match photo_time(photo) {
            Some(t) => t,
            None => continue,
        };
        let coords = match (photo.latitude, photo.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        };

        let (last, start) = match (last_time, group_start) {
            (Some(last), Some(start)) => (last, start),
            _ => {
                // First photo with a usable time opens group 1
                assignments.insert(i, current_group);
                last_time = Some(time);
                group_start = Some(time);
                anchor = coords;
                continue;
            }
        };

        // Compare in seconds: a 120.5-minute gap must still trip a
        // 120-minute threshold.
        let gap_seconds = (time - last).num_seconds().abs();
        let span_seconds = (time - start).num_seconds().abs();

        let mut should_split = gap_seconds > time_gap_minutes * 60
            || span_seconds > MAX_GROUP_SPAN_HOURS * 3600;

        if !should_split {
            if let (Some((alat, alon)), Some((plat, plon))) = (anchor, coords) {
                if haversine_distance(alat, alon, plat, plon) > distance_km {
                    should_split = true;
                }
            }
        }

        if should_split {
            current_group += 1;
            group_start = Some(time);
            anchor = coords;
        } else if anchor.is_none() {
            // The anchor is the first member that knows where it was
            anchor = coords;
        }

        assignments.insert(i, current_group);
        last_time = Some(time);
    }

    assignments
}

/// Materialise assignments: one fresh group row per synthetic id, members
/// pointed at it, aggregates recomputed. Returns the number of groups made.
fn persist_assignments(
    conn: &Connection,
    photos: &[Photo],
    assignments: &HashMap<usize, i64>,
    tracker: Option<&ProgressTracker>,
) -> Result<usize> {
    let total = photos.len();
    let mut group_ids: HashMap<i64, i64> = HashMap::new();

    let mut ordered: Vec<(&usize, &i64)> = assignments.iter().collect();
    ordered.sort();

    for (processed, (&photo_idx, &temp_id)) in ordered.into_iter().enumerate() {
        let photo = &photos[photo_idx];

        let real_id = match group_ids.get(&temp_id) {
            Some(id) => *id,
            None => {
                let id = groups::create_group(
                    conn,
                    None,
                    None,
                    None,
                    None,
                    photo.city.as_deref(),
                    photo.state.as_deref(),
                    photo.country_name.as_deref(),
                )?;
                group_ids.insert(temp_id, id);
                id
            }
        };

        if let Err(e) = photos::update_group_id(conn, &photo.file_path, real_id) {
            error!("failed to update group for {}: {}", photo.file_path, e);
        }

        if let Some(tracker) = tracker {
            if (processed + 1) % crate::constants::PROGRESS_INTERVAL == 0 {
                tracker.update(Phase::Processing, processed + 1, total);
            }
        }
    }

    for real_id in group_ids.values() {
        groups::update_group_metadata(conn, *real_id)?;
    }

    Ok(group_ids.len())
}

/// An ad-hoc group synthesised for one page of photos that have no
/// persisted assignment yet (e.g. right after an ingest, before any
/// rebuild ran).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGroup {
    pub group_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub photo_count: i64,
    pub total_size: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Detect display groups over a page of photos using the same split rules
/// as the persisted grouper. Pure; nothing is stored. The page arrives
/// newest-first, so it is reversed into capture order before the pass.
pub fn detect_page_groups(photos: &[Photo], time_gap_minutes: i64, distance_km: f64) -> Vec<PageGroup> {
    let mut ordered: Vec<&Photo> = photos.iter().collect();
    ordered.sort_by(|a, b| photo_time(a).cmp(&photo_time(b)));

    let owned: Vec<Photo> = ordered.iter().map(|p| (*p).clone()).collect();
    let assignments = detect_group_assignments(&owned, time_gap_minutes, distance_km);

    let mut groups: Vec<PageGroup> = Vec::new();
    let mut current: Option<(i64, Vec<&Photo>)> = None;

    let mut indexed: Vec<(usize, i64)> = assignments.iter().map(|(&i, &g)| (i, g)).collect();
    indexed.sort();

    for (idx, group_id) in indexed {
        match current.as_mut() {
            Some((id, members)) if *id == group_id => members.push(ordered[idx]),
            _ => {
                if let Some((id, members)) = current.take() {
                    groups.push(summarise_page_group(id, &members));
                }
                current = Some((group_id, vec![ordered[idx]]));
            }
        }
    }
    if let Some((id, members)) = current.take() {
        groups.push(summarise_page_group(id, &members));
    }

    groups
}

fn summarise_page_group(group_id: i64, members: &[&Photo]) -> PageGroup {
    let times: Vec<chrono::DateTime<chrono::Utc>> =
        members.iter().filter_map(|p| photo_time(p)).collect();
    let format = |t: &chrono::DateTime<chrono::Utc>| t.format("%Y-%m-%dT%H:%M:%SZ").to_string();

    let located: Vec<(f64, f64)> = members
        .iter()
        .filter_map(|p| match (p.latitude, p.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        })
        .collect();
    let (latitude, longitude) = if located.is_empty() {
        (None, None)
    } else {
        let n = located.len() as f64;
        (
            Some(located.iter().map(|(lat, _)| lat).sum::<f64>() / n),
            Some(located.iter().map(|(_, lon)| lon).sum::<f64>() / n),
        )
    };

    PageGroup {
        group_id,
        start_time: times.iter().min().map(&format).unwrap_or_default(),
        end_time: times.iter().max().map(&format).unwrap_or_default(),
        photo_count: members.len() as i64,
        total_size: members.iter().map(|p| p.file_size).sum(),
        latitude,
        longitude,
    }
}

/// Full rebuild: drop every group and regroup the whole library with the
/// current settings.
pub fn rebuild_groups(conn: &Connection, tracker: &ProgressTracker) -> Result<()> {
    info!("starting group rebuild");
    tracker.update(Phase::Processing, 0, 0);

    let time_gap = settings::get_group_time_gap(conn);
    let distance = settings::get_group_distance(conn);
    info!("rebuilding groups (time gap {}min, distance {}km)", time_gap, distance);

    clear_all_groups(conn)?;

    let all_photos = photos::all_photos_by_time(conn)?;
    let total = all_photos.len();
    if total == 0 {
        info!("no photos to group");
        tracker.update(Phase::Complete, 0, 0);
        return Ok(());
    }

    tracker.update(Phase::Processing, 0, total);
    let assignments = detect_group_assignments(&all_photos, time_gap, distance);
    let group_count = persist_assignments(conn, &all_photos, &assignments, Some(tracker))?;

    tracker.update(Phase::Complete, total, total);
    info!("group rebuild complete ({} photos, {} groups)", total, group_count);
    Ok(())
}

/// Incremental pass for photos that have never been grouped. New synthetic
/// ids become new group rows; existing groups are untouched.
pub fn assign_ungrouped_photos(conn: &Connection) -> Result<()> {
    let ungrouped = photos::ungrouped_photos_by_time(conn)?;
    if ungrouped.is_empty() {
        return Ok(());
    }

    info!("assigning groups to {} ungrouped photos", ungrouped.len());

    let time_gap = settings::get_group_time_gap(conn);
    let distance = settings::get_group_distance(conn);
    let assignments = detect_group_assignments(&ungrouped, time_gap, distance);
    let group_count = persist_assignments(conn, &ungrouped, &assignments, None)?;

    info!("assigned {} photos into {} groups", ungrouped.len(), group_count);
    Ok(())
}

/// Detach every photo and delete all group rows in one transaction: the
/// back-pointer null-out must land with the deletes or a crash would strand
/// photos pointing at missing groups.
fn clear_all_groups(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("UPDATE photos SET group_id = NULL, updated_at = datetime('now')", [])?;
    tx.execute("DELETE FROM photo_groups", [])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::db::photos::{upsert_photo, NewPhoto};

    fn photo_at(dt: &str, lat: Option<f64>, lon: Option<f64>) -> Photo {
        Photo {
            file_path: format!("/l/{}.jpg", dt),
            date_time: Some(dt.to_string()),
            latitude: lat,
            longitude: lon,
            ..Default::default()
        }
    }

    #[test]
    fn haversine_known_distances() {
        // SF to Oakland is ~13 km
        let d = haversine_distance(37.7749, -122.4194, 37.8044, -122.2712);
        assert!((d - 13.4).abs() < 1.0, "got {}", d);
        assert_eq!(haversine_distance(37.0, -122.0, 37.0, -122.0), 0.0);
    }

    #[test]
    fn splits_on_time_gap() {
        let photos = vec![
            photo_at("2023-06-15T10:00:00Z", Some(37.0), Some(-122.0)),
            photo_at("2023-06-15T10:30:00Z", Some(37.0), Some(-122.0)),
            photo_at("2023-06-15T14:00:00Z", Some(37.0), Some(-122.0)),
        ];
        let assignments = detect_group_assignments(&photos, 120, 1.0);
        assert_eq!(assignments[&0], assignments[&1]);
        assert_ne!(assignments[&0], assignments[&2]);
    }

    #[test]
    fn splits_on_distance() {
        // 0.1 degrees of latitude is ~11 km, past the 1 km radius
        let photos = vec![
            photo_at("2023-06-15T10:00:00Z", Some(37.0), Some(-122.0)),
            photo_at("2023-06-15T10:15:00Z", Some(37.1), Some(-122.0)),
        ];
        let assignments = detect_group_assignments(&photos, 120, 1.0);
        assert_ne!(assignments[&0], assignments[&1]);
    }

    #[test]
    fn splits_on_max_span() {
        // 15 photos evenly across 15 hours at the same spot: the hour gaps
        // never trip the 120-minute rule, the 12h cap must.
        let photos: Vec<Photo> = (0..15)
            .map(|h| photo_at(&format!("2023-06-15T{:02}:00:00Z", h), Some(37.0), Some(-122.0)))
            .collect();
        let assignments = detect_group_assignments(&photos, 120, 1.0);
        let distinct: std::collections::HashSet<i64> = assignments.values().copied().collect();
        assert!(distinct.len() >= 2, "expected a span split, got {:?}", distinct);
    }

    #[test]
    fn photos_without_time_are_skipped() {
        let mut no_time = photo_at("x", None, None);
        no_time.date_time = Some("not a date".to_string());
        no_time.created_at = "also not".to_string();
        let photos = vec![no_time, photo_at("2023-06-15T10:00:00Z", None, None)];
        let assignments = detect_group_assignments(&photos, 120, 1.0);
        assert!(!assignments.contains_key(&0));
        assert_eq!(assignments[&1], 1);
    }

    #[test]
    fn anchor_comes_from_first_located_member() {
        // First photo has no coordinates; second sets the anchor; third is
        // far from the anchor and must split.
        let photos = vec![
            photo_at("2023-06-15T10:00:00Z", None, None),
            photo_at("2023-06-15T10:05:00Z", Some(37.0), Some(-122.0)),
            photo_at("2023-06-15T10:10:00Z", Some(38.0), Some(-122.0)),
        ];
        let assignments = detect_group_assignments(&photos, 120, 1.0);
        assert_eq!(assignments[&0], assignments[&1]);
        assert_ne!(assignments[&1], assignments[&2]);
    }

    #[test]
    fn page_groups_summarise_in_capture_order() {
        // Newest-first page, like the repository returns
        let photos = vec![
            photo_at("2023-06-15T14:00:00Z", None, None),
            photo_at("2023-06-15T10:30:00Z", Some(37.0), Some(-122.0)),
            photo_at("2023-06-15T10:00:00Z", Some(37.0), Some(-122.0)),
        ];

        let groups = detect_page_groups(&photos, 120, 1.0);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].photo_count, 2);
        assert_eq!(groups[0].start_time, "2023-06-15T10:00:00Z");
        assert_eq!(groups[0].end_time, "2023-06-15T10:30:00Z");
        assert_eq!(groups[0].latitude, Some(37.0));

        assert_eq!(groups[1].photo_count, 1);
        assert_eq!(groups[1].start_time, "2023-06-15T14:00:00Z");
        assert_eq!(groups[1].latitude, None);
    }

    #[test]
    fn page_groups_empty_input() {
        assert!(detect_page_groups(&[], 120, 1.0).is_empty());
    }

    fn seed_photo(conn: &Connection, path: &str, sha: &str, dt: &str) {
        upsert_photo(
            conn,
            &NewPhoto {
                file_path: path.to_string(),
                sha256_hash: sha.to_string(),
                file_size: 10,
                date_time: Some(dt.to_string()),
                file_format: "jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn rebuild_creates_rows_and_aggregates() {
        let conn = open_in_memory().unwrap();
        seed_photo(&conn, "/l/a.jpg", "a", "2023-06-15T10:00:00Z");
        seed_photo(&conn, "/l/b.jpg", "b", "2023-06-15T10:10:00Z");
        seed_photo(&conn, "/l/c.jpg", "c", "2023-06-15T12:10:01Z");

        let tracker = ProgressTracker::new();
        rebuild_groups(&conn, &tracker).unwrap();
        assert_eq!(tracker.snapshot().status, Phase::Complete);

        let group_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM photo_groups", [], |r| r.get(0)).unwrap();
        assert_eq!(group_count, 2);

        // t=0 and t=10min together; t=130min alone
        let a = photos::get_photo(&conn, "/l/a.jpg").unwrap().unwrap();
        let b = photos::get_photo(&conn, "/l/b.jpg").unwrap().unwrap();
        let c = photos::get_photo(&conn, "/l/c.jpg").unwrap().unwrap();
        assert_eq!(a.group_id, b.group_id);
        assert_ne!(a.group_id, c.group_id);

        let group = groups::get_group(&conn, a.group_id.unwrap()).unwrap().unwrap();
        assert_eq!(group.photo_count, 2);
        assert_eq!(group.total_size, 20);
        assert_eq!(group.start_time.as_deref(), Some("2023-06-15T10:00:00Z"));
        assert_eq!(group.end_time.as_deref(), Some("2023-06-15T10:10:00Z"));

        // Rebuilding again replaces, not accumulates
        rebuild_groups(&conn, &tracker).unwrap();
        let group_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM photo_groups", [], |r| r.get(0)).unwrap();
        assert_eq!(group_count, 2);
    }

    #[test]
    fn incremental_assignment_leaves_existing_groups() {
        let conn = open_in_memory().unwrap();
        seed_photo(&conn, "/l/a.jpg", "a", "2023-06-15T10:00:00Z");

        let tracker = ProgressTracker::new();
        rebuild_groups(&conn, &tracker).unwrap();
        let a_group = photos::get_photo(&conn, "/l/a.jpg").unwrap().unwrap().group_id;

        // A new photo far in the future arrives ungrouped
        seed_photo(&conn, "/l/z.jpg", "z", "2024-01-01T10:00:00Z");
        assign_ungrouped_photos(&conn).unwrap();

        let a_after = photos::get_photo(&conn, "/l/a.jpg").unwrap().unwrap().group_id;
        let z_group = photos::get_photo(&conn, "/l/z.jpg").unwrap().unwrap().group_id;
        assert_eq!(a_group, a_after);
        assert!(z_group.is_some());
        assert_ne!(z_group, a_group);

        // Nothing left ungrouped: a second pass is a no-op
        assign_ungrouped_photos(&conn).unwrap();
    }
}
