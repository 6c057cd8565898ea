// Burst detection: runs of near-identical photos captured seconds apart

use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::photos::{self, Photo};
use crate::error::Result;
use crate::hash::{dhash_file, dhash_hex, hamming_distance};
use crate::progress::{Phase, ProgressTracker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Burst {
    pub burst_id: String,
    pub start_index: usize,
    pub count: usize,
    pub cover_index: usize,
}

/// Detect bursts over one page of photos.
///
/// The input must be sorted by capture time descending (the page queries
/// order this way); the inner walk stops at the first photo outside the
/// time window, which is only correct under that ordering. Pure: nothing
/// is persisted.
pub fn detect_bursts(photos: &[Photo], time_threshold_secs: i64, dhash_threshold: u32) -> Vec<Burst> {
    if photos.len() < 2 {
        return Vec::new();
    }

    let mut bursts = Vec::new();
    let mut visited = vec![false; photos.len()];

    for i in 0..photos.len() {
        if visited[i] {
            continue;
        }

        let base_dhash = match photos[i].dhash.as_deref() {
            Some(d) => d,
            None => continue,
        };
        let base_time = match super::photo_time(&photos[i]) {
            Some(t) => t,
            None => continue,
        };
        visited[i] = true;
        let mut members = vec![i];

        for j in (i + 1)..photos.len() {
            if visited[j] {
                continue;
            }

            let candidate_dhash = match photos[j].dhash.as_deref() {
                Some(d) => d,
                None => continue,
            };
            let candidate_time = match super::photo_time(&photos[j]) {
                Some(t) => t,
                None => continue,
            };

            // Sorted input: once one photo falls outside the window,
            // everything after it does too.
            if (base_time - candidate_time).num_seconds().abs() > time_threshold_secs {
                break;
            }

            match hamming_distance(base_dhash, candidate_dhash) {
                Ok(distance) if distance <= dhash_threshold => {
                    members.push(j);
                    visited[j] = true;
                }
                Ok(_) => {}
                Err(_) => continue,
            }
        }

        if members.len() >= 2 {
            bursts.push(Burst {
                burst_id: format!("burst-{}", bursts.len() + 1),
                start_index: members[0],
                count: members.len(),
                cover_index: members[0],
            });
        }
    }

    bursts
}

/// Recompute and persist the dhash of every non-video photo. Decode
/// failures are counted but never fatal.
pub fn rebuild_burst_data(conn: &Connection, tracker: &ProgressTracker) -> Result<()> {
    info!("starting burst data rebuild");
    tracker.update(Phase::Processing, 0, 0);

    let paths = photos::all_image_paths(conn)?;
    let total = paths.len();
    if total == 0 {
        info!("no image photos to rebuild burst data for");
        tracker.update(Phase::Complete, 0, 0);
        return Ok(());
    }

    tracker.update(Phase::Processing, 0, total);
    let mut failed = 0usize;

    for (completed, path) in paths.iter().enumerate() {
        match dhash_file(std::path::Path::new(path)) {
            Ok(dhash) => {
                if let Err(e) = photos::update_dhash(conn, path, &dhash_hex(dhash)) {
                    error!("failed to store dhash for {}: {}", path, e);
                    failed += 1;
                }
            }
            Err(e) => {
                error!("failed to compute dhash for {}: {}", path, e);
                failed += 1;
            }
        }

        if (completed + 1) % crate::constants::PROGRESS_INTERVAL == 0 {
            tracker.update(Phase::Processing, completed + 1, total);
        }
    }

    tracker.update(Phase::Complete, total, total);
    info!("burst data rebuild complete ({} photos, {} failed)", total, failed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Newest-first page, photos `secs` seconds before a fixed reference.
    fn photo(secs_before: i64, dhash: Option<u64>) -> Photo {
        let t = chrono::DateTime::parse_from_rfc3339("2023-06-15T12:00:00Z").unwrap()
            - chrono::Duration::seconds(secs_before);
        Photo {
            file_path: format!("/l/{}.jpg", secs_before),
            date_time: Some(t.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            dhash: dhash.map(crate::hash::dhash_hex),
            ..Default::default()
        }
    }

    #[test]
    fn five_rapid_near_identical_photos_form_one_burst() {
        // Within 2s of each other, dhashes within 3 bits of the base
        let photos = vec![
            photo(0, Some(0b1111)),
            photo(1, Some(0b1110)),
            photo(1, Some(0b1101)),
            photo(2, Some(0b1011)),
            photo(2, Some(0b0111)),
        ];
        let bursts = detect_bursts(&photos, 3, 3);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].count, 5);
        assert_eq!(bursts[0].start_index, 0);
        assert_eq!(bursts[0].cover_index, 0);
        assert_eq!(bursts[0].burst_id, "burst-1");
    }

    #[test]
    fn distant_photo_stays_out() {
        let photos = vec![
            photo(0, Some(0b1111)),
            photo(1, Some(0b1110)),
            photo(1, Some(0b1101)),
            photo(2, Some(0b1011)),
            // Ten seconds later (earlier in page order): outside the window
            photo(12, Some(0b1111)),
        ];
        let bursts = detect_bursts(&photos, 3, 3);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].count, 4);
    }

    #[test]
    fn dissimilar_content_stays_out() {
        let photos = vec![
            photo(0, Some(0x0000_0000_0000_0000)),
            photo(1, Some(0x0000_0000_0000_0001)),
            photo(1, Some(0xffff_ffff_ffff_ffff)),
        ];
        let bursts = detect_bursts(&photos, 3, 4);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].count, 2);
    }

    #[test]
    fn singletons_are_not_bursts() {
        let photos = vec![photo(0, Some(1)), photo(100, Some(1)), photo(200, Some(1))];
        assert!(detect_bursts(&photos, 3, 4).is_empty());
        assert!(detect_bursts(&photos[..1], 3, 4).is_empty());
        assert!(detect_bursts(&[], 3, 4).is_empty());
    }

    #[test]
    fn dhash_less_photos_are_skipped_not_terminating() {
        let photos = vec![
            photo(0, Some(0b1111)),
            photo(1, None),
            photo(1, Some(0b1110)),
        ];
        let bursts = detect_bursts(&photos, 3, 3);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].count, 2);
    }

    #[test]
    fn two_separate_bursts_get_sequential_ids() {
        let photos = vec![
            photo(0, Some(0b1)),
            photo(1, Some(0b1)),
            photo(600, Some(0xff00)),
            photo(601, Some(0xff00)),
        ];
        let bursts = detect_bursts(&photos, 3, 2);
        assert_eq!(bursts.len(), 2);
        assert_eq!(bursts[0].burst_id, "burst-1");
        assert_eq!(bursts[0].start_index, 0);
        assert_eq!(bursts[1].burst_id, "burst-2");
        assert_eq!(bursts[1].start_index, 2);
    }
}
