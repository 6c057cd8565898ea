// Ingest run orchestration
//
// The driver thread walks the session through its phases and owns every
// database write. Per-file failures are recorded and skipped; only an
// unopenable import path fails the whole run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{error, info};
use rusqlite::Connection;

use super::{compute, scan, transfer, AnalysisStats, DuplicateFile, DuplicateGroup, MediaFile};
use crate::constants::{HASH_PREFIX_LEN, PROGRESS_INTERVAL};
use crate::context::AppContext;
use crate::db::photos::{self, NewPhoto};
use crate::db::sessions::{self, FileOutcome, ImportStatus};
use crate::db::settings::{self, ImportMode};
use crate::error::Result;
use crate::geocode;
use crate::media;
use crate::progress::Phase;
use crate::thumbs;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub import_path: PathBuf,
    pub library_path: PathBuf,
    pub thumbnails_path: PathBuf,
    /// None reads the import_mode setting.
    pub mode: Option<ImportMode>,
}

/// Run one full ingest session: scan, compute, dedup, transfer, index.
/// Idempotent per SHA-256 - content already in the library is skipped.
pub fn run_ingest(conn: &Connection, ctx: &AppContext, opts: &IngestOptions) -> Result<AnalysisStats> {
    let mode = opts.mode.unwrap_or_else(|| settings::get_import_mode(conn));
    let started_at = Utc::now();
    let session_id = sessions::create_import_session(
        conn,
        &opts.import_path.to_string_lossy(),
        mode.as_str(),
    )?;

    info!("starting import analysis (session {}, mode {})", session_id, mode.as_str());

    match run_ingest_session(conn, ctx, opts, mode, session_id) {
        Ok(stats) => {
            sessions::complete_import_session(
                conn,
                session_id,
                stats.moved_to_library as i64,
                started_at,
                None,
            )?;
            ctx.trackers.import.update(Phase::Complete, stats.total_scanned, stats.total_scanned);
            ctx.invalidate_on_import();
            log_summary(&stats, mode);
            Ok(stats)
        }
        Err(e) => {
            error!("import failed: {}", e);
            sessions::complete_import_session(conn, session_id, 0, started_at, Some(&e.to_string()))?;
            ctx.trackers.import.update(Phase::Error, 0, 0);
            Err(e)
        }
    }
}

fn run_ingest_session(
    conn: &Connection,
    ctx: &AppContext,
    opts: &IngestOptions,
    mode: ImportMode,
    session_id: i64,
) -> Result<AnalysisStats> {
    let tracker = &ctx.trackers.import;
    let mut stats = AnalysisStats {
        import_path: opts.import_path.to_string_lossy().to_string(),
        ..Default::default()
    };

    // P1: scan
    tracker.update(Phase::Scanning, 0, 0);
    let mut files = scan::scan_directory(&opts.import_path, tracker)?;
    stats.total_scanned = files.len();

    if files.is_empty() {
        info!("no media files found in import folder");
        return Ok(stats);
    }

    // P2: parallel hash + metadata
    sessions::update_import_session_status(conn, session_id, ImportStatus::Hashing)?;
    tracker.update(Phase::Hashing, 0, files.len());
    let burst_detection = settings::get_burst_detection_enabled(conn);
    compute::process_files(&mut files, compute::worker_count(), burst_detection, tracker);

    // P3: filter content the library already has
    sessions::update_import_session_status(conn, session_id, ImportStatus::CheckingImported)?;
    tracker.update(Phase::CheckingImported, 0, files.len());

    let total = files.len();
    let mut new_files: Vec<MediaFile> = Vec::new();
    for (i, file) in files.into_iter().enumerate() {
        if file.sha256.is_empty() {
            // Hash failure dropped it from the batch; the file stays in the
            // import path.
            continue;
        }

        match photos::sha256_exists(conn, &file.sha256) {
            Ok(true) => stats.already_imported += 1,
            Ok(false) => new_files.push(file),
            Err(e) => {
                error!("failed to check hash existence for {}: {}", file.path.display(), e);
                new_files.push(file);
            }
        }

        if (i + 1) % PROGRESS_INTERVAL == 0 || i + 1 == total {
            tracker.update(Phase::CheckingImported, i + 1, total);
        }
    }

    info!(
        "filtered already-imported photos ({} scanned, {} new, {} already imported)",
        stats.total_scanned,
        new_files.len(),
        stats.already_imported
    );

    if new_files.is_empty() {
        sessions::update_import_session_stats(
            conn,
            session_id,
            stats.total_scanned as i64,
            stats.already_imported as i64,
            0,
            0,
            0,
        )?;
        info!("all files already imported, nothing to process");
        return Ok(stats);
    }

    // P4: bucket byte-identical files within the batch
    sessions::update_import_session_status(conn, session_id, ImportStatus::FindingDuplicates)?;
    tracker.update(Phase::FindingDuplicates, 0, 0);

    let queued = find_duplicates(conn, session_id, new_files, &mut stats)?;

    // Second dedup stage: flag visually-identical survivors. Advisory only,
    // everything queued still transfers.
    if burst_detection {
        let threshold = settings::get_burst_dhash_threshold(conn);
        stats.near_duplicates = super::neardupe::find_near_duplicates(&queued, threshold);
        if !stats.near_duplicates.is_empty() {
            info!("found {} near-duplicate groups in batch", stats.near_duplicates.len());
        }
    }

    sessions::update_import_session_stats(
        conn,
        session_id,
        stats.total_scanned as i64,
        stats.already_imported as i64,
        stats.unique_files as i64,
        stats.duplicate_groups as i64,
        stats.duplicates_removed as i64,
    )?;

    // P5: sequential transfer + index, in scan order
    sessions::update_import_session_status(conn, session_id, ImportStatus::Importing)?;
    transfer_and_index(conn, ctx, opts, mode, session_id, &queued, &mut stats)?;

    tracker.update(Phase::ImportingComplete, stats.moved_to_library, queued.len());
    Ok(stats)
}

/// Bucket new files by SHA-256, pick a canonical per bucket, and record the
/// rest as skipped duplicates. Buckets keep scan order, and the canonical
/// is the first member with EXIF, else the first by scan order.
fn find_duplicates(
    conn: &Connection,
    session_id: i64,
    new_files: Vec<MediaFile>,
    stats: &mut AnalysisStats,
) -> Result<Vec<MediaFile>> {
    let mut bucket_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<MediaFile>> = HashMap::new();

    for file in new_files {
        if !buckets.contains_key(&file.sha256) {
            bucket_order.push(file.sha256.clone());
        }
        buckets.entry(file.sha256.clone()).or_default().push(file);
    }

    info!("computed hashes ({} unique)", bucket_order.len());

    let mut queued = Vec::new();
    for sha256 in bucket_order {
        let mut members = buckets.remove(&sha256).unwrap_or_default();

        if members.len() == 1 {
            stats.unique_files += 1;
            queued.push(members.pop().unwrap());
            continue;
        }

        stats.duplicate_groups += 1;
        let candidate = members
            .iter()
            .position(|m| m.has_exif)
            .unwrap_or(0);

        let mut group = DuplicateGroup {
            hash: sha256[..HASH_PREFIX_LEN].to_string(),
            files: Vec::with_capacity(members.len()),
        };

        for (i, member) in members.into_iter().enumerate() {
            group.files.push(DuplicateFile {
                path: member.path.to_string_lossy().to_string(),
                size: member.size,
                has_exif: member.has_exif,
                is_candidate: i == candidate,
            });

            if i == candidate {
                stats.unique_files += 1;
                queued.push(member);
            } else {
                stats.duplicates_removed += 1;
                sessions::record_imported_photo(
                    conn,
                    session_id,
                    &member.path.to_string_lossy(),
                    FileOutcome::Skipped,
                    None,
                )?;
            }
        }

        stats.duplicates.push(group);
    }

    Ok(queued)
}

/// P5/P6 body: move each canonical into the library, verify, upsert the
/// photo row with reverse-geocoded place names, and derive its thumbnail.
fn transfer_and_index(
    conn: &Connection,
    ctx: &AppContext,
    opts: &IngestOptions,
    mode: ImportMode,
    session_id: i64,
    queued: &[MediaFile],
    stats: &mut AnalysisStats,
) -> Result<()> {
    let tracker = &ctx.trackers.import;
    let total = queued.len();
    tracker.update(Phase::Importing, 0, total);
    info!("starting file transfers ({} to library)", total);

    for file in queued {
        let dest = match transfer::transfer_file(file, &opts.library_path, mode) {
            Ok(dest) => dest,
            Err(e) => {
                error!("failed to transfer {}: {}", file.path.display(), e);
                record_file_error(conn, session_id, &file.path.to_string_lossy(), &e.to_string());
                stats.error_count += 1;
                continue;
            }
        };

        if let Err(e) = index_photo(conn, file, &dest) {
            error!("failed to index {}: {}", dest.display(), e);
            record_file_error(conn, session_id, &dest.to_string_lossy(), &e.to_string());
            stats.error_count += 1;
            continue;
        }

        // Thumbnail failure never blocks the import
        let _ = thumbs::thumbnail_after_ingest(
            conn,
            &opts.library_path,
            &opts.thumbnails_path,
            &dest,
            file.metadata.orientation,
        );

        if let Err(e) = sessions::record_imported_photo(
            conn,
            session_id,
            &dest.to_string_lossy(),
            FileOutcome::Success,
            None,
        ) {
            error!("failed to record imported photo {}: {}", dest.display(), e);
        }

        stats.moved_to_library += 1;
        tracker.update_with_message(Phase::Importing, stats.moved_to_library, total, file.file_name());
    }

    Ok(())
}

fn record_file_error(conn: &Connection, session_id: i64, path: &str, message: &str) {
    if let Err(e) =
        sessions::record_imported_photo(conn, session_id, path, FileOutcome::Error, Some(message))
    {
        error!("failed to record import error for {}: {}", path, e);
    }
    if let Err(e) = sessions::increment_import_errors(conn, session_id) {
        error!("failed to increment session error count: {}", e);
    }
}

/// Upsert the photo row for a freshly-landed library file. A geocoder
/// failure leaves the location fields unset.
fn index_photo(conn: &Connection, file: &MediaFile, dest: &Path) -> Result<()> {
    let (file_format, mime_type) = media::file_metadata(dest);
    let meta = &file.metadata;

    let location = match (meta.latitude, meta.longitude) {
        (Some(lat), Some(lon)) => match geocode::reverse_geocode(conn, lat, lon) {
            Ok(location) => location,
            Err(e) => {
                error!("reverse geocode failed for {}: {}", dest.display(), e);
                None
            }
        },
        _ => None,
    };

    let photo = NewPhoto {
        file_path: dest.to_string_lossy().to_string(),
        original_filepath: Some(file.path.to_string_lossy().to_string()),
        sha256_hash: file.sha256.clone(),
        dhash: file.dhash.map(crate::hash::dhash_hex),
        file_size: file.size,
        date_time: meta.date_time.clone(),
        camera_make: meta.camera_make.clone(),
        camera_model: meta.camera_model.clone(),
        width: meta.width,
        height: meta.height,
        orientation: meta.orientation,
        latitude: meta.latitude,
        longitude: meta.longitude,
        iso: meta.iso,
        f_number: meta.f_number,
        exposure_time: meta.exposure_time,
        focal_length: meta.focal_length,
        file_format,
        mime_type,
        is_video: media::is_video_file(dest),
        duration: meta.duration,
        file_created_at: file.file_created_at.map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        file_modified_at: file.file_modified_at.map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        city: location.as_ref().map(|l| l.city.clone()),
        state: location.as_ref().map(|l| l.state.clone()),
        country_name: location.as_ref().map(|l| l.country_name.clone()),
    };

    photos::upsert_photo(conn, &photo)
}

fn log_summary(stats: &AnalysisStats, mode: ImportMode) {
    let verb = match mode {
        ImportMode::Copy => "copied",
        ImportMode::Move => "moved",
    };
    info!(
        "import complete: {} scanned, {} already imported, {} unique, {} duplicate groups, {} duplicates skipped, {} {} to library, {} errors",
        stats.total_scanned,
        stats.already_imported,
        stats.unique_files,
        stats.duplicate_groups,
        stats.duplicates_removed,
        stats.moved_to_library,
        verb,
        stats.error_count,
    );
}
