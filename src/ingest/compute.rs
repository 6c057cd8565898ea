// Parallel hash + metadata computation
//
// A bounded pool of workers pulls file indices off a shared cursor,
// computes SHA-256, the perceptual hash, and the EXIF pipeline, and sends
// annotations back to the driver. Workers never touch the database, and no
// error crosses the boundary: a failed hash leaves the sha256 empty, which
// the driver reads as "drop this file".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use log::{error, info};

use super::MediaFile;
use crate::constants::{MAX_COMPUTE_WORKERS, PROGRESS_INTERVAL};
use crate::exif::{self, PhotoMetadata, RawExifFields};
use crate::hash;
use crate::media;
use crate::progress::{Phase, ProgressTracker};

/// Pool size: one worker per core, capped.
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_COMPUTE_WORKERS)
}

struct Annotation {
    sha256: String,
    dhash: Option<u64>,
    has_exif: bool,
    metadata: PhotoMetadata,
}

fn compute_one(file: &MediaFile, compute_dhash: bool) -> Annotation {
    let sha256 = match hash::sha256_file(&file.path) {
        Ok(h) => h,
        Err(e) => {
            error!("failed to compute hash for {}: {}", file.path.display(), e);
            String::new()
        }
    };

    let dhash = if compute_dhash && media::is_image_file(&file.path) {
        match hash::dhash_file(&file.path) {
            Ok(d) => Some(d),
            Err(e) => {
                error!("failed to compute dhash for {}: {}", file.path.display(), e);
                None
            }
        }
    } else {
        None
    };

    let raw = match exif::extract_raw(&file.path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("failed to extract metadata from {}: {}", file.path.display(), e);
            RawExifFields::default()
        }
    };
    let has_exif = !raw.is_empty();
    let metadata = PhotoMetadata::from_raw(&raw);

    Annotation { sha256, dhash, has_exif, metadata }
}

/// Annotate every file in place using `workers` threads. Completion order
/// among workers is unspecified; the driver applies results after all
/// workers finish.
pub fn process_files(files: &mut [MediaFile], workers: usize, compute_dhash: bool, tracker: &ProgressTracker) {
    let total = files.len();
    if total == 0 {
        return;
    }

    info!("processing {} files with {} workers", total, workers);

    let cursor = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Annotation)>();

    {
        let files: &[MediaFile] = files;
        let cursor = &cursor;
        let done = &done;
        std::thread::scope(|scope| {
            for _ in 0..workers.max(1) {
                let tx = tx.clone();
                scope.spawn(move || loop {
                    let i = cursor.fetch_add(1, Ordering::SeqCst);
                    if i >= total {
                        break;
                    }

                    let annotation = compute_one(&files[i], compute_dhash);

                    let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if completed % PROGRESS_INTERVAL == 0 || completed == total {
                        tracker.update(Phase::Hashing, completed, total);
                        info!("processing progress ({}/{})", completed, total);
                    }

                    if tx.send((i, annotation)).is_err() {
                        break;
                    }
                });
            }
        });
    }
    drop(tx);

    for (i, annotation) in rx {
        let file = &mut files[i];
        file.sha256 = annotation.sha256;
        file.dhash = annotation.dhash;
        file.has_exif = annotation.has_exif;
        file.metadata = annotation.metadata;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn media_file(path: std::path::PathBuf) -> MediaFile {
        MediaFile { path, ..Default::default() }
    }

    #[test]
    fn worker_count_is_bounded() {
        let n = worker_count();
        assert!(n >= 1);
        assert!(n <= MAX_COMPUTE_WORKERS);
    }

    #[test]
    fn annotates_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..5 {
            let path = dir.path().join(format!("f{}.jpg", i));
            fs::write(&path, format!("content-{}", i)).unwrap();
            files.push(media_file(path));
        }

        let tracker = ProgressTracker::new();
        process_files(&mut files, 3, false, &tracker);

        for file in &files {
            assert_eq!(file.sha256.len(), 64, "sha256 missing for {:?}", file.path);
        }
        // Distinct content, distinct hashes
        let mut hashes: Vec<&str> = files.iter().map(|f| f.sha256.as_str()).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), 5);
    }

    #[test]
    fn unreadable_file_is_marked_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ok_path = dir.path().join("ok.jpg");
        fs::write(&ok_path, b"fine").unwrap();

        let mut files = vec![
            media_file(dir.path().join("missing.jpg")),
            media_file(ok_path),
        ];

        let tracker = ProgressTracker::new();
        process_files(&mut files, 2, false, &tracker);

        assert!(files[0].sha256.is_empty());
        assert_eq!(files[1].sha256.len(), 64);
    }

    #[test]
    fn dhash_only_for_images_when_enabled() {
        let dir = tempfile::tempdir().unwrap();

        let img_path = dir.path().join("a.png");
        image::RgbImage::from_pixel(16, 16, image::Rgb([100, 100, 100]))
            .save(&img_path)
            .unwrap();

        let vid_path = dir.path().join("b.mp4");
        fs::write(&vid_path, b"not really video").unwrap();

        let mut files = vec![media_file(img_path.clone()), media_file(vid_path)];
        let tracker = ProgressTracker::new();
        process_files(&mut files, 2, true, &tracker);
        assert!(files[0].dhash.is_some());
        assert!(files[1].dhash.is_none());

        // Disabled: no dhash even for images
        let mut files = vec![media_file(img_path)];
        process_files(&mut files, 1, false, &tracker);
        assert!(files[0].dhash.is_none());
    }
}
