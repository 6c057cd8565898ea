// Import-tree scan

use std::path::Path;

use chrono::{DateTime, Utc};
use log::{error, info};
use walkdir::WalkDir;

use super::MediaFile;
use crate::constants::PROGRESS_INTERVAL;
use crate::error::{DarkroomError, Result};
use crate::media;
use crate::progress::{Phase, ProgressTracker};

/// Recursively collect media files under the import path. Unreadable
/// entries are logged and skipped; only a completely unopenable root is
/// fatal. Results are in walk order, which is stable for a given tree.
pub fn scan_directory(import_path: &Path, tracker: &ProgressTracker) -> Result<Vec<MediaFile>> {
    if !import_path.is_dir() {
        return Err(DarkroomError::Scan(format!(
            "import path is not a readable directory: {}",
            import_path.display()
        )));
    }

    let mut files = Vec::new();
    let mut scanned = 0usize;

    for entry in WalkDir::new(import_path).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                error!("failed to access path during scan: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !media::is_media_file(entry.path()) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                error!("failed to stat {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let modified: Option<DateTime<Utc>> = meta.modified().ok().map(Into::into);
        // Platforms without birth time fall back to the modified time
        let created: Option<DateTime<Utc>> = meta.created().ok().map(Into::into).or(modified);

        files.push(MediaFile {
            path: entry.path().to_path_buf(),
            size: meta.len() as i64,
            file_created_at: created,
            file_modified_at: modified,
            ..Default::default()
        });

        scanned += 1;
        if scanned % PROGRESS_INTERVAL == 0 {
            tracker.update(Phase::Scanning, scanned, 0);
            info!("scanning progress ({} files)", scanned);
        }
    }

    tracker.update(Phase::Scanning, scanned, scanned);
    info!("scan completed ({} media files)", scanned);

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_media_recursively_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpg").unwrap();
        fs::write(dir.path().join("nested/b.MOV"), b"mov").unwrap();
        fs::write(dir.path().join("nested/deeper/c.png"), b"png").unwrap();
        fs::write(dir.path().join("notes.txt"), b"txt").unwrap();
        fs::write(dir.path().join("nested/d.xmp"), b"xmp").unwrap();

        let tracker = ProgressTracker::new();
        let files = scan_directory(dir.path(), &tracker).unwrap();

        let mut names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
        names.sort();
        assert_eq!(names, vec!["a.jpg", "b.MOV", "c.png"]);

        for file in &files {
            assert!(file.size > 0);
            assert!(file.file_modified_at.is_some());
            assert!(file.file_created_at.is_some());
            assert!(file.sha256.is_empty());
        }
    }

    #[test]
    fn missing_root_is_fatal() {
        let tracker = ProgressTracker::new();
        assert!(scan_directory(Path::new("/no/such/dir"), &tracker).is_err());
    }

    #[test]
    fn empty_tree_yields_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new();
        let files = scan_directory(dir.path(), &tracker).unwrap();
        assert!(files.is_empty());
    }
}
