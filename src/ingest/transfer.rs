// Integrity-verified transfer into the library tree

use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use log::{debug, error};

use super::MediaFile;
use crate::constants::{HASH_PREFIX_LEN, HASH_READ_BUF_SIZE, UNKNOWN_FOLDER};
use crate::db::settings::ImportMode;
use crate::error::{DarkroomError, Result};
use crate::exif::datetime::parse_datetime;
use crate::hash::sha256_file;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// The capture time that decides where a file lands: the resolved EXIF
/// time when there is one, else the file's modified time.
fn transfer_datetime(file: &MediaFile) -> Option<DateTime<Utc>> {
    file.metadata
        .date_time
        .as_deref()
        .and_then(parse_datetime)
        .or(file.file_modified_at)
}

/// `<library>/<YYYY>/<MM - MonthName>/<YYYY-MM-DD-HHMMSS>-<sha16>.<ext>`
/// for dated files, `<library>/Unknown/<sha16>.<ext>` otherwise. The
/// caller resolves collisions.
fn destination_path(file: &MediaFile, library_path: &Path) -> PathBuf {
    let hash_prefix = &file.sha256[..HASH_PREFIX_LEN.min(file.sha256.len())];
    let ext = file
        .path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    match transfer_datetime(file) {
        Some(dt) => {
            let month_name = MONTH_NAMES[dt.month0() as usize];
            let folder = format!("{:02} - {}", dt.month(), month_name);
            let filename = format!("{}-{}{}", dt.format("%Y-%m-%d-%H%M%S"), hash_prefix, ext);
            library_path.join(dt.year().to_string()).join(folder).join(filename)
        }
        None => library_path.join(UNKNOWN_FOLDER).join(format!("{}{}", hash_prefix, ext)),
    }
}

/// Append _N before the extension until the path is free.
fn resolve_collision(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file").to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let mut source = fs::File::open(src)?;
    let dest = fs::File::create(dst)?;
    let mut writer = BufWriter::new(dest);

    let mut buf = vec![0u8; HASH_READ_BUF_SIZE];
    loop {
        let read = source.read(&mut buf)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| DarkroomError::Io(e.into_error()))?.sync_all()?;
    Ok(())
}

/// Rename, falling back to copy + remove when rename fails (cross-device
/// moves cannot rename).
fn move_file(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("rename {} -> {} failed ({}), copying instead", src.display(), dst.display(), e);
            copy_file(src, dst)?;
            fs::remove_file(src)?;
            Ok(())
        }
    }
}

/// Transfer one canonical file into the library and verify it landed
/// bit-exact. On checksum mismatch the destination is deleted and an error
/// returned; the source's modified time is restored best-effort.
pub fn transfer_file(file: &MediaFile, library_path: &Path, mode: ImportMode) -> Result<PathBuf> {
    let dest = resolve_collision(destination_path(file, library_path));

    if let Some(folder) = dest.parent() {
        fs::create_dir_all(folder).map_err(|e| {
            DarkroomError::Transfer(format!(
                "failed to create destination folder {}: {}",
                folder.display(),
                e
            ))
        })?;
    }

    match mode {
        ImportMode::Copy => copy_file(&file.path, &dest)?,
        ImportMode::Move => move_file(&file.path, &dest)?,
    }

    // Re-hash the destination: the library never keeps a byte-inexact copy
    let dest_hash = match sha256_file(&dest) {
        Ok(h) => h,
        Err(e) => {
            let _ = fs::remove_file(&dest);
            return Err(DarkroomError::Transfer(format!(
                "failed to verify transferred file {}: {}",
                dest.display(),
                e
            )));
        }
    };

    if dest_hash != file.sha256 {
        let _ = fs::remove_file(&dest);
        return Err(DarkroomError::ChecksumMismatch {
            expected: file.sha256[..HASH_PREFIX_LEN].to_string(),
            actual: dest_hash[..HASH_PREFIX_LEN.min(dest_hash.len())].to_string(),
        });
    }

    if let Some(mtime) = file.file_modified_at {
        let ft = filetime::FileTime::from_system_time(mtime.into());
        if let Err(e) = filetime::set_file_mtime(&dest, ft) {
            error!("failed to preserve modification time on {}: {}", dest.display(), e);
        }
    }

    Ok(dest)
}
