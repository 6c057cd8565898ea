// Thumbnail generation and the batch rebuild driver
//
// Images are decoded, EXIF-orientation corrected, bounded to 300x300, and
// written as JPEG. Videos get a single frame piped out of ffmpeg. Every
// failure is soft: the photo row simply keeps no thumbnail path.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use log::{error, info, warn};
use rusqlite::Connection;

use crate::constants::{PROGRESS_INTERVAL, THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_WIDTH};
use crate::db::photos;
use crate::error::{DarkroomError, Result};
use crate::media;
use crate::progress::{Phase, ProgressTracker};

/// Thumbnails mirror the library tree under the thumbnails root, always
/// with a .jpg leaf.
pub fn thumbnail_path(library_path: &Path, thumbnails_path: &Path, photo_path: &Path) -> PathBuf {
    let relative = photo_path.strip_prefix(library_path).unwrap_or(photo_path);
    thumbnails_path.join(relative.with_extension("jpg"))
}

/// Generate a thumbnail for one media file. Returns the written path.
pub fn generate_thumbnail(
    source: &Path,
    dest: &Path,
    orientation: Option<i64>,
    is_video: bool,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    if is_video {
        return video_thumbnail(source, dest);
    }
    image_thumbnail(source, dest, orientation)
}

fn image_thumbnail(source: &Path, dest: &Path, orientation: Option<i64>) -> Result<()> {
    let img = image::open(source)
        .map_err(|e| DarkroomError::Thumbnail(format!("failed to decode {}: {}", source.display(), e)))?;

    let img = apply_orientation(img, orientation.unwrap_or(1));
    let thumb = img.thumbnail(THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT);

    let file = fs::File::create(dest)?;
    let mut writer = BufWriter::new(file);
    thumb
        .to_rgb8()
        .write_to(&mut writer, image::ImageFormat::Jpeg)
        .map_err(|e| DarkroomError::Thumbnail(format!("failed to encode {}: {}", dest.display(), e)))?;

    Ok(())
}

/// Undo the camera's stored rotation so the thumbnail displays upright.
/// Orientation values follow the EXIF tag: 1 normal, 2 mirrored, 3 rotated
/// 180, 4 flipped, 5-8 the transposed variants.
fn apply_orientation(img: DynamicImage, orientation: i64) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn video_thumbnail(source: &Path, dest: &Path) -> Result<()> {
    let scale = format!(
        "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
        THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT
    );
    let output = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(source)
        .args(["-vframes", "1", "-vf", &scale])
        .arg(dest)
        .output()
        .map_err(|e| DarkroomError::Thumbnail(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DarkroomError::Thumbnail(format!(
            "ffmpeg failed on {}: {}",
            source.display(),
            stderr.trim()
        )));
    }
    Ok(())
}

/// Re-derive every photo's thumbnail. Missing sources and decode failures
/// are logged and counted; the driver always runs to completion.
pub fn rebuild_thumbnails(
    conn: &Connection,
    library_path: &Path,
    thumbnails_path: &Path,
    tracker: &ProgressTracker,
) -> Result<()> {
    info!("starting thumbnail rebuild");
    tracker.update(Phase::Processing, 0, 0);

    let photos = photos::all_photo_paths(conn)?;
    let total = photos.len();
    if total == 0 {
        info!("no photos to rebuild thumbnails for");
        tracker.update(Phase::Complete, 0, 0);
        return Ok(());
    }

    tracker.update(Phase::Processing, 0, total);
    let mut failed = 0usize;

    for (completed, (path, orientation, is_video)) in photos.iter().enumerate() {
        let source = Path::new(path);
        if !source.exists() {
            warn!("photo file missing, skipping thumbnail: {}", path);
            failed += 1;
        } else {
            let dest = thumbnail_path(library_path, thumbnails_path, source);
            match generate_thumbnail(source, &dest, *orientation, *is_video) {
                Ok(()) => {
                    if let Err(e) =
                        photos::update_thumbnail_path(conn, path, &dest.to_string_lossy())
                    {
                        error!("failed to record thumbnail for {}: {}", path, e);
                    }
                }
                Err(e) => {
                    error!("failed to generate thumbnail for {}: {}", path, e);
                    failed += 1;
                }
            }
        }

        if (completed + 1) % PROGRESS_INTERVAL == 0 {
            tracker.update(Phase::Processing, completed + 1, total);
        }
    }

    tracker.update(Phase::Complete, total, total);
    info!("thumbnail rebuild complete ({} photos, {} failed)", total, failed);
    Ok(())
}

/// Best-effort thumbnail during ingest: generate, record the path on the
/// row, and report the path back. None means the failure was logged.
pub fn thumbnail_after_ingest(
    conn: &Connection,
    library_path: &Path,
    thumbnails_path: &Path,
    photo_path: &Path,
    orientation: Option<i64>,
) -> Option<PathBuf> {
    let dest = thumbnail_path(library_path, thumbnails_path, photo_path);
    let is_video = media::is_video_file(photo_path);

    if let Err(e) = generate_thumbnail(photo_path, &dest, orientation, is_video) {
        error!("failed to generate thumbnail for {}: {}", photo_path.display(), e);
        return None;
    }

    if let Err(e) =
        photos::update_thumbnail_path(conn, &photo_path.to_string_lossy(), &dest.to_string_lossy())
    {
        error!("failed to record thumbnail for {}: {}", photo_path.display(), e);
    }

    Some(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_mirrors_library_tree() {
        let thumb = thumbnail_path(
            Path::new("/library"),
            Path::new("/thumbs"),
            Path::new("/library/2023/06 - June/a.heic"),
        );
        assert_eq!(thumb, Path::new("/thumbs/2023/06 - June/a.jpg"));
    }

    #[test]
    fn path_outside_library_keeps_own_shape() {
        let thumb =
            thumbnail_path(Path::new("/library"), Path::new("/thumbs"), Path::new("else/b.png"));
        assert_eq!(thumb, Path::new("/thumbs/else/b.jpg"));
    }

    #[test]
    fn image_thumbnail_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.png");
        let dest = dir.path().join("out/in.jpg");

        // A 900x600 gradient, so the thumbnail must shrink
        let img = image::RgbImage::from_fn(900, 600, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        });
        img.save(&source).unwrap();

        generate_thumbnail(&source, &dest, Some(1), false).unwrap();
        let thumb = image::open(&dest).unwrap();
        assert!(thumb.width() <= THUMBNAIL_MAX_WIDTH);
        assert!(thumb.height() <= THUMBNAIL_MAX_HEIGHT);
    }

    #[test]
    fn orientation_six_rotates_dimensions() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(40, 20));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (20, 40));

        let img = DynamicImage::ImageRgb8(image::RgbImage::new(40, 20));
        let unchanged = apply_orientation(img, 1);
        assert_eq!((unchanged.width(), unchanged.height()), (40, 20));
    }

    #[test]
    fn undecodable_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, b"not an image").unwrap();
        let dest = dir.path().join("broken_thumb.jpg");
        assert!(generate_thumbnail(&source, &dest, None, false).is_err());
    }
}
