// Media file classification by extension

use std::path::Path;

use crate::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

fn extension_lower(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase())
}

pub fn is_media_file(path: &Path) -> bool {
    is_image_file(path) || is_video_file(path)
}

pub fn is_image_file(path: &Path) -> bool {
    match extension_lower(path) {
        Some(ext) => IMAGE_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

pub fn is_video_file(path: &Path) -> bool {
    match extension_lower(path) {
        Some(ext) => VIDEO_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// File format token (lowercase extension) and MIME type for a library file.
pub fn file_metadata(path: &Path) -> (String, String) {
    let format = extension_lower(path).unwrap_or_default();
    let mime = content_type(&format).to_string();
    (format, mime)
}

pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "m4v" => "video/x-m4v",
        "mpg" | "mpeg" => "video/mpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert!(is_image_file(Path::new("photo.JPG")));
        assert!(is_image_file(Path::new("photo.heic")));
        assert!(is_video_file(Path::new("clip.MOV")));
        assert!(is_media_file(Path::new("a/b/clip.webm")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(!is_media_file(Path::new("no_extension")));
    }

    #[test]
    fn file_metadata_tokens() {
        let (format, mime) = file_metadata(Path::new("x/y/IMG_0001.JPEG"));
        assert_eq!(format, "jpeg");
        assert_eq!(mime, "image/jpeg");

        let (format, mime) = file_metadata(Path::new("v.mkv"));
        assert_eq!(format, "mkv");
        assert_eq!(mime, "video/x-matroska");
    }
}
