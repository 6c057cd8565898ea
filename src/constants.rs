// Darkroom constants
// Threshold defaults and ranges mirror the settings validator in db/settings.rs.

/// Image extensions accepted by the scanner (lowercase, no dot).
pub const IMAGE_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "bmp", "tiff", "tif",
];

/// Video extensions accepted by the scanner (lowercase, no dot).
pub const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v", "mpg", "mpeg",
];

// Hashing
pub const HASH_READ_BUF_SIZE: usize = 1024 * 128;
/// Library filenames embed this many leading hex chars of the SHA-256.
pub const HASH_PREFIX_LEN: usize = 16;

// Ingest concurrency
pub const MAX_COMPUTE_WORKERS: usize = 16;
/// Progress is sampled every this many items in scan/compute loops.
pub const PROGRESS_INTERVAL: usize = 100;

// Library layout
pub const UNKNOWN_FOLDER: &str = "Unknown";
pub const DB_FILENAME: &str = "darkroom.db";

// Grouping
pub const DEFAULT_GROUP_TIME_GAP_MINUTES: i64 = 120;
pub const GROUP_TIME_GAP_RANGE: (i64, i64) = (15, 480);
pub const DEFAULT_GROUP_DISTANCE_KM: f64 = 1.0;
pub const GROUP_DISTANCE_RANGE: (f64, f64) = (0.5, 10.0);
/// Hard cap on a single group's time span, not user-tunable.
pub const MAX_GROUP_SPAN_HOURS: i64 = 12;

// Bursts
pub const DEFAULT_BURST_TIME_THRESHOLD_SECS: i64 = 3;
pub const BURST_TIME_THRESHOLD_RANGE: (i64, i64) = (1, 60);
pub const DEFAULT_BURST_DHASH_THRESHOLD: u32 = 4;
pub const BURST_DHASH_THRESHOLD_RANGE: (u32, u32) = (0, 64);

// Geocoding
pub const GEONAMES_DEFAULT_DIR: &str = ".geonames";
pub const GEOCODE_INITIAL_EPSILON_DEG: f64 = 0.1;
pub const GEOCODE_MAX_EPSILON_DEG: f64 = 1.0;
pub const GAZETTEER_LOG_INTERVAL: usize = 50_000;

// Thumbnails
pub const THUMBNAIL_MAX_WIDTH: u32 = 300;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 300;

// Filter options cache
pub const FILTER_OPTIONS_TTL_SECS: u64 = 300;
