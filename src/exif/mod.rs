// EXIF metadata: extract -> normalize -> validate
//
// Extract reads raw fields from exiftool's JSON dump, keeping everything as
// optional strings. Normalize converts strings to typed values (DMS to
// decimal, rationals to floats), returning None for anything unparseable.
// Validate rejects impossible values and warns about implausible ones.
// Downstream code must treat every resulting field as optional.

pub mod datetime;
pub mod normalize;
pub mod validate;

use std::path::Path;
use std::process::Command;

use serde_json::Value;

use crate::error::{DarkroomError, Result};

/// Raw string fields pulled from the exiftool dump. No typing, no
/// validation; absent means the tool did not report the tag.
#[derive(Debug, Clone, Default)]
pub struct RawExifFields {
    pub date_time: Option<String>,
    pub offset_time: Option<String>,
    pub gps_date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub orientation: Option<String>,
    pub iso: Option<String>,
    pub f_number: Option<String>,
    pub exposure_time: Option<String>,
    pub focal_length: Option<String>,
    pub duration: Option<String>,
    pub gps_latitude: Option<String>,
    pub gps_longitude: Option<String>,
    pub gps_coordinates: Option<String>,
}

impl RawExifFields {
    pub fn is_empty(&self) -> bool {
        self.date_time.is_none()
            && self.camera_make.is_none()
            && self.camera_model.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.orientation.is_none()
            && self.iso.is_none()
            && self.f_number.is_none()
            && self.exposure_time.is_none()
            && self.focal_length.is_none()
            && self.duration.is_none()
            && self.gps_latitude.is_none()
            && self.gps_longitude.is_none()
            && self.gps_coordinates.is_none()
    }
}

/// Typed metadata after normalization and validation. `date_time` is
/// RFC 3339 UTC when the capture time resolved cleanly.
#[derive(Debug, Clone, Default)]
pub struct PhotoMetadata {
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,
    pub iso: Option<i64>,
    pub f_number: Option<f64>,
    pub exposure_time: Option<f64>,
    pub focal_length: Option<f64>,
    pub duration: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl PhotoMetadata {
    pub fn from_raw(raw: &RawExifFields) -> Self {
        let mut meta = PhotoMetadata {
            camera_make: raw.camera_make.clone(),
            camera_model: raw.camera_model.clone(),
            width: raw.width.as_deref().and_then(normalize::normalize_width),
            height: raw.height.as_deref().and_then(normalize::normalize_height),
            orientation: raw.orientation.as_deref().and_then(normalize::normalize_orientation),
            iso: raw
                .iso
                .as_deref()
                .and_then(normalize::normalize_iso)
                .and_then(validate::validate_iso),
            f_number: raw
                .f_number
                .as_deref()
                .and_then(normalize::normalize_f_number)
                .and_then(validate::validate_aperture),
            exposure_time: raw
                .exposure_time
                .as_deref()
                .and_then(normalize::normalize_exposure_time)
                .and_then(validate::validate_exposure_time),
            focal_length: raw
                .focal_length
                .as_deref()
                .and_then(normalize::normalize_focal_length)
                .and_then(validate::validate_focal_length),
            duration: raw.duration.as_deref().and_then(normalize::normalize_duration),
            ..Default::default()
        };

        // Photos carry separate GPSLatitude/GPSLongitude tags; videos pack
        // both into a single ISO-6709 GPSCoordinates value.
        let coords = match (
            raw.gps_latitude.as_deref().and_then(normalize::normalize_gps_coordinate),
            raw.gps_longitude.as_deref().and_then(normalize::normalize_gps_coordinate),
        ) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => raw
                .gps_coordinates
                .as_deref()
                .and_then(normalize::normalize_iso6709_coordinates),
        };
        if let Some((lat, lon)) = coords.and_then(|(lat, lon)| validate::validate_coordinates(lat, lon))
        {
            meta.latitude = Some(lat);
            meta.longitude = Some(lon);
        }

        // Validate the raw capture time before timezone resolution: corrupt
        // clocks (epoch, pre-1826, far future) read cleanest in camera-local
        // form, and resolution would smear the epoch day across zones.
        meta.date_time = raw
            .date_time
            .as_deref()
            .and_then(|v| validate::validate_datetime("DateTime", v))
            .map(|v| {
                datetime::resolve_datetime(
                    &v,
                    raw.offset_time.as_deref(),
                    raw.gps_date_time.as_deref(),
                )
            });

        meta
    }
}

/// Run exiftool and pick the fields this engine understands out of the
/// JSON dump. Tag priority matches what cameras actually populate:
/// DateTimeOriginal for photos, CreationDate (carries the local zone) over
/// CreateDate (often UTC) for videos.
pub fn extract_raw(path: &Path) -> Result<RawExifFields> {
    let output = Command::new("exiftool")
        .arg("-j")
        .arg(path)
        .output()
        .map_err(|e| DarkroomError::Metadata(format!("failed to run exiftool: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DarkroomError::Metadata(format!(
            "exiftool failed on {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let dump: Value = serde_json::from_slice(&output.stdout)?;
    let record = match dump.as_array().and_then(|a| a.first()) {
        Some(r) => r,
        None => return Ok(RawExifFields::default()),
    };

    Ok(fields_from_dump(record))
}

fn fields_from_dump(record: &Value) -> RawExifFields {
    let mut fields = RawExifFields {
        date_time: pick(
            record,
            &["DateTimeOriginal", "CreationDate", "CreateDate", "MediaCreateDate", "TrackCreateDate"],
        ),
        offset_time: pick(record, &["OffsetTimeOriginal", "OffsetTimeDigitized", "OffsetTime"]),
        gps_date_time: pick(record, &["GPSDateTime"]),
        camera_make: pick(record, &["Make"]),
        camera_model: pick(record, &["Model"]),
        width: pick(record, &["ImageWidth"]),
        height: pick(record, &["ImageHeight"]),
        orientation: pick(record, &["Orientation"]),
        iso: pick(record, &["ISO"]),
        f_number: pick(record, &["FNumber"]),
        exposure_time: pick(record, &["ExposureTime"]),
        focal_length: pick(record, &["FocalLength"]),
        duration: pick(record, &["Duration"]),
        gps_latitude: pick(record, &["GPSLatitude"]),
        gps_longitude: pick(record, &["GPSLongitude"]),
        gps_coordinates: None,
    };

    // Video containers report a combined coordinate tag instead.
    if fields.gps_latitude.is_none() {
        fields.gps_coordinates = pick(record, &["GPSCoordinates"]);
    }

    fields
}

fn pick(record: &Value, tags: &[&str]) -> Option<String> {
    for tag in tags {
        if let Some(value) = record.get(tag) {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !s.is_empty() {
                return Some(s);
            }
        }
    }
    None
}
