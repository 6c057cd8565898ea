// Range checks over normalized metadata
//
// Policy: values a specialized camera could legitimately produce are kept
// with a warning; values that are physically impossible or indicate corrupt
// metadata are dropped.

use chrono::{Datelike, Duration, Utc};
use log::warn;

use super::datetime::parse_datetime;

/// Kept, but 50-102400 is the range ordinary cameras produce.
pub fn validate_iso(iso: i64) -> Option<i64> {
    if !(50..=102_400).contains(&iso) {
        warn!("iso value out of expected range: {} (expected 50-102400)", iso);
    }
    Some(iso)
}

/// Kept, but f/0.95-f/64 covers ordinary lenses.
pub fn validate_aperture(f_number: f64) -> Option<f64> {
    if !(0.95..=64.0).contains(&f_number) {
        warn!("aperture out of expected range: f/{} (expected f/0.95-f/64)", f_number);
    }
    Some(f_number)
}

/// Negative exposures are corrupt; very long ones are valid night shots.
pub fn validate_exposure_time(exposure: f64) -> Option<f64> {
    if exposure < 0.0 {
        warn!("negative exposure time dropped: {}", exposure);
        return None;
    }
    if exposure > 30.0 {
        warn!("unusually long exposure time: {}s", exposure);
    }
    Some(exposure)
}

/// Kept, but 1-3000mm covers ordinary lenses.
pub fn validate_focal_length(focal: f64) -> Option<f64> {
    if !(1.0..=3000.0).contains(&focal) {
        warn!("focal length out of expected range: {}mm (expected 1-3000mm)", focal);
    }
    Some(focal)
}

/// An impossible latitude or longitude invalidates the whole position, so
/// both coordinates are dropped together.
pub fn validate_coordinates(lat: f64, lon: f64) -> Option<(f64, f64)> {
    if !(-90.0..=90.0).contains(&lat) {
        warn!("invalid latitude dropped: {} (valid -90..90)", lat);
        return None;
    }
    if !(-180.0..=180.0).contains(&lon) {
        warn!("invalid longitude dropped: {} (valid -180..180)", lon);
        return None;
    }
    Some((lat, lon))
}

/// Reject datetimes that indicate missing or corrupted camera clocks:
/// the Unix epoch day, anything before photography existed (1826), and
/// anything more than a day in the future. Strings no parser understands
/// are kept for downstream handling.
pub fn validate_datetime(field: &str, value: &str) -> Option<String> {
    let parsed = match parse_datetime(value)
        .or_else(|| parse_datetime(&value.replacen(':', "-", 2).replacen(' ', "T", 1)))
    {
        Some(t) => t,
        None => return Some(value.to_string()),
    };

    if parsed.year() == 1970 && parsed.ordinal() == 1 {
        warn!("{} set to unix epoch (likely invalid): {}", field, value);
        return None;
    }

    if parsed.year() < 1826 {
        warn!("{} predates photography: {}", field, value);
        return None;
    }

    if parsed > Utc::now() + Duration::hours(24) {
        warn!("{} is in the future: {}", field, value);
        return None;
    }

    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_drop_together() {
        assert_eq!(validate_coordinates(91.0, 0.0), None);
        assert_eq!(validate_coordinates(0.0, 181.0), None);
        assert_eq!(validate_coordinates(-90.0, 180.0), Some((-90.0, 180.0)));
        assert_eq!(validate_coordinates(37.7749, -122.4194), Some((37.7749, -122.4194)));
    }

    #[test]
    fn exposure_rejects_negative_only() {
        assert_eq!(validate_exposure_time(-1.0), None);
        assert_eq!(validate_exposure_time(0.008), Some(0.008));
        assert_eq!(validate_exposure_time(120.0), Some(120.0));
    }

    #[test]
    fn iso_and_focal_warn_but_keep() {
        assert_eq!(validate_iso(12), Some(12));
        assert_eq!(validate_iso(400), Some(400));
        assert_eq!(validate_focal_length(9000.0), Some(9000.0));
        assert_eq!(validate_aperture(0.7), Some(0.7));
    }

    #[test]
    fn datetime_rejects_epoch() {
        assert_eq!(validate_datetime("DateTime", "1970-01-01T00:00:00Z"), None);
        assert_eq!(validate_datetime("DateTime", "1970-01-01 00:00:00"), None);
    }

    #[test]
    fn datetime_rejects_prehistoric_and_future() {
        assert_eq!(validate_datetime("DateTime", "1800-06-15T10:00:00Z"), None);
        let future = (Utc::now() + Duration::days(30)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        assert_eq!(validate_datetime("DateTime", &future), None);
    }

    #[test]
    fn datetime_keeps_valid_and_unparseable() {
        assert!(validate_datetime("DateTime", "2023-06-15T05:00:45Z").is_some());
        // Tomorrow is inside the 24h allowance for timezone skew
        let near = (Utc::now() + Duration::hours(12)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        assert!(validate_datetime("DateTime", &near).is_some());
        assert_eq!(
            validate_datetime("DateTime", "unreadable").as_deref(),
            Some("unreadable")
        );
    }
}
