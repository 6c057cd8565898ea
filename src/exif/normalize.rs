// Raw EXIF string -> typed value conversions
//
// Every function is total: unparseable input yields None, never an error.
// exiftool emits most of these fields in more than one shape depending on
// the camera and container, so each parser accepts the observed variants.

use regex::Regex;
use std::sync::OnceLock;

pub fn normalize_width(width: &str) -> Option<i64> {
    normalize_int(width)
}

pub fn normalize_height(height: &str) -> Option<i64> {
    normalize_int(height)
}

pub fn normalize_iso(iso: &str) -> Option<i64> {
    normalize_int(iso)
}

fn normalize_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok()
}

/// Orientation as the EXIF integer 1-8.
///
/// 1 = Horizontal (normal), 2 = Mirror horizontal, 3 = Rotate 180,
/// 4 = Mirror vertical, 5 = Mirror horizontal and rotate 270 CW,
/// 6 = Rotate 90 CW, 7 = Mirror horizontal and rotate 90 CW,
/// 8 = Rotate 270 CW. English phrases are matched case-insensitively.
pub fn normalize_orientation(orientation: &str) -> Option<i64> {
    let s = orientation.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(val) = s.parse::<i64>() {
        return if (1..=8).contains(&val) { Some(val) } else { None };
    }

    match s.to_lowercase().as_str() {
        "horizontal (normal)" | "normal" => Some(1),
        "mirror horizontal" => Some(2),
        "rotate 180" => Some(3),
        "mirror vertical" => Some(4),
        "mirror horizontal and rotate 270 cw" => Some(5),
        "rotate 90 cw" => Some(6),
        "mirror horizontal and rotate 90 cw" => Some(7),
        "rotate 270 cw" => Some(8),
        _ => None,
    }
}

pub fn normalize_f_number(f_number: &str) -> Option<f64> {
    let s = f_number.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Exposure time in decimal seconds: "1/125" -> 0.008, "0.5" -> 0.5.
/// A zero denominator is unparseable.
pub fn normalize_exposure_time(exposure_time: &str) -> Option<f64> {
    let s = exposure_time.trim();
    if s.is_empty() {
        return None;
    }

    if let Some((num, den)) = s.split_once('/') {
        let numerator = num.trim().parse::<f64>().ok()?;
        let denominator = den.trim().parse::<f64>().ok()?;
        if denominator == 0.0 {
            return None;
        }
        return Some(numerator / denominator);
    }

    s.parse::<f64>().ok()
}

/// Focal length in millimetres; a "mm" suffix is tolerated.
pub fn normalize_focal_length(focal_length: &str) -> Option<f64> {
    let mut s = focal_length.trim();
    if let Some(stripped) = s.strip_suffix("mm").or_else(|| s.strip_suffix("MM")) {
        s = stripped.trim();
    }
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Duration in whole seconds.
///
/// exiftool emits "12.68 s" for short videos and "0:05:17" (H:MM:SS or
/// MM:SS) for longer ones; bare integers and decimals also appear.
/// Decimal values are truncated.
pub fn normalize_duration(duration: &str) -> Option<i64> {
    let mut s = duration.trim();
    if let Some(stripped) = s.strip_suffix(" s").or_else(|| s.strip_suffix('s')) {
        s = stripped.trim();
    }
    if s.is_empty() {
        return None;
    }

    if let Ok(val) = s.parse::<f64>() {
        return Some(val as i64);
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut total: i64 = 0;
    for (position, part) in parts.iter().rev().enumerate() {
        let val = part.trim().parse::<i64>().ok()?;
        let multiplier = match position {
            0 => 1,
            1 => 60,
            2 => 3600,
            _ => return None,
        };
        total += val * multiplier;
    }

    Some(total)
}

fn dms_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\d+)\s*deg\s*(\d+)'\s*([\d.]+)"\s*([NSEW])"#).unwrap())
}

/// GPS coordinate from decimal or DMS form to signed decimal degrees.
/// `37 deg 46' 29.64" N` -> 37.7749, `122 deg 25' 9.84" W` -> -122.4194.
pub fn normalize_gps_coordinate(coordinate: &str) -> Option<f64> {
    let s = coordinate.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(val) = s.parse::<f64>() {
        return Some(val);
    }

    let caps = dms_regex().captures(s)?;
    let deg: f64 = caps[1].parse().ok()?;
    let min: f64 = caps[2].parse().ok()?;
    let sec: f64 = caps[3].parse().ok()?;

    let mut decimal = deg + min / 60.0 + sec / 3600.0;
    if matches!(&caps[4], "S" | "W") {
        decimal = -decimal;
    }
    Some(decimal)
}

fn iso6709_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([+-]?\d+\.?\d*)\s*([+-]\d+\.?\d*)").unwrap())
}

fn hemisphere_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.?\d*)\s*([NS]),?\s*(\d+\.?\d*)\s*([EW])").unwrap())
}

/// Combined video coordinates to a (lat, lon) pair.
/// ISO 6709 `+37.7749-122.4194/` (optional altitude) or `37.7749 N, 122.4194 W`.
pub fn normalize_iso6709_coordinates(coords: &str) -> Option<(f64, f64)> {
    let s = coords.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = iso6709_regex().captures(s) {
        let lat = caps[1].parse::<f64>().ok();
        let lon = caps[2].parse::<f64>().ok();
        if let (Some(lat), Some(lon)) = (lat, lon) {
            return Some((lat, lon));
        }
    }

    if let Some(caps) = hemisphere_pair_regex().captures(s) {
        let mut lat = caps[1].parse::<f64>().ok()?;
        let mut lon = caps[3].parse::<f64>().ok()?;
        if &caps[2] == "S" {
            lat = -lat;
        }
        if &caps[4] == "W" {
            lon = -lon;
        }
        return Some((lat, lon));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_integers_pass_through() {
        for i in 1..=8 {
            assert_eq!(normalize_orientation(&i.to_string()), Some(i));
        }
        assert_eq!(normalize_orientation("0"), None);
        assert_eq!(normalize_orientation("9"), None);
        assert_eq!(normalize_orientation(""), None);
    }

    #[test]
    fn orientation_phrases() {
        assert_eq!(normalize_orientation("Rotate 90 CW"), Some(6));
        assert_eq!(normalize_orientation("rotate 270 cw"), Some(8));
        assert_eq!(normalize_orientation("Horizontal (normal)"), Some(1));
        assert_eq!(normalize_orientation("Mirror horizontal"), Some(2));
        assert_eq!(normalize_orientation("Mirror vertical"), Some(4));
        assert_eq!(normalize_orientation("Rotate 180"), Some(3));
        assert_eq!(normalize_orientation("Sideways"), None);
    }

    #[test]
    fn exposure_time_forms() {
        assert_eq!(normalize_exposure_time("1/125"), Some(0.008));
        assert_eq!(normalize_exposure_time("0.5"), Some(0.5));
        assert_eq!(normalize_exposure_time("1"), Some(1.0));
        assert_eq!(normalize_exposure_time("1/0"), None);
        assert_eq!(normalize_exposure_time("a/b"), None);
        assert_eq!(normalize_exposure_time(""), None);
    }

    #[test]
    fn duration_forms() {
        assert_eq!(normalize_duration("0:01:23"), Some(83));
        assert_eq!(normalize_duration("00:00:05"), Some(5));
        assert_eq!(normalize_duration("1:30"), Some(90));
        assert_eq!(normalize_duration("45"), Some(45));
        assert_eq!(normalize_duration("12.68 s"), Some(12));
        assert_eq!(normalize_duration("12.68s"), Some(12));
        assert_eq!(normalize_duration("1:2:3:4"), None);
        assert_eq!(normalize_duration("x"), None);
    }

    #[test]
    fn focal_length_mm_suffix() {
        assert_eq!(normalize_focal_length("26.0 mm"), Some(26.0));
        assert_eq!(normalize_focal_length("50mm"), Some(50.0));
        assert_eq!(normalize_focal_length("4.25"), Some(4.25));
        assert_eq!(normalize_focal_length("wide"), None);
    }

    #[test]
    fn gps_coordinate_forms() {
        let lat = normalize_gps_coordinate("37 deg 46' 29.64\" N").unwrap();
        assert!((lat - 37.7749).abs() < 1e-3);

        let lon = normalize_gps_coordinate("122 deg 25' 9.84\" W").unwrap();
        assert!((lon + 122.4194).abs() < 1e-3);

        let dec = normalize_gps_coordinate("37.7749").unwrap();
        assert!((dec - 37.7749).abs() < 1e-9);

        assert_eq!(normalize_gps_coordinate("somewhere"), None);
    }

    #[test]
    fn iso6709_forms() {
        let (lat, lon) = normalize_iso6709_coordinates("+37.7749-122.4194/").unwrap();
        assert!((lat - 37.7749).abs() < 1e-9);
        assert!((lon + 122.4194).abs() < 1e-9);

        let (lat, lon) = normalize_iso6709_coordinates("+37.7749-122.4194+10.5/").unwrap();
        assert!((lat - 37.7749).abs() < 1e-9);
        assert!((lon + 122.4194).abs() < 1e-9);

        let (lat, lon) = normalize_iso6709_coordinates("37.7749 N, 122.4194 W").unwrap();
        assert!((lat - 37.7749).abs() < 1e-9);
        assert!((lon + 122.4194).abs() < 1e-9);

        assert_eq!(normalize_iso6709_coordinates("nowhere"), None);
    }

    #[test]
    fn ints_reject_garbage() {
        assert_eq!(normalize_iso("200"), Some(200));
        assert_eq!(normalize_iso("two hundred"), None);
        assert_eq!(normalize_width(" 4032 "), Some(4032));
        assert_eq!(normalize_height(""), None);
    }
}
