// Capture-time resolution to RFC 3339 UTC
//
// Photos taken across timezones need UTC normalization for correct
// chronological sorting: SQLite compares date_time as text, and RFC 3339
// UTC strings order lexicographically the same way they order temporally.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Resolve a raw EXIF datetime string to RFC 3339 UTC.
///
/// Priority for the timezone:
/// 1. an offset carried by the input itself;
/// 2. the EXIF offset field (OffsetTimeOriginal and friends);
/// 3. an offset computed against GPSDateTime, which is always UTC;
/// 4. the host's local zone.
///
/// Unparseable input is returned unchanged so downstream validation can
/// reject it.
pub fn resolve_datetime(raw: &str, offset_time: Option<&str>, gps_datetime: Option<&str>) -> String {
    if let Some(t) = parse_with_offset(raw) {
        return t.with_timezone(&Utc).format(OUTPUT_FORMAT).to_string();
    }

    let naive = match parse_without_offset(raw) {
        Some(n) => n,
        None => return raw.to_string(),
    };

    if let Some(offset) = offset_time.and_then(parse_offset) {
        if let Some(t) = naive.and_local_timezone(offset).single() {
            return t.with_timezone(&Utc).format(OUTPUT_FORMAT).to_string();
        }
    }

    if let Some(gps) = gps_datetime.and_then(parse_gps_datetime) {
        let offset_seconds = (naive - gps).num_seconds();
        if let Some(offset) = FixedOffset::east_opt(offset_seconds as i32) {
            if let Some(t) = naive.and_local_timezone(offset).single() {
                return t.with_timezone(&Utc).format(OUTPUT_FORMAT).to_string();
            }
        }
    }

    match Local.from_local_datetime(&naive).earliest() {
        Some(t) => t.with_timezone(&Utc).format(OUTPUT_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

fn parse_with_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t);
    }

    const FORMATS: [&str; 3] = [
        "%Y:%m:%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%:z",
    ];
    for format in FORMATS {
        if let Ok(t) = DateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    None
}

fn parse_without_offset(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    None
}

/// GPSDateTime is UTC; the trailing Z is optional in exiftool output.
fn parse_gps_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y:%m:%d %H:%M:%SZ",
        "%Y-%m-%d %H:%M:%SZ",
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s.trim(), format) {
            return Some(t);
        }
    }
    None
}

/// "+05:30" / "-08:00" -> FixedOffset.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.len() < 5 {
        return None;
    }

    let sign = match s.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };

    let (hours, mins) = s[1..].split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let mins: i32 = mins.parse().ok()?;

    FixedOffset::east_opt(sign * (hours * 3600 + mins * 60))
}

/// Lenient parser for datetimes already stored on photo rows. Values
/// written by this engine are RFC 3339 UTC; the fallbacks accept rows
/// indexed before normalization existed. Naive values are read as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z"];
    for format in OFFSET_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(s, format) {
            return Some(t.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: [&str; 3] =
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_offset_wins() {
        assert_eq!(
            resolve_datetime("2023-06-15T10:30:45+05:30", None, None),
            "2023-06-15T05:00:45Z"
        );
        // Literal offset beats the EXIF offset field
        assert_eq!(
            resolve_datetime("2023-06-15T10:30:45+05:30", Some("-08:00"), None),
            "2023-06-15T05:00:45Z"
        );
        assert_eq!(
            resolve_datetime("2023:06:15 10:30:45+05:30", None, None),
            "2023-06-15T05:00:45Z"
        );
    }

    #[test]
    fn exif_offset_field_applies() {
        assert_eq!(
            resolve_datetime("2023:06:15 10:30:45", Some("+05:30"), None),
            "2023-06-15T05:00:45Z"
        );
        assert_eq!(
            resolve_datetime("2023-06-15 20:09:00", Some("+05:30"), None),
            "2023-06-15T14:39:00Z"
        );
    }

    #[test]
    fn gps_datetime_derives_offset() {
        assert_eq!(
            resolve_datetime("2023:06:15 10:30:45", None, Some("2023:06:15 05:00:45Z")),
            "2023-06-15T05:00:45Z"
        );
    }

    #[test]
    fn offset_field_beats_gps() {
        assert_eq!(
            resolve_datetime(
                "2023:06:15 10:30:45",
                Some("+05:30"),
                // A GPS clock that would imply a different (wrong) offset
                Some("2023:06:15 02:30:45Z"),
            ),
            "2023-06-15T05:00:45Z"
        );
    }

    #[test]
    fn unparseable_passes_through() {
        assert_eq!(resolve_datetime("not a date", None, None), "not a date");
        assert_eq!(resolve_datetime("", Some("+01:00"), None), "");
    }

    #[test]
    fn sort_order_matches_chronology() {
        // 20:09 in India is later than 20:34 in Singapore; UTC text agrees.
        let india = resolve_datetime("2023-06-15 20:09:00", Some("+05:30"), None);
        let singapore = resolve_datetime("2023-06-15 20:34:00", Some("+08:00"), None);
        assert!(india > singapore);
        assert_eq!(
            parse_datetime(&india).unwrap() > parse_datetime(&singapore).unwrap(),
            india > singapore
        );
    }

    #[test]
    fn stored_value_parser() {
        assert!(parse_datetime("2023-06-15T05:00:45Z").is_some());
        assert!(parse_datetime("2023-06-15 05:00:45").is_some());
        assert!(parse_datetime("garbage").is_none());
    }

    #[test]
    fn offset_parser_shapes() {
        assert_eq!(parse_offset("+05:30"), FixedOffset::east_opt(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("-08:00"), FixedOffset::east_opt(-8 * 3600));
        assert_eq!(parse_offset("0800"), None);
        assert_eq!(parse_offset(""), None);
    }
}
