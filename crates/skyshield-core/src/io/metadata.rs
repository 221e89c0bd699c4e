use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::frame::{FrameMetadata, Pointing, SiteMetadata};

use super::fits::FitsHeader;

const LATITUDE_KEYS: &[&str] = &["SITELAT", "LATITUDE"];
const LONGITUDE_KEYS: &[&str] = &["SITELONG", "LONGITUD"];
const ELEVATION_KEYS: &[&str] = &["SITEELEV", "ELEVATIO"];
const ALTITUDE_KEYS: &[&str] = &["ALTITUDE", "ALT"];
const AZIMUTH_KEYS: &[&str] = &["AZIMUTH", "AZ"];
const EXPOSURE_KEYS: &[&str] = &["EXPTIME", "EXPOSURE"];
const TIMESTAMP_KEYS: &[&str] = &["DATE-OBS", "DATE"];

/// Resolve acquisition metadata from a header, falling back to the file name
/// for the timestamp.
pub fn extract_metadata(header: &FitsHeader, file_name: &str) -> FrameMetadata {
    let timestamp = TIMESTAMP_KEYS
        .iter()
        .filter_map(|k| header.get_str(k))
        .find_map(|s| parse_timestamp(&s))
        .or_else(|| {
            let ts = timestamp_from_filename(file_name);
            if ts.is_some() {
                debug!(file = file_name, "Timestamp taken from file name");
            }
            ts
        });

    let site = match (
        first_angle(header, LATITUDE_KEYS),
        first_angle(header, LONGITUDE_KEYS),
    ) {
        (Some(latitude_deg), Some(longitude_deg)) => Some(SiteMetadata {
            latitude_deg,
            longitude_deg,
            altitude_m: first_f64(header, ELEVATION_KEYS).unwrap_or(0.0),
        }),
        _ => None,
    };

    let pointing = first_angle(header, ALTITUDE_KEYS).map(|altitude_deg| Pointing {
        altitude_deg,
        azimuth_deg: first_angle(header, AZIMUTH_KEYS).unwrap_or(0.0),
    });

    FrameMetadata {
        name: file_name.to_string(),
        timestamp,
        site,
        pointing,
        exposure_s: first_f64(header, EXPOSURE_KEYS),
        header: header.clone(),
    }
}

/// Metadata for a file without a header (PNG/TIFF).
pub fn metadata_from_filename(file_name: &str) -> FrameMetadata {
    FrameMetadata {
        name: file_name.to_string(),
        timestamp: timestamp_from_filename(file_name),
        ..Default::default()
    }
}

fn first_f64(header: &FitsHeader, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| header.get_f64(k)).filter(|v| v.is_finite())
}

/// Decimal degrees, or a sexagesimal string such as `-30:14:26.7`.
fn first_angle(header: &FitsHeader, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| {
        header
            .get_f64(k)
            .or_else(|| header.get_str(k).and_then(|s| parse_sexagesimal(&s)))
            .filter(|v| v.is_finite())
    })
}

pub fn parse_sexagesimal(s: &str) -> Option<f64> {
    let s = s.trim();
    let negative = s.starts_with('-');
    let parts: Vec<f64> = s
        .trim_start_matches(['+', '-'])
        .split([':', ' '])
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let value = parts
        .iter()
        .enumerate()
        .map(|(i, p)| p / 60f64.powi(i as i32))
        .sum::<f64>();
    Some(if negative { -value } else { value })
}

/// Parse a FITS date string: ISO 8601 with optional fraction and `Z`, a
/// space instead of `T`, or a bare date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let s = s.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Find a timestamp embedded in a file name. Recognised forms:
/// `YYYYMMDD[_-T]HHMMSS`, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DDTHH-MM-SS`.
pub fn timestamp_from_filename(name: &str) -> Option<DateTime<Utc>> {
    let bytes = name.as_bytes();
    const PATTERNS: &[(&str, &str)] = &[
        ("dddd-dd-ddTdd:dd:dd", "%Y-%m-%dT%H:%M:%S"),
        ("dddd-dd-ddTdd-dd-dd", "%Y-%m-%dT%H-%M-%S"),
        ("dddddddd_dddddd", "%Y%m%d_%H%M%S"),
        ("dddddddd-dddddd", "%Y%m%d-%H%M%S"),
        ("ddddddddTdddddd", "%Y%m%dT%H%M%S"),
    ];

    for start in 0..bytes.len() {
        // A match must not continue a longer digit run.
        if start > 0 && bytes[start - 1].is_ascii_digit() {
            continue;
        }
        for (shape, fmt) in PATTERNS {
            let end = start + shape.len();
            if end > bytes.len() || !matches_shape(&bytes[start..end], shape.as_bytes()) {
                continue;
            }
            if bytes.get(end).is_some_and(u8::is_ascii_digit) {
                continue;
            }
            let candidate = std::str::from_utf8(&bytes[start..end]).ok()?;
            if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(naive.and_utc());
            }
        }
    }
    None
}

fn matches_shape(candidate: &[u8], shape: &[u8]) -> bool {
    candidate.iter().zip(shape).all(|(&c, &s)| match s {
        b'd' => c.is_ascii_digit(),
        other => c == other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filename_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 21, 4, 9).unwrap();
        assert_eq!(timestamp_from_filename("cam1_20240305_210409.fits"), Some(expected));
        assert_eq!(timestamp_from_filename("20240305T210409.fit"), Some(expected));
        assert_eq!(timestamp_from_filename("img-2024-03-05T21-04-09.fits"), Some(expected));
        assert_eq!(timestamp_from_filename("2024-03-05T21:04:09.png"), Some(expected));
        assert_eq!(timestamp_from_filename("frame_0001.fits"), None);
    }

    #[test]
    fn header_dates() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 2, 3, 15, 0).unwrap();
        assert_eq!(parse_timestamp("2023-11-02T03:15:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-02T03:15:00Z"), Some(expected));
        assert!(parse_timestamp("2023-11-02").is_some());
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn sexagesimal_angles() {
        assert!((parse_sexagesimal("-30:15:00").unwrap() + 30.25).abs() < 1e-12);
        assert!((parse_sexagesimal("+19 49 36").unwrap() - 19.826_666_666_666_666).abs() < 1e-9);
        assert_eq!(parse_sexagesimal("abc"), None);
    }
}
