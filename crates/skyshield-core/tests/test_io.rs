#[allow(dead_code)]
mod common;

use chrono::{TimeZone, Utc};
use ndarray::Array2;
use tempfile::TempDir;

use skyshield_core::frame::Mask;
use skyshield_core::io::fits::{read_fits, write_fits_f32, write_mask, FitsHeader, FitsValue};
use skyshield_core::io::image_io::save_mask_png;
use skyshield_core::io::metadata::{parse_sexagesimal, parse_timestamp, timestamp_from_filename};
use skyshield_core::io::{list_frames, read_frame, read_mask};

use common::{noise_frame, raw_fits_header};

fn observatory_header() -> FitsHeader {
    let mut header = FitsHeader::new();
    header.set("DATE-OBS", FitsValue::Str("2024-06-15T04:12:30.5".into()), None);
    header.set("SITELAT", FitsValue::Str("-30:14:26.7".into()), Some("latitude"));
    header.set("SITELONG", FitsValue::Float(-70.7375), None);
    header.set("SITEELEV", FitsValue::Float(2715.0), None);
    header.set("EXPTIME", FitsValue::Float(30.0), None);
    header.set("OBJECT", FitsValue::Str("field 12".into()), None);
    header
}

#[test]
fn test_fits_frame_round_trip_with_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame_001.fits");
    let data = noise_frame(40, 60, 1000.0, 10.0, 9);
    write_fits_f32(&path, &data, &observatory_header()).unwrap();

    let frame = read_frame(&path).unwrap();
    assert_eq!(frame.data, data);
    assert_eq!(frame.metadata.name, "frame_001.fits");

    let ts = frame.metadata.timestamp.unwrap();
    assert_eq!(ts.timestamp(), Utc.with_ymd_and_hms(2024, 6, 15, 4, 12, 30).unwrap().timestamp());
    assert_eq!(ts.timestamp_subsec_millis(), 500);

    let site = frame.metadata.site.unwrap();
    assert!((site.latitude_deg + 30.2407).abs() < 1e-3);
    assert!((site.longitude_deg + 70.7375).abs() < 1e-9);
    assert_eq!(site.altitude_m, 2715.0);
    assert_eq!(frame.metadata.exposure_s, Some(30.0));
    assert!(frame.metadata.pointing.is_none());
}

#[test]
fn test_mask_round_trip_carries_provenance() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame_001_mask.fits");
    let mut data = Array2::from_elem((33, 47), false);
    for i in 0..33 {
        data[[i, i]] = true;
    }
    let mask = Mask::new(data);
    write_mask(&path, &mask, Some(&observatory_header())).unwrap();

    assert_eq!(read_mask(&path).unwrap(), mask);

    let header = read_fits(&path).unwrap().header;
    assert_eq!(header.get_bool("OSS_MASK"), Some(true));
    assert!(header.get_str("OSS_VER").is_some());
    assert_eq!(header.get_str("OBJECT").as_deref(), Some("field 12"));
    assert_eq!(header.get_i64("BITPIX"), Some(8));
}

#[test]
fn test_png_mask_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("m.png");
    let mut data = Array2::from_elem((20, 30), false);
    data.row_mut(7).fill(true);
    let mask = Mask::new(data);
    save_mask_png(&mask, &path).unwrap();
    assert_eq!(read_mask(&path).unwrap(), mask);
}

#[test]
fn test_timestamp_falls_back_to_file_name() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cam2_20240615_041230.fits");
    write_fits_f32(&path, &Array2::from_elem((10, 10), 1.0), &FitsHeader::new()).unwrap();
    let frame = read_frame(&path).unwrap();
    assert_eq!(
        frame.metadata.timestamp,
        Some(Utc.with_ymd_and_hms(2024, 6, 15, 4, 12, 30).unwrap())
    );
    assert!(frame.metadata.site.is_none());
}

#[test]
fn test_file_name_timestamp_forms() {
    let expected = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
    assert_eq!(timestamp_from_filename("x_20230102-030405.fit"), Some(expected));
    assert_eq!(timestamp_from_filename("2023-01-02T03-04-05_r.fits"), Some(expected));
    assert_eq!(timestamp_from_filename("obs20230102T030405"), Some(expected));
    assert_eq!(timestamp_from_filename("frame_0001.fits"), None);
    // Embedded in a longer digit run: not a timestamp.
    assert_eq!(timestamp_from_filename("9920230102_030405"), None);
}

#[test]
fn test_header_date_forms() {
    let midnight = Utc.with_ymd_and_hms(2022, 8, 1, 0, 0, 0).unwrap();
    assert_eq!(parse_timestamp("2022-08-01"), Some(midnight));
    assert_eq!(parse_timestamp("2022-08-01T00:00:00Z"), Some(midnight));
    assert_eq!(parse_timestamp("2022-08-01 00:00:00"), Some(midnight));
    assert_eq!(parse_timestamp("not a date"), None);
}

#[test]
fn test_sexagesimal() {
    assert_eq!(parse_sexagesimal("10:30:00"), Some(10.5));
    assert_eq!(parse_sexagesimal("-0 30 0"), Some(-0.5));
    assert_eq!(parse_sexagesimal("abc"), None);
}

#[test]
fn test_list_frames_skips_masks_and_truth() {
    let dir = TempDir::new().unwrap();
    let blank = Array2::from_elem((8, 8), 0.0f32);
    for name in ["b.fits", "a.fit", "a_mask.fits", "c_truth.fits", "notes.txt"] {
        let path = dir.path().join(name);
        if name.ends_with(".txt") {
            std::fs::write(&path, "x").unwrap();
        } else {
            write_fits_f32(&path, &blank, &FitsHeader::new()).unwrap();
        }
    }
    let names: Vec<String> = list_frames(dir.path())
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.fit", "b.fits"]);
}

#[test]
fn test_list_frames_requires_directory() {
    assert!(list_frames(std::path::Path::new("/definitely/not/here")).is_err());
}

#[test]
fn test_garbage_fits_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.fits");
    std::fs::write(&path, b"this is not a FITS file").unwrap();
    assert!(read_frame(&path).is_err());
}

#[test]
fn test_oversized_axes_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("huge.fits");
    let header = raw_fits_header(&[
        ("SIMPLE", "T"),
        ("BITPIX", "16"),
        ("NAXIS", "2"),
        ("NAXIS1", "99999999999"),
        ("NAXIS2", "99999999999"),
    ]);
    std::fs::write(&path, header).unwrap();
    assert!(read_frame(&path).is_err());
}

#[test]
fn test_declared_size_beyond_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.fits");
    let mut bytes = raw_fits_header(&[
        ("SIMPLE", "T"),
        ("BITPIX", "-32"),
        ("NAXIS", "2"),
        ("NAXIS1", "4096"),
        ("NAXIS2", "4096"),
    ]);
    bytes.resize(2 * 2880, 0);
    std::fs::write(&path, bytes).unwrap();
    assert!(read_frame(&path).is_err());
}

#[test]
fn test_invalid_bitpix_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.fits");
    let mut bytes = raw_fits_header(&[
        ("SIMPLE", "T"),
        ("BITPIX", "12"),
        ("NAXIS", "2"),
        ("NAXIS1", "4"),
        ("NAXIS2", "4"),
    ]);
    bytes.resize(2 * 2880, 0);
    std::fs::write(&path, bytes).unwrap();
    assert!(read_frame(&path).is_err());
}
