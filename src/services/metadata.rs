//! EXIF metadata: capture date for sorting and orientation for display.
//!
//! Missing or unreadable metadata is never an error: the capture date is
//! `None` and the orientation is 1 (upright).

use camino::Utf8Path;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::BufReader;

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Reads the per-file attributes the display keys sort by.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataReader {
    fn capture_date(&self, path: &Utf8Path) -> Option<NaiveDateTime>;
}

/// [`MetadataReader`] backed by kamadak-exif.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn capture_date(&self, path: &Utf8Path) -> Option<NaiveDateTime> {
        let exif = read_exif(path)?;
        capture_date_of(&exif)
    }
}

/// Parse the EXIF block of a file, if it has one.
pub fn read_exif(path: &Utf8Path) -> Option<exif::Exif> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("Cannot open {} for EXIF: {}", path, e);
            return None;
        }
    };
    let mut reader = BufReader::new(file);
    exif::Reader::new().read_from_container(&mut reader).ok()
}

/// `DateTimeOriginal`, falling back to `DateTime`.
pub fn capture_date_of(exif: &exif::Exif) -> Option<NaiveDateTime> {
    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, exif::In::PRIMARY))
        .find_map(|field| match field.value {
            exif::Value::Ascii(ref values) => values.first().and_then(|raw| parse_exif_date(raw)),
            _ => None,
        })
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp.
pub fn parse_exif_date(raw: &[u8]) -> Option<NaiveDateTime> {
    let text = std::str::from_utf8(raw).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(text, EXIF_DATE_FORMAT).ok()
}

/// EXIF orientation tag (1..=8) of a file, 1 when absent or invalid.
pub fn orientation(path: &Utf8Path) -> u32 {
    read_exif(path)
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_exif_date() {
        let date = parse_exif_date(b"2023:07:14 18:30:05").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, 7, 14));
        assert_eq!((date.hour(), date.minute(), date.second()), (18, 30, 5));

        assert!(parse_exif_date(b"2023:07:14 18:30:05\0").is_some());
        assert!(parse_exif_date(b"0000:00:00 00:00:00").is_none());
        assert!(parse_exif_date(b"not a date").is_none());
    }

    #[test]
    fn test_missing_metadata_is_not_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), b"definitely not an image").unwrap();
        let path = Utf8Path::from_path(temp_file.path()).unwrap();

        assert_eq!(ExifReader.capture_date(path), None);
        assert_eq!(orientation(path), 1);
        assert_eq!(orientation(Utf8Path::new("/no/such/file.jpg")), 1);
    }
}
