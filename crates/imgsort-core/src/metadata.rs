use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};

use crate::date;
use crate::media::GeoPoint;

/// What embedded metadata says about a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub timestamp: Option<NaiveDateTime>,
    pub location: Option<GeoPoint>,
}

/// Source of per-file capture time and position.
pub trait MetadataReader {
    fn read(&self, path: &Path) -> Metadata;
}

/// Reads EXIF from the image container on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn read(&self, path: &Path) -> Metadata {
        let Ok(file) = File::open(path) else {
            return Metadata::default();
        };
        let exif = match Reader::new().read_from_container(&mut BufReader::new(file)) {
            Ok(exif) => exif,
            Err(e) => {
                log::debug!("no EXIF in {}: {}", path.display(), e);
                return Metadata::default();
            }
        };
        Metadata {
            timestamp: date::exif::extract_exif_date(&exif),
            location: extract_gps(&exif),
        }
    }
}

/// Reader that never finds anything; for files known to carry no metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataReader for NoMetadata {
    fn read(&self, _path: &Path) -> Metadata {
        Metadata::default()
    }
}

/// Extract the GPS position from parsed EXIF data.
pub fn extract_gps(exif: &Exif) -> Option<GeoPoint> {
    let lat = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let lon = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
    // 0/0 is what many cameras write when they had no fix
    if lat == 0.0 && lon == 0.0 {
        return None;
    }
    Some(GeoPoint::new(lat, lon))
}

fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let dms: Vec<f64> = match &field.value {
        Value::Rational(parts) => parts
            .iter()
            .map(|r| if r.denom == 0 { 0.0 } else { r.to_f64() })
            .collect(),
        _ => return None,
    };
    let reference = match &exif.get_field(ref_tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())?,
        _ => return None,
    };
    dms_to_degrees(&dms, &reference)
}

/// Convert degrees/minutes/seconds plus an N/S/E/W reference to signed decimal degrees.
pub fn dms_to_degrees(dms: &[f64], reference: &str) -> Option<f64> {
    let [deg, min, sec] = dms else {
        return None;
    };
    let value = deg + min / 60.0 + sec / 3600.0;
    match reference.trim() {
        "N" | "E" => Some(value),
        "S" | "W" => Some(-value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_dms_to_degrees() {
        let lat = dms_to_degrees(&[48.0, 51.0, 23.76], "N").unwrap();
        assert!((lat - 48.8566).abs() < 1e-4);

        let lon = dms_to_degrees(&[0.0, 7.0, 40.08], "W").unwrap();
        assert!((lon + 0.1278).abs() < 1e-4);

        assert!(dms_to_degrees(&[1.0, 2.0], "N").is_none());
        assert!(dms_to_degrees(&[1.0, 2.0, 3.0], "X").is_none());
    }

    #[test]
    fn test_read_without_exif() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("no_exif.jpg");
        fs::write(&file_path, b"This is not an image file").unwrap();

        assert_eq!(ExifReader.read(&file_path), Metadata::default());
        assert_eq!(ExifReader.read(Path::new("/non/existent/file.jpg")), Metadata::default());
    }
}
