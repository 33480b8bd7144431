use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::date::TimestampStrategy;

/// Mean Earth radius used by the haversine distance, in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        // Clamp guards against rounding pushing `a` just above 1.0 for antipodal points
        let c = 2.0 * a.sqrt().min(1.0).asin();
        EARTH_RADIUS_M * c
    }
}

#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Location on disk when the run started
    pub path: PathBuf,
    /// Just the filename
    pub filename: String,
    /// Extension without the dot, as found on disk (may be empty)
    pub extension: String,
    /// Capture time, once resolved
    pub timestamp: Option<NaiveDateTime>,
    /// Strategy that produced `timestamp`
    pub timestamp_source: Option<TimestampStrategy>,
    /// GPS position from metadata, if any
    pub location: Option<GeoPoint>,
}

impl MediaItem {
    pub fn new(path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = Path::new(&filename)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            filename,
            extension,
            timestamp: None,
            timestamp_source: None,
            location: None,
        }
    }

    /// Ordering used everywhere items are sorted: capture time, then NFC filename, then path.
    pub fn order_key(&self) -> (Option<NaiveDateTime>, String, PathBuf) {
        (self.timestamp, self.filename.nfc().collect(), self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_preserved_verbatim() {
        let item = MediaItem::new(PathBuf::from("/photos/DSC_0001.JPG"));
        assert_eq!(item.filename, "DSC_0001.JPG");
        assert_eq!(item.extension, "JPG");

        let bare = MediaItem::new(PathBuf::from("/photos/README"));
        assert_eq!(bare.extension, "");
    }

    #[test]
    fn test_distance() {
        let paris = GeoPoint::new(48.8566, 2.3522);
        let london = GeoPoint::new(51.5074, -0.1278);
        let d = paris.distance_m(&london);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {d}");

        assert_eq!(paris.distance_m(&paris), 0.0);
        assert!((paris.distance_m(&london) - london.distance_m(&paris)).abs() < 1e-6);
    }
}
