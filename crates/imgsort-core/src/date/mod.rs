pub mod exif;
pub mod guess;

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use filetime::FileTime;
use serde::{Deserialize, Serialize};

use crate::metadata::MetadataReader;
use crate::naming;

/// One way of finding out when a picture was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampStrategy {
    /// Already named `img_<YYYYMMDD_HHmmss>_<ID>.<EXT>`
    CanonicalName,
    /// EXIF DateTimeOriginal / DateTimeDigitized / DateTime
    Exif,
    /// Camera and phone naming schemes like `IMG_20190509_154733.jpg`
    FilenameGuess,
    /// Filesystem modification time, in local time
    ModifiedTime,
}

impl TimestampStrategy {
    /// Strategy order used when renaming.
    pub fn rename_order(allow_guess: bool, allow_mtime: bool) -> Vec<TimestampStrategy> {
        let mut order = vec![TimestampStrategy::CanonicalName, TimestampStrategy::Exif];
        if allow_guess {
            order.push(TimestampStrategy::FilenameGuess);
        }
        if allow_mtime {
            order.push(TimestampStrategy::ModifiedTime);
        }
        order
    }

    fn resolve(&self, path: &Path, filename: &str, reader: &dyn MetadataReader) -> Option<NaiveDateTime> {
        match self {
            TimestampStrategy::CanonicalName => naming::parse_canonical(filename).map(|c| c.timestamp),
            TimestampStrategy::Exif => reader.read(path).timestamp,
            TimestampStrategy::FilenameGuess => guess::guess_date_from_filename(filename),
            TimestampStrategy::ModifiedTime => modified_time(path),
        }
    }
}

/// Result of date extraction: date + the strategy that found it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateResult {
    pub date: NaiveDateTime,
    pub source: TimestampStrategy,
}

/// Try each strategy in order and keep the first date found.
pub fn extract_date(
    path: &Path,
    filename: &str,
    strategies: &[TimestampStrategy],
    reader: &dyn MetadataReader,
) -> Option<DateResult> {
    strategies.iter().find_map(|strategy| {
        strategy
            .resolve(path, filename, reader)
            .map(|date| DateResult { date, source: *strategy })
    })
}

fn modified_time(path: &Path) -> Option<NaiveDateTime> {
    let meta = fs::metadata(path).ok()?;
    let mtime = FileTime::from_last_modification_time(&meta);
    let utc = chrono::DateTime::from_timestamp(mtime.unix_seconds(), 0)?;
    Some(utc.with_timezone(&chrono::Local).naive_local())
}
