use chrono::NaiveDateTime;
use exif::{Exif, In, Tag};

/// Extract the capture date from parsed EXIF data.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn extract_exif_date(exif: &Exif) -> Option<NaiveDateTime> {
    let tags = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

    for tag in &tags {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY) {
            let val = field.display_value().to_string();
            if let Some(dt) = parse_exif_datetime(&val) {
                return Some(dt);
            }
        }
    }

    None
}

pub(crate) fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .trim()
        .trim_matches('"')
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(d) = chrono::NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}
