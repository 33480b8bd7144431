//! Capture times embedded in camera, phone and app filenames.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

/// A filename stamp layout. In `layout`, `YYYY`, `MM` and `DD` stand for a
/// plausible year, month and day, and `hh`, `mm`, `ss` for two digits each;
/// everything else is regex. The expanded pattern matches exactly the text
/// that `format` parses.
struct NamingScheme {
    name: &'static str,
    layout: &'static str,
    format: &'static str,
}

/// Tried in order; the first scheme whose match parses wins.
const SCHEMES: &[NamingScheme] = &[
    // Screenshot_20190919-053857.jpg
    NamingScheme { name: "android-screenshot", layout: "YYYYMMDD-hhmmss", format: "%Y%m%d-%H%M%S" },
    // IMG_20190509_154733.jpg, PXL_20230704_091500123.jpg
    NamingScheme { name: "camera", layout: "YYYYMMDD_hhmmss", format: "%Y%m%d_%H%M%S" },
    // 2019-05-09-15-47-33.jpg
    NamingScheme { name: "dashed", layout: "YYYY-MM-DD-hh-mm-ss", format: "%Y-%m-%d-%H-%M-%S" },
    // signal-2020-10-26-163832.jpg
    NamingScheme { name: "signal", layout: "YYYY-MM-DD-hhmmss", format: "%Y-%m-%d-%H%M%S" },
    // 20190509154733123.jpg; trailing milliseconds are left out of the match
    NamingScheme { name: "compact", layout: "YYYYMMDDhhmmss", format: "%Y%m%d%H%M%S" },
    // 2016_01_30_11_49_15.jpg
    NamingScheme { name: "underscored", layout: "YYYY_MM_DD_hh_mm_ss", format: "%Y_%m_%d_%H_%M_%S" },
    // Photo 2022-08-14 09.15.02.png
    NamingScheme { name: "dotted-time", layout: r"YYYY-MM-DD hh\.mm\.ss", format: "%Y-%m-%d %H.%M.%S" },
];

fn expand(layout: &str) -> String {
    let pattern = layout
        .replace("YYYY", "(?:18|19|20)[0-9]{2}")
        .replace("MM", "(?:0[1-9]|1[0-2])")
        .replace("DD", "[0-3][0-9]")
        .replace("hh", "[0-9]{2}")
        .replace("mm", "[0-9]{2}")
        .replace("ss", "[0-9]{2}");
    format!("(?P<stamp>{pattern})")
}

static COMPILED: LazyLock<Vec<(&'static NamingScheme, Regex)>> = LazyLock::new(|| {
    SCHEMES
        .iter()
        .map(|scheme| {
            let regex = Regex::new(&expand(scheme.layout)).expect("filename scheme layouts are valid regexes");
            (scheme, regex)
        })
        .collect()
});

/// Guess a capture time from common camera and phone naming schemes.
pub fn guess_date_from_filename(filename: &str) -> Option<NaiveDateTime> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    COMPILED.iter().find_map(|(scheme, regex)| {
        let stamp = regex.captures(basename)?.name("stamp")?.as_str();
        let date = NaiveDateTime::parse_from_str(stamp, scheme.format).ok()?;
        log::debug!("{} matches the {} naming scheme", basename, scheme.name);
        Some(date)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(name: &str) -> Option<String> {
        guess_date_from_filename(name).map(|d| d.format("%Y%m%d_%H%M%S").to_string())
    }

    #[test]
    fn test_schemes() {
        assert_eq!(guess("Screenshot_20190919-053857.jpg").as_deref(), Some("20190919_053857"));
        assert_eq!(guess("IMG_20190509_154733.jpg").as_deref(), Some("20190509_154733"));
        assert_eq!(guess("2019-05-09-15-47-33.jpg").as_deref(), Some("20190509_154733"));
        assert_eq!(guess("signal-2020-10-26-163832.jpg").as_deref(), Some("20201026_163832"));
        assert_eq!(guess("2016_01_30_11_49_15.jpg").as_deref(), Some("20160130_114915"));
        assert_eq!(guess("Photo 2022-08-14 09.15.02.png").as_deref(), Some("20220814_091502"));
        assert_eq!(guess("random_photo.jpg"), None);
    }

    #[test]
    fn test_compact_ignores_trailing_millis() {
        assert_eq!(guess("20190509154733123.jpg").as_deref(), Some("20190509_154733"));
    }

    #[test]
    fn test_guess_uses_basename() {
        assert_eq!(guess("/sd/DCIM/IMG_20190509_154733.jpg").as_deref(), Some("20190509_154733"));
    }

    #[test]
    fn test_guess_rejects_impossible_date() {
        // Month 02 day 31 matches the shape but not the calendar
        assert_eq!(guess("IMG_20190231_154733.jpg"), None);
    }

    #[test]
    fn test_layouts_compile() {
        assert_eq!(COMPILED.len(), SCHEMES.len());
        assert_eq!(expand("YYYY"), "(?P<stamp>(?:18|19|20)[0-9]{2})");
    }
}
