use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunError;
use crate::ThrottledProgress;

/// Result of scanning the target folder
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Image files in discovery order
    pub files: Vec<PathBuf>,
    /// Every entry name (files, folders, anything) per visited directory
    pub entries: HashMap<PathBuf, Vec<String>>,
    /// Regular files ignored because they are not images
    pub ignored: u64,
}

/// Check whether a path looks like an image by its extension.
pub fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// List the image files of `root`.
///
/// Failing to read `root` itself is fatal. With `recursive`, subdirectories
/// that cannot be read are logged and skipped.
pub fn scan_folder(root: &Path, recursive: bool, progress: &ThrottledProgress) -> Result<ScanResult, RunError> {
    let mut result = ScanResult::default();
    let entries = fs::read_dir(root).map_err(|source| RunError::FolderUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    scan_entries(root, entries, recursive, &mut result, progress);
    Ok(result)
}

fn scan_entries(
    dir: &Path,
    entries: fs::ReadDir,
    recursive: bool,
    result: &mut ScanResult,
    progress: &ThrottledProgress,
) {
    let mut names = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        names.push(entry.file_name().to_string_lossy().into_owned());

        // file_type() does not follow symlinks; metadata() does
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if meta.is_dir() {
            if recursive && !entry.file_type().is_ok_and(|t| t.is_symlink()) {
                subdirs.push(path);
            }
        } else if meta.is_file() {
            if is_image(&path) {
                result.files.push(path);
                let found = result.files.len() as u64;
                progress.report("scan", found, 0, "Scanning");
            } else {
                log::debug!("ignoring non-image {}", path.display());
                result.ignored += 1;
            }
        }
    }

    result.entries.insert(dir.to_path_buf(), names);

    for sub in subdirs {
        match fs::read_dir(&sub) {
            Ok(entries) => scan_entries(&sub, entries, recursive, result, progress),
            Err(e) => log::warn!("skipping unreadable folder {}: {}", sub.display(), e),
        }
    }
}
