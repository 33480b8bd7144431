use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

/// Problem with a single file. The run reports it and moves on.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("no capture timestamp found for {}", .path.display())]
    MissingTimestamp { path: PathBuf },

    #[error("no free name left for {} (captured {timestamp})", .path.display())]
    NameCollisionExhausted {
        path: PathBuf,
        timestamp: NaiveDateTime,
    },

    #[error("could not move {} to {}: {source}", .from.display(), .to.display())]
    FilesystemWrite {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ItemError {
    /// The file the error is about.
    pub fn path(&self) -> &Path {
        match self {
            ItemError::MissingTimestamp { path } => path,
            ItemError::NameCollisionExhausted { path, .. } => path,
            ItemError::FilesystemWrite { from, .. } => from,
        }
    }
}

/// Problem that stops the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot read folder {}: {source}", .path.display())]
    FolderUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
