use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::cluster::Cluster;
use crate::error::ItemError;
use crate::writer::{Action, ActionKind, ActionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    MissingTimestamp,
    NameCollisionExhausted,
    FilesystemWriteError,
}

/// A per-file problem, kept for the end-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct ItemIssue {
    pub path: PathBuf,
    pub kind: IssueKind,
    pub message: String,
}

impl From<&ItemError> for ItemIssue {
    fn from(err: &ItemError) -> Self {
        let kind = match err {
            ItemError::MissingTimestamp { .. } => IssueKind::MissingTimestamp,
            ItemError::NameCollisionExhausted { .. } => IssueKind::NameCollisionExhausted,
            ItemError::FilesystemWrite { .. } => IssueKind::FilesystemWriteError,
        };
        Self {
            path: err.path().to_path_buf(),
            kind,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    /// Relative destination; None when the cluster stayed in place
    pub folder: Option<PathBuf>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub files: Vec<String>,
}

impl From<&Cluster> for ClusterSummary {
    fn from(cluster: &Cluster) -> Self {
        Self {
            folder: cluster.folder.clone(),
            start: cluster.start,
            end: cluster.end,
            files: cluster.items.iter().map(|i| i.filename.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Rename,
    Organize,
}

/// Everything a run planned, did and skipped.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub folder: PathBuf,
    pub dry_run: bool,
    /// Image files found
    pub scanned: u64,
    /// Other files found and left alone
    pub ignored: u64,
    /// Images that needed no change
    pub unchanged: u64,
    pub actions: Vec<Action>,
    pub clusters: Vec<ClusterSummary>,
    pub issues: Vec<ItemIssue>,
    /// Interrupted before all actions were attempted
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(mode: RunMode, folder: &Path, dry_run: bool) -> Self {
        Self {
            mode,
            folder: folder.to_path_buf(),
            dry_run,
            scanned: 0,
            ignored: 0,
            unchanged: 0,
            actions: Vec::new(),
            clusters: Vec::new(),
            issues: Vec::new(),
            cancelled: false,
        }
    }

    pub(crate) fn record(&mut self, err: &ItemError) {
        log::warn!("{}", err);
        self.issues.push(ItemIssue::from(err));
    }

    pub fn count(&self, status: ActionStatus) -> usize {
        self.actions.iter().filter(|a| a.status == status).count()
    }

    pub fn issues_of(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    fn relative<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, Path> {
        match pathdiff::diff_paths(path, &self.folder) {
            Some(rel) if !rel.as_os_str().is_empty() => rel.into(),
            _ => path.into(),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            let verb = match (action.kind, action.status) {
                (ActionKind::Rename, ActionStatus::Planned) => "Would rename",
                (ActionKind::Move, ActionStatus::Planned) => "Would move",
                (ActionKind::Rename, ActionStatus::Done) => "Renamed",
                (ActionKind::Move, ActionStatus::Done) => "Moved",
                // Failures show up under issues
                (_, ActionStatus::Failed) | (_, ActionStatus::Skipped) => continue,
            };
            writeln!(
                f,
                "{} {} -> {}",
                verb,
                self.relative(&action.from).display(),
                self.relative(&action.to).display()
            )?;
        }

        for cluster in &self.clusters {
            let place = match &cluster.folder {
                Some(folder) => folder.display().to_string(),
                None => "(left in place)".to_string(),
            };
            writeln!(
                f,
                "Cluster {}: {} file(s), {} .. {}",
                place,
                cluster.files.len(),
                cluster.start,
                cluster.end
            )?;
        }

        for issue in &self.issues {
            writeln!(f, "Skipped {}: {}", self.relative(&issue.path).display(), issue.message)?;
        }

        let what = match self.mode {
            RunMode::Rename => "renamed",
            RunMode::Organize => "moved",
        };
        if self.dry_run {
            write!(f, "\nDry run complete: would have {} {} file(s)", what, self.count(ActionStatus::Planned))?;
        } else {
            write!(
                f,
                "\nDone: {} {} file(s), {} failed",
                what,
                self.count(ActionStatus::Done),
                self.count(ActionStatus::Failed)
            )?;
        }
        if self.mode == RunMode::Organize {
            let moved = self.clusters.iter().filter(|c| c.folder.is_some()).count();
            write!(f, " into {} folder(s)", moved)?;
        }
        write!(
            f,
            "; {} image(s) scanned, {} unchanged, {} issue(s)",
            self.scanned,
            self.unchanged,
            self.issues.len()
        )?;
        if self.cancelled {
            write!(f, "; interrupted, {} action(s) not attempted", self.count(ActionStatus::Skipped))?;
        }
        Ok(())
    }
}
