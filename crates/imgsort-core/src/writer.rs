use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::control::RunControl;
use crate::error::ItemError;
use crate::ThrottledProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Give a file its canonical name in place
    Rename,
    /// Put a file into its cluster folder
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    /// Computed but not performed (dry run)
    Planned,
    Done,
    Failed,
    /// Not attempted because the run was interrupted
    Skipped,
}

/// One filesystem operation of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub kind: ActionKind,
    pub from: PathBuf,
    pub to: PathBuf,
    pub status: ActionStatus,
}

impl Action {
    pub fn rename(from: PathBuf, to: PathBuf) -> Self {
        Self {
            kind: ActionKind::Rename,
            from,
            to,
            status: ActionStatus::Planned,
        }
    }

    pub fn move_to(from: PathBuf, to: PathBuf) -> Self {
        Self {
            kind: ActionKind::Move,
            from,
            to,
            status: ActionStatus::Planned,
        }
    }
}

/// Result of the apply phase.
#[derive(Debug, Default)]
pub struct WriteResult {
    pub applied: u64,
    pub errors: Vec<ItemError>,
    pub cancelled: bool,
}

/// Holds a destination name while a file is moved onto it.
///
/// The slot is claimed by creating an empty placeholder with `create_new`, so
/// a file that appeared after planning is never overwritten. The placeholder
/// is removed again unless the move commits.
struct DestinationSlot<'a> {
    path: &'a Path,
    committed: bool,
}

impl<'a> DestinationSlot<'a> {
    fn claim(path: &'a Path) -> io::Result<Self> {
        OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(Self { path, committed: false })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for DestinationSlot<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(self.path);
        }
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let slot = DestinationSlot::claim(to)?;
    fs::rename(from, to)?;
    slot.commit();
    Ok(())
}

/// Perform `actions` in order, or only log them when `dry_run` is set.
///
/// A failed action is recorded and the next one is attempted. Cancellation is
/// checked before every action; once requested the remaining actions are
/// marked skipped.
pub fn apply_actions(
    actions: &mut [Action],
    dry_run: bool,
    control: &RunControl,
    progress: &ThrottledProgress,
) -> WriteResult {
    let mut result = WriteResult::default();
    let mut created_dirs: HashSet<PathBuf> = HashSet::new();
    let total = actions.len() as u64;

    for (i, action) in actions.iter_mut().enumerate() {
        if result.cancelled || control.is_cancelled() {
            result.cancelled = true;
            action.status = ActionStatus::Skipped;
            continue;
        }

        if dry_run {
            log::info!("would {:?} {} -> {}", action.kind, action.from.display(), action.to.display());
            progress.report("plan", i as u64, total, "Planning");
            continue;
        }

        // Create directory only once per unique path
        let mut outcome = Ok(());
        if let Some(dir) = action.to.parent() {
            if !created_dirs.contains(dir) {
                outcome = fs::create_dir_all(dir);
                if outcome.is_ok() {
                    created_dirs.insert(dir.to_path_buf());
                }
            }
        }
        let outcome = outcome.and_then(|_| move_file(&action.from, &action.to));

        match outcome {
            Ok(()) => {
                log::info!("{:?} {} -> {}", action.kind, action.from.display(), action.to.display());
                action.status = ActionStatus::Done;
                result.applied += 1;
            }
            Err(source) => {
                let err = ItemError::FilesystemWrite {
                    from: action.from.clone(),
                    to: action.to.clone(),
                    source,
                };
                log::warn!("{}", err);
                action.status = ActionStatus::Failed;
                result.errors.push(err);
            }
        }
        progress.report("write", i as u64, total, "Moving files");
    }

    result
}
