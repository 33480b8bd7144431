pub mod cluster;
pub mod control;
pub mod date;
pub mod error;
pub mod media;
pub mod metadata;
pub mod naming;
pub mod report;
pub mod scan;
pub mod writer;

use std::cell::Cell;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use cluster::{ClusteringConfig, Cluster};
pub use control::{CancellationToken, RunControl};
pub use error::{ItemError, RunError};
pub use media::{GeoPoint, MediaItem};
pub use metadata::{ExifReader, Metadata, MetadataReader};
pub use report::{IssueKind, ItemIssue, RunMode, RunReport};

use date::TimestampStrategy;
use naming::NameAllocator;
use writer::Action;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOptions {
    pub folder: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub recursive: bool,
    /// Disable date guessing from filenames
    #[serde(default)]
    pub no_guess: bool,
    /// Disable the file modification time fallback
    #[serde(default)]
    pub no_mtime: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOptions {
    pub folder: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub clustering: ClusteringConfig,
}

/// Type alias for progress callback; it may borrow from the caller's stack.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + 'a;

/// Throttled progress reporter; emits at most every 200ms or on completion.
/// A `total` of zero means the total is not known yet.
///
/// The last emit time lives in a `Cell`, so a reporter is `!Sync` and must
/// stay on the thread that runs the pipeline.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Cell<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        let start = Instant::now();
        Self {
            inner,
            last_emit: Cell::new(start.checked_sub(Duration::from_secs(1)).unwrap_or(start)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = total > 0 && current + 1 >= total;
        if !is_done {
            if self.last_emit.get().elapsed() < Duration::from_millis(200) {
                return;
            }
            self.last_emit.set(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Give every image of the folder its canonical `img_<YYYYMMDD_HHmmss>_<ID>.<EXT>` name.
pub fn rename(options: &RenameOptions, progress_callback: &ProgressCallback<'_>) -> Result<RunReport, RunError> {
    rename_with(options, &ExifReader, &RunControl::default(), progress_callback)
}

/// [`rename`] with an explicit metadata source and run control.
pub fn rename_with(
    options: &RenameOptions,
    reader: &dyn MetadataReader,
    control: &RunControl,
    progress_callback: &ProgressCallback<'_>,
) -> Result<RunReport, RunError> {
    let tp = ThrottledProgress::new(progress_callback);
    let mut report = RunReport::new(RunMode::Rename, &options.folder, options.dry_run);

    // Stage 1: Scan
    let scan = scan::scan_folder(&options.folder, options.recursive, &tp)?;
    report.scanned = scan.files.len() as u64;
    report.ignored = scan.ignored;
    log::info!("found {} image(s) in {}", scan.files.len(), options.folder.display());

    // Stage 2: Resolve timestamps
    let strategies = TimestampStrategy::rename_order(!options.no_guess, !options.no_mtime);
    let items = resolve_items(scan.files, &strategies, reader, &tp, false);

    // Stage 3: Pick names
    let plan = naming::plan_renames(items, &scan.entries, u32::MAX);
    for err in &plan.errors {
        report.record(err);
    }
    report.unchanged += plan.unchanged;
    report.actions = plan.actions;

    // Stage 4: Rename (or just report)
    finish(report, options.dry_run, control, &tp)
}

/// Move canonically named images into one folder per spatio-temporal cluster.
pub fn organize(options: &OrganizeOptions, progress_callback: &ProgressCallback<'_>) -> Result<RunReport, RunError> {
    organize_with(options, &ExifReader, &RunControl::default(), progress_callback)
}

/// [`organize`] with an explicit metadata source and run control.
pub fn organize_with(
    options: &OrganizeOptions,
    reader: &dyn MetadataReader,
    control: &RunControl,
    progress_callback: &ProgressCallback<'_>,
) -> Result<RunReport, RunError> {
    let tp = ThrottledProgress::new(progress_callback);
    let root = options.folder.as_path();
    let config = &options.clustering;
    let mut report = RunReport::new(RunMode::Organize, root, options.dry_run);

    // Stage 1: Scan
    let scan = scan::scan_folder(root, options.recursive, &tp)?;
    report.scanned = scan.files.len() as u64;
    report.ignored = scan.ignored;
    log::info!("found {} image(s) in {}", scan.files.len(), root.display());

    // Stage 2: Timestamps come from canonical names only, positions from metadata
    let items = resolve_items(scan.files, &[TimestampStrategy::CanonicalName], reader, &tp, true);

    // Stage 3: Cluster
    let mut outcome = cluster::cluster_items(items, config);
    for item in outcome.undated {
        report.record(&ItemError::MissingTimestamp { path: item.path });
    }
    cluster::assign_folders(&mut outcome.clusters, config, root, |rel| root.join(rel).exists());
    log::info!("{} cluster(s)", outcome.clusters.len());

    // Stage 4: Plan moves
    for c in &outcome.clusters {
        let Some(folder) = &c.folder else {
            log::debug!("cluster of {} starting {} stays in place", c.items.len(), c.start);
            report.unchanged += c.items.len() as u64;
            continue;
        };
        let dest_dir = root.join(folder);
        // A folder kept from an earlier run already holds names; a fresh one
        // can still receive equal names from different subfolders
        let mut names = NameAllocator::new(scan.entries.get(&dest_dir).into_iter().flatten());
        for item in &c.items {
            if item.path.parent() == Some(dest_dir.as_path()) {
                report.unchanged += 1;
                continue;
            }
            let name = if names.reserve(&item.filename) {
                Some(item.filename.clone())
            } else {
                item.timestamp.and_then(|ts| names.allocate(&ts, &item.extension))
            };
            match name {
                Some(name) => report.actions.push(Action::move_to(item.path.clone(), dest_dir.join(name))),
                None => report.record(&ItemError::NameCollisionExhausted {
                    path: item.path.clone(),
                    timestamp: item.timestamp.unwrap_or(c.start),
                }),
            }
        }
    }
    report.clusters = outcome.clusters.iter().map(report::ClusterSummary::from).collect();

    // Stage 5: Move (or just report)
    finish(report, options.dry_run, control, &tp)
}

/// Turn scanned paths into media items. Items without a timestamp are kept
/// so the planner or clusterer can report them.
fn resolve_items(
    files: Vec<PathBuf>,
    strategies: &[TimestampStrategy],
    reader: &dyn MetadataReader,
    tp: &ThrottledProgress,
    with_location: bool,
) -> Vec<MediaItem> {
    let total = files.len() as u64;
    let mut items = Vec::with_capacity(files.len());
    let mut dated = 0u64;

    for (i, path) in files.into_iter().enumerate() {
        let mut item = MediaItem::new(path);
        if let Some(result) = date::extract_date(&item.path, &item.filename, strategies, reader) {
            log::debug!("{}: {} via {:?}", item.filename, result.date, result.source);
            item.timestamp = Some(result.date);
            item.timestamp_source = Some(result.source);
            dated += 1;
            if with_location {
                item.location = reader.read(&item.path).location;
            }
        }
        items.push(item);
        tp.report("date", i as u64, total, "Reading timestamps");
    }

    log::info!("dates found: {}/{}", dated, total);
    items
}

fn finish(
    mut report: RunReport,
    dry_run: bool,
    control: &RunControl,
    tp: &ThrottledProgress,
) -> Result<RunReport, RunError> {
    let result = writer::apply_actions(&mut report.actions, dry_run, control, tp);
    for err in &result.errors {
        report.record(err);
    }
    report.cancelled = result.cancelled;
    Ok(report)
}
