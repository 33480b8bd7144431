//! Grouping of dated pictures into trips by time and place.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::media::{GeoPoint, MediaItem};

fn default_time_gap_threshold() -> u64 {
    24 * 60 * 60
}

fn default_distance_threshold() -> f64 {
    50_000.0
}

fn default_true() -> bool {
    true
}

fn default_min_cluster_size() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Max seconds between consecutive pictures of one cluster
    #[serde(default = "default_time_gap_threshold")]
    pub time_gap_threshold: u64,
    /// Max meters between consecutive pictures of one cluster
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    /// Stay together only if both time and distance are within bounds
    #[serde(default = "default_true")]
    pub require_both: bool,
    /// Never mix calendar years, and nest folders under `<YYYY>/`
    #[serde(default = "default_true")]
    pub split_by_year: bool,
    /// Smaller clusters stay where they are
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            time_gap_threshold: default_time_gap_threshold(),
            distance_threshold: default_distance_threshold(),
            require_both: true,
            split_by_year: true,
            min_cluster_size: default_min_cluster_size(),
        }
    }
}

impl ClusteringConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let config: ClusteringConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            anyhow::bail!("distance_threshold must be a non-negative number of meters");
        }
        if self.min_cluster_size == 0 {
            anyhow::bail!("min_cluster_size must be at least 1");
        }
        Ok(())
    }

    /// Whether `next` (captured at or after `prev`) must open a new cluster.
    ///
    /// Gaps equal to a threshold count as close. Without a position on both
    /// sides only the time gap is considered.
    pub fn starts_new_cluster(
        &self,
        prev: (NaiveDateTime, Option<GeoPoint>),
        next: (NaiveDateTime, Option<GeoPoint>),
    ) -> bool {
        let (prev_ts, prev_loc) = prev;
        let (next_ts, next_loc) = next;

        if self.split_by_year && prev_ts.year() != next_ts.year() {
            return true;
        }

        let gap = (next_ts - prev_ts).num_seconds();
        let time_exceeded = gap > i64::try_from(self.time_gap_threshold).unwrap_or(i64::MAX);

        let distance_exceeded = match (prev_loc, next_loc) {
            (Some(a), Some(b)) => a.distance_m(&b) > self.distance_threshold,
            _ => return time_exceeded,
        };

        if self.require_both {
            time_exceeded || distance_exceeded
        } else {
            time_exceeded && distance_exceeded
        }
    }
}

/// Timestamp-ordered pictures sharing one destination folder.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub items: Vec<MediaItem>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Destination relative to the organized folder; None when the cluster stays in place
    pub folder: Option<PathBuf>,
}

impl Cluster {
    fn open(item: MediaItem, timestamp: NaiveDateTime) -> Self {
        Self {
            items: vec![item],
            start: timestamp,
            end: timestamp,
            folder: None,
        }
    }

    fn push(&mut self, item: MediaItem, timestamp: NaiveDateTime) {
        self.items.push(item);
        self.end = timestamp;
    }

    fn last_point(&self) -> (NaiveDateTime, Option<GeoPoint>) {
        (self.end, self.items.last().and_then(|i| i.location))
    }

    /// `YYYY_MM_DD` for a single day, `YYYY_MM_DD-YYYY_MM_DD` for a span.
    pub fn base_name(&self) -> String {
        let first = self.start.format("%Y_%m_%d").to_string();
        let last = self.end.format("%Y_%m_%d").to_string();
        if first == last {
            first
        } else {
            format!("{first}-{last}")
        }
    }
}

/// Clusters plus the items that could not take part.
#[derive(Debug, Default)]
pub struct ClusterOutcome {
    pub clusters: Vec<Cluster>,
    /// Items without a timestamp, in input order
    pub undated: Vec<MediaItem>,
}

/// Sort `items` by capture time and split them into clusters in a single sweep.
pub fn cluster_items(items: Vec<MediaItem>, config: &ClusteringConfig) -> ClusterOutcome {
    let mut outcome = ClusterOutcome::default();

    let mut dated: Vec<(NaiveDateTime, MediaItem)> = Vec::with_capacity(items.len());
    for item in items {
        match item.timestamp {
            Some(ts) => dated.push((ts, item)),
            None => outcome.undated.push(item),
        }
    }
    dated.sort_by_cached_key(|(_, item)| item.order_key());

    let mut open: Option<Cluster> = None;
    for (ts, item) in dated {
        let point = (ts, item.location);
        open = Some(match open.take() {
            Some(mut cluster) if !config.starts_new_cluster(cluster.last_point(), point) => {
                cluster.push(item, ts);
                cluster
            }
            Some(cluster) => {
                outcome.clusters.push(cluster);
                Cluster::open(item, ts)
            }
            None => Cluster::open(item, ts),
        });
    }
    outcome.clusters.extend(open);

    outcome
}

/// Give every cluster of at least `min_cluster_size` items a folder name.
///
/// A cluster that already has items in a folder carrying its name (as left
/// by an earlier run over `root`) keeps that folder. Otherwise `exists` tells
/// whether a relative path is already present on disk; such names are
/// skipped the same way as names handed out earlier in this run, by
/// appending `_1`, `_2`, ...
pub fn assign_folders<F>(clusters: &mut [Cluster], config: &ClusteringConfig, root: &Path, exists: F)
where
    F: Fn(&Path) -> bool,
{
    let mut used: HashSet<PathBuf> = HashSet::new();
    let mut counters: HashMap<PathBuf, u32> = HashMap::new();

    for cluster in clusters.iter_mut() {
        if cluster.items.len() < config.min_cluster_size {
            continue;
        }

        let parent = if config.split_by_year {
            PathBuf::from(cluster.start.format("%Y").to_string())
        } else {
            PathBuf::new()
        };
        let base_name = cluster.base_name();

        if let Some(current) = current_folder(cluster, root, &parent, &base_name, &used) {
            log::debug!("cluster starting {} already in {}", cluster.start, current.display());
            used.insert(current.clone());
            cluster.folder = Some(current);
            continue;
        }

        let base = parent.join(&base_name);
        let counter = counters.entry(base.clone()).or_insert(0);
        let mut candidate = base;
        while used.contains(&candidate) || exists(&candidate) {
            *counter += 1;
            candidate = parent.join(format!("{base_name}_{counter}"));
        }

        used.insert(candidate.clone());
        cluster.folder = Some(candidate);
    }
}

/// First folder, relative to `root`, holding one of the cluster's items and
/// named `<base_name>` or `<base_name>_<n>` under `parent`.
fn current_folder(
    cluster: &Cluster,
    root: &Path,
    parent: &Path,
    base_name: &str,
    used: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    cluster.items.iter().find_map(|item| {
        let dir = item.path.parent()?.strip_prefix(root).ok()?;
        let name = dir.file_name()?.to_str()?;
        let matches = dir.parent() == Some(parent) && is_folder_variant(name, base_name) && !used.contains(dir);
        matches.then(|| dir.to_path_buf())
    })
}

fn is_folder_variant(name: &str, base_name: &str) -> bool {
    match name.strip_prefix(base_name) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('_')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn item(name: &str, ts: &str, loc: Option<(f64, f64)>) -> MediaItem {
        let mut item = MediaItem::new(PathBuf::from(format!("/p/{name}")));
        item.timestamp = Some(dt(ts));
        item.location = loc.map(|(lat, lon)| GeoPoint::new(lat, lon));
        item
    }

    fn names(outcome: &ClusterOutcome) -> Vec<Vec<String>> {
        outcome
            .clusters
            .iter()
            .map(|c| c.items.iter().map(|i| i.filename.clone()).collect())
            .collect()
    }

    fn config(gap: u64) -> ClusteringConfig {
        ClusteringConfig {
            time_gap_threshold: gap,
            ..ClusteringConfig::default()
        }
    }

    #[test]
    fn test_time_gap_split() {
        let items = vec![
            item("3.jpg", "2024-01-01 14:00:00", None),
            item("1.jpg", "2024-01-01 10:00:00", None),
            item("2.jpg", "2024-01-01 10:00:30", None),
        ];
        let outcome = cluster_items(items, &config(3600));
        assert_eq!(names(&outcome), vec![vec!["1.jpg", "2.jpg"], vec!["3.jpg"]]);
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_together() {
        let items = vec![
            item("a.jpg", "2024-01-01 10:00:00", None),
            item("b.jpg", "2024-01-01 11:00:00", None),
            item("c.jpg", "2024-01-01 12:00:01", None),
        ];
        let outcome = cluster_items(items, &config(3600));
        assert_eq!(names(&outcome), vec![vec!["a.jpg", "b.jpg"], vec!["c.jpg"]]);
    }

    #[test]
    fn test_distance_equal_to_threshold_stays_together() {
        let a = GeoPoint::new(48.8566, 2.3522);
        let b = GeoPoint::new(48.8606, 2.3376);
        let exact = ClusteringConfig {
            distance_threshold: a.distance_m(&b),
            ..config(3600)
        };
        let prev = (dt("2024-05-01 10:00:00"), Some(a));
        let next = (dt("2024-05-01 10:30:00"), Some(b));
        assert!(!exact.starts_new_cluster(prev, next));

        // Either mode: a long gap alone does not split when the distance is on the edge
        let either = ClusteringConfig {
            require_both: false,
            ..exact.clone()
        };
        let later = (dt("2024-05-03 10:00:00"), Some(b));
        assert!(!either.starts_new_cluster(prev, later));

        let tighter = ClusteringConfig {
            distance_threshold: exact.distance_threshold - 1.0,
            ..either
        };
        assert!(tighter.starts_new_cluster(prev, later));
    }

    #[test]
    fn test_ties_broken_by_filename() {
        let items = vec![
            item("b.jpg", "2024-01-01 10:00:00", None),
            item("a.jpg", "2024-01-01 10:00:00", None),
        ];
        let outcome = cluster_items(items, &config(60));
        assert_eq!(names(&outcome), vec![vec!["a.jpg", "b.jpg"]]);
    }

    #[test]
    fn test_deterministic_and_sorted() {
        let build = || {
            vec![
                item("x.jpg", "2024-03-02 09:00:00", None),
                item("y.jpg", "2024-03-01 09:00:00", None),
                item("z.jpg", "2024-03-01 08:00:00", None),
                item("w.jpg", "2024-03-05 08:00:00", None),
            ]
        };
        let first = cluster_items(build(), &ClusteringConfig::default());
        let mut reversed = build();
        reversed.reverse();
        let second = cluster_items(reversed, &ClusteringConfig::default());
        assert_eq!(names(&first), names(&second));

        for cluster in &first.clusters {
            let stamps: Vec<_> = cluster.items.iter().map(|i| i.timestamp).collect();
            let mut sorted = stamps.clone();
            sorted.sort();
            assert_eq!(stamps, sorted);
        }
    }

    #[test]
    fn test_require_both_splits_on_distance() {
        // Paris then London an hour later
        let items = vec![
            item("paris.jpg", "2024-05-01 10:00:00", Some((48.8566, 2.3522))),
            item("london.jpg", "2024-05-01 11:00:00", Some((51.5074, -0.1278))),
        ];
        let outcome = cluster_items(items.clone(), &config(3 * 3600));
        assert_eq!(outcome.clusters.len(), 2);

        let either = ClusteringConfig {
            require_both: false,
            ..config(3 * 3600)
        };
        assert_eq!(cluster_items(items, &either).clusters.len(), 1);
    }

    #[test]
    fn test_either_mode_keeps_same_place_across_time() {
        let items = vec![
            item("a.jpg", "2024-05-01 10:00:00", Some((46.0, 7.0))),
            item("b.jpg", "2024-05-04 10:00:00", Some((46.001, 7.001))),
        ];
        let either = ClusteringConfig {
            require_both: false,
            ..config(3600)
        };
        assert_eq!(cluster_items(items.clone(), &either).clusters.len(), 1);
        assert_eq!(cluster_items(items, &config(3600)).clusters.len(), 2);
    }

    #[test]
    fn test_missing_location_judged_on_time() {
        let items = vec![
            item("a.jpg", "2024-05-01 10:00:00", Some((48.8566, 2.3522))),
            item("b.jpg", "2024-05-01 10:10:00", None),
            item("c.jpg", "2024-05-01 10:20:00", Some((51.5074, -0.1278))),
        ];
        let outcome = cluster_items(items, &config(3600));
        // b has no position, so a-b is time only; b-c is time only as well
        assert_eq!(outcome.clusters.len(), 1);
    }

    #[test]
    fn test_year_boundary() {
        let items = vec![
            item("a.jpg", "2023-12-31 23:30:00", None),
            item("b.jpg", "2024-01-01 00:10:00", None),
        ];
        assert_eq!(cluster_items(items.clone(), &config(3600)).clusters.len(), 2);

        let no_split = ClusteringConfig {
            split_by_year: false,
            ..config(3600)
        };
        assert_eq!(cluster_items(items, &no_split).clusters.len(), 1);
    }

    #[test]
    fn test_empty_and_undated() {
        let outcome = cluster_items(Vec::new(), &ClusteringConfig::default());
        assert!(outcome.clusters.is_empty());

        let undated = MediaItem::new(PathBuf::from("/p/holiday.jpg"));
        let outcome = cluster_items(vec![undated], &ClusteringConfig::default());
        assert!(outcome.clusters.is_empty());
        assert_eq!(outcome.undated.len(), 1);
    }

    #[test]
    fn test_folder_names() {
        let items = vec![
            item("a.jpg", "2024-07-01 10:00:00", None),
            item("b.jpg", "2024-07-02 09:00:00", None),
            item("c.jpg", "2024-07-10 10:00:00", None),
            item("d.jpg", "2024-07-10 20:00:00", Some((0.5, 0.5))),
        ];
        let mut outcome = cluster_items(items, &config(24 * 3600));
        assert_eq!(outcome.clusters.len(), 2);
        assign_folders(&mut outcome.clusters, &ClusteringConfig::default(), Path::new("/p"), |_| false);
        assert_eq!(outcome.clusters[0].folder, Some(PathBuf::from("2024/2024_07_01-2024_07_02")));
        assert_eq!(outcome.clusters[1].folder, Some(PathBuf::from("2024/2024_07_10")));
    }

    #[test]
    fn test_folder_collisions() {
        // Same day, far apart: two clusters with the same base name
        let items = vec![
            item("a.jpg", "2024-05-01 10:00:00", Some((48.8566, 2.3522))),
            item("b.jpg", "2024-05-01 11:00:00", Some((51.5074, -0.1278))),
            item("c.jpg", "2024-05-01 12:00:00", Some((48.8566, 2.3522))),
        ];
        let mut outcome = cluster_items(items, &config(3600));
        assert_eq!(outcome.clusters.len(), 3);

        let on_disk = PathBuf::from("2024/2024_05_01");
        assign_folders(&mut outcome.clusters, &ClusteringConfig::default(), Path::new("/p"), |p| p == on_disk);
        let folders: Vec<_> = outcome.clusters.iter().map(|c| c.folder.clone().unwrap()).collect();
        assert_eq!(
            folders,
            vec![
                PathBuf::from("2024/2024_05_01_1"),
                PathBuf::from("2024/2024_05_01_2"),
                PathBuf::from("2024/2024_05_01_3"),
            ]
        );
    }

    #[test]
    fn test_organized_folder_is_kept() {
        let mut a = item("a.jpg", "2024-05-01 10:00:00", None);
        a.path = PathBuf::from("/p/2024/2024_05_01_1/a.jpg");
        let mut b = item("b.jpg", "2024-05-01 10:05:00", None);
        b.path = PathBuf::from("/p/2024/2024_05_01_1/b.jpg");
        let fresh = item("c.jpg", "2024-05-01 10:10:00", None);

        let mut outcome = cluster_items(vec![a, b, fresh], &config(3600));
        assert_eq!(outcome.clusters.len(), 1);
        assign_folders(&mut outcome.clusters, &ClusteringConfig::default(), Path::new("/p"), |_| false);
        assert_eq!(outcome.clusters[0].folder, Some(PathBuf::from("2024/2024_05_01_1")));
    }

    #[test]
    fn test_folder_variant_names() {
        assert!(is_folder_variant("2024_05_01", "2024_05_01"));
        assert!(is_folder_variant("2024_05_01_12", "2024_05_01"));
        assert!(!is_folder_variant("2024_05_01_", "2024_05_01"));
        assert!(!is_folder_variant("2024_05_01-2024_05_02", "2024_05_01"));
        assert!(!is_folder_variant("2024_05_01_trip", "2024_05_01"));
    }

    #[test]
    fn test_small_clusters_stay_in_place() {
        let items = vec![
            item("a.jpg", "2024-01-01 10:00:00", None),
            item("b.jpg", "2024-01-01 10:05:00", None),
            item("c.jpg", "2024-02-01 10:00:00", None),
        ];
        let cfg = ClusteringConfig {
            min_cluster_size: 2,
            split_by_year: false,
            ..ClusteringConfig::default()
        };
        let mut outcome = cluster_items(items, &cfg);
        assign_folders(&mut outcome.clusters, &cfg, Path::new("/p"), |_| false);
        assert_eq!(outcome.clusters[0].folder, Some(PathBuf::from("2024_01_01")));
        assert_eq!(outcome.clusters[1].folder, None);
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let cfg: ClusteringConfig = serde_json::from_str(r#"{"time_gap_threshold": 3600}"#).unwrap();
        assert_eq!(cfg.time_gap_threshold, 3600);
        assert_eq!(cfg.distance_threshold, 50_000.0);
        assert!(cfg.require_both);
        assert!(cfg.split_by_year);
        assert_eq!(cfg.min_cluster_size, 1);
    }

    #[test]
    fn test_config_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        std::fs::write(&path, r#"{"min_cluster_size": 0}"#).unwrap();
        assert!(ClusteringConfig::from_json_file(&path).is_err());

        std::fs::write(&path, r#"{"distance_threshold": 1000, "require_both": false}"#).unwrap();
        let cfg = ClusteringConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.distance_threshold, 1000.0);
        assert!(!cfg.require_both);
    }
}
