//! Canonical `img_<YYYYMMDD_HHmmss>_<ID>.<EXT>` names and collision-free allocation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::ItemError;
use crate::media::MediaItem;
use crate::writer::Action;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^img_(?P<stamp>\d{8}_\d{6})_(?P<id>\d+)(?:\.(?P<ext>[^.]+))?$").unwrap()
});

/// The parts of a canonical filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalName {
    pub timestamp: NaiveDateTime,
    pub id: u32,
    pub extension: String,
}

/// Build `img_<YYYYMMDD_HHmmss>_<ID>.<EXT>`; files without extension get no trailing dot.
pub fn canonical_name(timestamp: &NaiveDateTime, id: u32, extension: &str) -> String {
    let stamp = timestamp.format(STAMP_FORMAT);
    if extension.is_empty() {
        format!("img_{stamp}_{id}")
    } else {
        format!("img_{stamp}_{id}.{extension}")
    }
}

/// Parse a canonical filename. Returns None for other names and for impossible dates.
pub fn parse_canonical(filename: &str) -> Option<CanonicalName> {
    let caps = CANONICAL_RE.captures(filename)?;
    let timestamp = NaiveDateTime::parse_from_str(caps.name("stamp")?.as_str(), STAMP_FORMAT).ok()?;
    let id = caps.name("id")?.as_str().parse().ok()?;
    let extension = caps.name("ext").map(|m| m.as_str().to_string()).unwrap_or_default();
    Some(CanonicalName {
        timestamp,
        id,
        extension,
    })
}

/// Per-run lookup of taken names and the next ID to try for each timestamp.
///
/// Names are compared case-insensitively so that `IMG_..._0.JPG` and
/// `img_..._0.jpg` never end up side by side on a case-insensitive filesystem.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    taken: HashSet<String>,
    next_id: HashMap<NaiveDateTime, u32>,
    max_id: u32,
}

impl NameAllocator {
    /// Start from the names already present in the target folder.
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            taken: existing.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
            next_id: HashMap::new(),
            max_id: u32::MAX,
        }
    }

    /// Cap the ID space (mostly useful for tests).
    pub fn with_max_id(mut self, max_id: u32) -> Self {
        self.max_id = max_id;
        self
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&name.to_lowercase())
    }

    /// Mark `name` as used. Returns false if it already was.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_lowercase())
    }

    /// Pick the lowest free ID for `timestamp`, reserve the name and return it.
    /// None once every ID up to the cap is taken.
    pub fn allocate(&mut self, timestamp: &NaiveDateTime, extension: &str) -> Option<String> {
        let mut id = self.next_id.get(timestamp).copied().unwrap_or(0);
        loop {
            if id > self.max_id {
                return None;
            }
            let name = canonical_name(timestamp, id, extension);
            if self.reserve(&name) {
                self.next_id.insert(*timestamp, id.saturating_add(1));
                return Some(name);
            }
            id = id.checked_add(1)?;
        }
    }
}

/// Renames needed to bring a set of dated items to canonical names.
#[derive(Debug, Default)]
pub struct RenamePlan {
    pub actions: Vec<Action>,
    /// Items already carrying their canonical name
    pub unchanged: u64,
    pub errors: Vec<ItemError>,
}

/// Plan canonical names for `items`.
///
/// `entries` lists every name present in each directory; items are renamed
/// within their own directory. Processing order is capture time then
/// filename, so IDs are stable across identical runs.
pub fn plan_renames(mut items: Vec<MediaItem>, entries: &HashMap<PathBuf, Vec<String>>, max_id: u32) -> RenamePlan {
    items.sort_by_cached_key(MediaItem::order_key);

    let mut plan = RenamePlan::default();
    let mut allocators: HashMap<PathBuf, NameAllocator> = HashMap::new();

    for item in items {
        let Some(timestamp) = item.timestamp else {
            plan.errors.push(ItemError::MissingTimestamp { path: item.path });
            continue;
        };

        if parse_canonical(&item.filename).is_some_and(|c| c.timestamp == timestamp) {
            log::debug!("{} already normalized", item.path.display());
            plan.unchanged += 1;
            continue;
        }

        let dir = item.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let allocator = allocators.entry(dir.clone()).or_insert_with(|| {
            NameAllocator::new(entries.get(&dir).into_iter().flatten()).with_max_id(max_id)
        });

        match allocator.allocate(&timestamp, &item.extension) {
            Some(name) => plan.actions.push(Action::rename(item.path, dir.join(name))),
            None => plan.errors.push(ItemError::NameCollisionExhausted {
                path: item.path,
                timestamp,
            }),
        }
    }

    plan
}
