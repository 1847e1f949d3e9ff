use crate::core::error::Result;
use crate::indexing::node::{NodeArena, NodeId};
use crate::storage::index::{FileRecord, IndexWriter, ROOT_ID};
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// How one path compares between disk and index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
    /// On disk and in the index
    Both { node: NodeId, record: FileRecord },
    /// On disk only
    FsOnly { node: NodeId },
    /// In the index only
    DbOnly { record: FileRecord },
    /// On neither side. Only ever a seed.
    Neither,
}

/// One unit of work handed out by [`TreeDiff`]
#[derive(Debug, Clone)]
pub struct DiffStep {
    pub diff: Diff,
    /// Directory node whose listing produced this step, `None` for seeds
    pub parent: Option<NodeId>,
    /// How many child steps were queued behind this one
    pub children: usize,
}

/// Depth-first, stack-driven comparison of the filesystem against the index.
///
/// A step is handed out before any of its children, so the caller can give
/// a new directory its record id before the entries inside it need it.
pub struct TreeDiff {
    arena: NodeArena,
    stack: Vec<(Diff, Option<NodeId>)>,
    skipped: usize,
}

impl TreeDiff {
    pub fn new(arena: NodeArena) -> Self {
        Self {
            arena,
            stack: Vec::new(),
            skipped: 0,
        }
    }

    /// Seed a full walk: the base directory matched against the synthetic root record
    pub fn from_root(base_dir: &Path) -> Self {
        let mut diff = Self::new(NodeArena::new(base_dir));
        diff.seed(Diff::Both {
            node: NodeArena::ROOT,
            record: root_record(),
        });
        diff
    }

    pub fn seed(&mut self, diff: Diff) {
        self.stack.push((diff, None));
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    /// Entries left out of the walk (unsafe symlinks, undecodable names)
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Pop the next step and queue its children
    pub fn next(&mut self, writer: &IndexWriter<'_>) -> Result<Option<DiffStep>> {
        let Some((diff, parent)) = self.stack.pop() else {
            return Ok(None);
        };

        let (fs_dir, db_dir) = match &diff {
            Diff::Both { node, record } => {
                let fs_is_dir = self.arena.get(*node).is_dir;
                let db_dir = (fs_is_dir && record.is_dir).then_some(record.id);
                (fs_is_dir.then_some(*node), db_dir)
            }
            Diff::FsOnly { node } => (self.arena.get(*node).is_dir.then_some(*node), None),
            Diff::DbOnly { .. } | Diff::Neither => (None, None),
        };

        let children = match fs_dir {
            Some(node) => self.queue_children(node, db_dir, writer)?,
            None => 0,
        };

        Ok(Some(DiffStep {
            diff,
            parent,
            children,
        }))
    }

    fn queue_children(
        &mut self,
        node: NodeId,
        db_dir: Option<i64>,
        writer: &IndexWriter<'_>,
    ) -> Result<usize> {
        let dir_path = self.arena.path(node);
        let listing = list_children(self.arena.root_path(), &dir_path, node == NodeArena::ROOT)?;
        self.skipped += listing.skipped;

        let mut db_children: BTreeMap<String, FileRecord> = match db_dir {
            Some(id) => writer
                .children_of(id)?
                .into_iter()
                .map(|record| (record.basename(), record))
                .collect(),
            None => BTreeMap::new(),
        };

        let mut queued = Vec::with_capacity(listing.entries.len() + db_children.len());
        for entry in listing.entries {
            let child = self.arena.add(node, &entry.basename, entry.is_dir);
            let diff = match db_children.remove(&entry.basename) {
                Some(record) => Diff::Both { node: child, record },
                None => Diff::FsOnly { node: child },
            };
            queued.push(diff);
        }
        queued.extend(db_children.into_values().map(|record| Diff::DbOnly { record }));

        let count = queued.len();
        // Reversed so the stack hands children out in listing order
        for diff in queued.into_iter().rev() {
            self.stack.push((diff, Some(node)));
        }

        Ok(count)
    }
}

/// Stand-in for the base directory, which has no stored record
pub fn root_record() -> FileRecord {
    FileRecord {
        id: ROOT_ID,
        parent: ROOT_ID,
        name: String::new(),
        extension: String::new(),
        is_dir: true,
    }
}

/// A directory entry that passed the safety filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub basename: String,
    pub is_dir: bool,
}

#[derive(Debug, Default)]
pub struct Listing {
    pub entries: Vec<FsEntry>,
    pub skipped: usize,
}

/// List the direct children of `dir`, sorted by name.
///
/// Names that are not valid UTF-8 and unsafe symlinks are skipped with a warning.
pub fn list_children(base_dir: &Path, dir: &Path, dir_is_base: bool) -> Result<Listing> {
    // Walk the resolved target of a followed top-level symlink
    let listing_root = if std::fs::symlink_metadata(dir)?.file_type().is_symlink() {
        std::fs::canonicalize(dir)?
    } else {
        dir.to_path_buf()
    };

    let walker = WalkBuilder::new(&listing_root)
        .max_depth(Some(1))
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut listing = Listing::default();
    for result in walker {
        let entry = result?;
        if entry.depth() == 0 {
            continue;
        }

        let Some(basename) = entry.file_name().to_str() else {
            warn!(
                path = %entry.path().display(),
                "Skipping entry with a name that is not valid UTF-8"
            );
            listing.skipped += 1;
            continue;
        };

        let is_dir = if entry.path_is_symlink() {
            let link = dir.join(basename);
            if let Some(reason) = unsafe_symlink(base_dir, &link, dir_is_base) {
                warn!(path = %link.display(), reason, "Skipping symlink");
                listing.skipped += 1;
                continue;
            }
            link.is_dir()
        } else {
            entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
        };

        listing.entries.push(FsEntry {
            basename: basename.to_string(),
            is_dir,
        });
    }

    debug!(dir = %dir.display(), entries = listing.entries.len(), "Listed directory");
    Ok(listing)
}

/// Why a symlink must not be followed, or `None` if it is safe.
///
/// Only symlinks sitting directly in the base directory are followed, and
/// never when they lead back to the base directory or above it.
pub fn unsafe_symlink(base_dir: &Path, link: &Path, top_level: bool) -> Option<&'static str> {
    let target = match std::fs::canonicalize(link) {
        Ok(target) => target,
        Err(_) => return Some("target does not exist"),
    };

    if base_dir.starts_with(&target) {
        return Some("target is the base directory or one of its ancestors");
    }

    if !top_level {
        return Some("only symlinks directly inside the base directory are followed");
    }

    None
}

/// Lexically normalize `path` and express it as segments below `base_dir`.
///
/// Relative paths are taken relative to `base_dir`. Returns `None` when the
/// path leaves the base directory or a segment is not valid UTF-8.
pub fn relative_segments(base_dir: &Path, path: &Path) -> Option<Vec<String>> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    let relative = normalized.strip_prefix(base_dir).ok()?;
    relative
        .components()
        .map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect()
}
