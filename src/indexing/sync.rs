use crate::core::config::{validate_base_dir, SyncSettings};
use crate::core::error::{Error, Result};
use crate::indexing::node::{NodeArena, NodeId};
use crate::indexing::progress::{ProgressId, ProgressReporter, ProgressSink, ProgressTree};
use crate::indexing::walk::{relative_segments, unsafe_symlink, Diff, DiffStep, TreeDiff};
use crate::storage::index::{FileId, FileRecord, IndexStore, IndexWriter, ROOT_ID};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a synchronization run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records inserted
    pub added: usize,
    /// Records deleted, counting every record of removed subtrees
    pub removed: usize,
    /// Entries already indexed with the right type
    pub unchanged: usize,
    /// Entries or requested paths left out with a warning
    pub skipped: usize,
}

impl SyncStats {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Brings the index in line with the filesystem below one base directory.
///
/// Each call runs as one logical transaction: either everything it found is
/// written, or the index is left exactly as it was before the call.
pub struct Synchronizer<'a> {
    store: &'a IndexStore,
    base_dir: PathBuf,
    settings: SyncSettings,
    #[cfg(test)]
    fail_after_removals: Option<usize>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(store: &'a IndexStore, base_dir: &Path, settings: &SyncSettings) -> Result<Self> {
        let base_dir = validate_base_dir(base_dir)?;
        store.bind_base_dir(&base_dir)?;
        Ok(Self {
            store,
            base_dir,
            settings: settings.clone(),
            #[cfg(test)]
            fail_after_removals: None,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Synchronize the whole tree below the base directory
    pub fn full_update(&self, sink: &mut dyn ProgressSink) -> Result<SyncStats> {
        info!(base_dir = %self.base_dir.display(), "Starting full index update");
        let mut reporter = ProgressReporter::new(1, sink, self.settings.progress_interval);

        self.transaction(|writer, stats| {
            let mut diff = TreeDiff::from_root(&self.base_dir);
            self.drive(writer, &mut diff, &mut reporter, ProgressTree::ROOT, stats)
        })
        .inspect(|_| reporter.finish())
    }

    /// Synchronize only the given paths and what lies below them.
    ///
    /// Paths may be absolute or relative to the base directory. Paths outside
    /// the base directory, or whose parent directory is missing, are skipped
    /// with a warning.
    pub fn partial_update<P: AsRef<Path>>(
        &self,
        paths: &[P],
        sink: &mut dyn ProgressSink,
    ) -> Result<SyncStats> {
        info!(
            base_dir = %self.base_dir.display(),
            paths = paths.len(),
            "Starting partial index update"
        );
        let interval = self.settings.progress_interval;
        let mut reporter = ProgressReporter::new(paths.len() as u64, sink, interval);

        self.transaction(|writer, stats| {
            for path in paths {
                let path = path.as_ref();
                match self.seed_for(writer, path, stats)? {
                    Some(mut diff) => {
                        self.drive(writer, &mut diff, &mut reporter, ProgressTree::ROOT, stats)?;
                    }
                    None => {
                        stats.skipped += 1;
                        reporter.tree_mut().tick(ProgressTree::ROOT);
                    }
                }
            }
            Ok(())
        })
        .inspect(|_| reporter.finish())
    }

    /// Run `work` inside one logical write transaction
    fn transaction<F>(&self, work: F) -> Result<SyncStats>
    where
        F: FnOnce(&mut IndexWriter<'_>, &mut SyncStats) -> Result<()>,
    {
        let mut writer = self.store.begin_write(self.settings.batch_size)?;
        let mut stats = SyncStats::default();

        let outcome = work(&mut writer, &mut stats).and_then(|()| {
            if stats.changed() {
                let refreshed = writer.recompute_word_occurrences()?;
                debug!(refreshed, "Recomputed word occurrences");
            }
            Ok(())
        });

        match outcome {
            Ok(()) => {
                let commits = writer.commits();
                writer.commit()?;
                info!(
                    added = stats.added,
                    removed = stats.removed,
                    unchanged = stats.unchanged,
                    skipped = stats.skipped,
                    intermediate_commits = commits,
                    "Index update complete"
                );
                Ok(stats)
            }
            Err(error) => {
                warn!(%error, "Index update failed, rolling back");
                writer.rollback()?;
                Err(Error::SyncAborted(error.to_string()))
            }
        }
    }

    /// Walk one diff to completion, applying every step
    fn drive(
        &self,
        writer: &mut IndexWriter<'_>,
        diff: &mut TreeDiff,
        reporter: &mut ProgressReporter<'_>,
        progress_root: ProgressId,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let mut progress_of: HashMap<NodeId, ProgressId> = HashMap::new();

        while let Some(step) = diff.next(writer)? {
            self.apply(writer, diff.arena_mut(), &step, stats)?;

            let parent_progress = step
                .parent
                .and_then(|node| progress_of.get(&node).copied())
                .unwrap_or(progress_root);
            match (step.children, fs_node(&step.diff)) {
                (children, Some(node)) if children > 0 => {
                    let spawned = reporter.tree_mut().spawn(parent_progress, children as u64);
                    progress_of.insert(node, spawned);
                }
                _ => reporter.tree_mut().tick(parent_progress),
            }

            let arena = diff.arena();
            reporter.step(|| describe(arena, &step.diff));
        }

        stats.skipped += diff.skipped();
        Ok(())
    }

    fn apply(
        &self,
        writer: &mut IndexWriter<'_>,
        arena: &mut NodeArena,
        step: &DiffStep,
        stats: &mut SyncStats,
    ) -> Result<()> {
        match &step.diff {
            Diff::Both { node, record } if arena.get(*node).is_dir == record.is_dir => {
                arena.set_id(*node, record.id);
                if record.id != ROOT_ID {
                    stats.unchanged += 1;
                }
            }
            Diff::Both { node, record } => {
                debug!(
                    path = %arena.relative_path(*node).display(),
                    "Entry changed type, replacing record"
                );
                stats.removed += self.remove_recursive(writer, record)?;
                self.register(writer, arena, *node, stats)?;
            }
            Diff::FsOnly { node } => {
                self.register(writer, arena, *node, stats)?;
            }
            Diff::DbOnly { record } => {
                debug!(id = record.id, name = %record.basename(), "Entry gone from disk, removing");
                stats.removed += self.remove_recursive(writer, record)?;
            }
            Diff::Neither => {}
        }
        Ok(())
    }

    fn register(
        &self,
        writer: &mut IndexWriter<'_>,
        arena: &mut NodeArena,
        node: NodeId,
        stats: &mut SyncStats,
    ) -> Result<FileId> {
        let entry = arena.get(node);
        let parent = entry
            .parent
            .and_then(|parent| arena.id(parent))
            .ok_or_else(|| {
                Error::Corrupt(format!(
                    "Parent of {} has no record id",
                    arena.relative_path(node).display()
                ))
            })?;

        let id = writer.register(parent, &entry.name, &entry.extension, entry.is_dir)?;
        debug!(id, path = %arena.relative_path(node).display(), "Registered new entry");
        arena.set_id(node, id);
        stats.added += 1;
        Ok(id)
    }

    /// Delete a record with all its descendants, postings and orphaned words.
    ///
    /// Returns the number of records deleted.
    pub fn remove_recursive(
        &self,
        writer: &mut IndexWriter<'_>,
        record: &FileRecord,
    ) -> Result<usize> {
        let mut queue = VecDeque::from([record.id]);
        let mut collected = Vec::new();
        while let Some(id) = queue.pop_front() {
            collected.push(id);
            queue.extend(writer.children_of(id)?.into_iter().map(|child| child.id));
        }

        for (_done, &id) in collected.iter().enumerate() {
            #[cfg(test)]
            {
                if self.fail_after_removals == Some(_done) {
                    return Err(Error::Io(std::io::Error::other("injected failure during removal")));
                }
            }

            let touched = writer.remove_postings_for_file(id)?;
            writer.delete_orphaned_words(&touched)?;
            writer.delete_file(id)?;
        }

        Ok(collected.len())
    }

    /// Build the starting point of a partial update for `path`
    fn seed_for(
        &self,
        writer: &mut IndexWriter<'_>,
        path: &Path,
        stats: &mut SyncStats,
    ) -> Result<Option<TreeDiff>> {
        let Some(segments) = relative_segments(&self.base_dir, path) else {
            warn!(path = %path.display(), "Path is not inside the base directory, skipping");
            return Ok(None);
        };

        let Some((last, parents)) = segments.split_last() else {
            return Ok(Some(TreeDiff::from_root(&self.base_dir)));
        };

        let parent_dir = parents.iter().fold(self.base_dir.clone(), |dir, s| dir.join(s));
        if !parent_dir.is_dir() {
            warn!(path = %parent_dir.display(), "Directory missing on disk, skipping");
            return Ok(None);
        }

        let mut arena = NodeArena::new(&self.base_dir);
        let mut parent_node = NodeArena::ROOT;
        for (depth, segment) in parents.iter().enumerate() {
            let dir = self.base_dir.join(parents[..=depth].iter().collect::<PathBuf>());
            if is_symlink(&dir) {
                if let Some(reason) = unsafe_symlink(&self.base_dir, &dir, depth == 0) {
                    warn!(path = %dir.display(), reason, "Path goes through a symlink, skipping");
                    return Ok(None);
                }
            }
            parent_node = arena.add(parent_node, segment, true);
        }

        // Ancestors are directories on disk, so stored files in their place go
        for depth in 1..=parents.len() {
            if let Some(existing) = writer.record_at(&parents[..depth], false)? {
                if !existing.is_dir {
                    stats.removed += self.remove_recursive(writer, &existing)?;
                }
            }
        }

        let registered = writer.additions();
        let parent_id = writer.record_at(parents, true)?.map_or(ROOT_ID, |record| record.id);
        stats.added += writer.additions() - registered;
        arena.set_id(parent_node, parent_id);

        let target = parent_dir.join(last);
        let on_disk = match std::fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                match unsafe_symlink(&self.base_dir, &target, parents.is_empty()) {
                    Some(reason) => {
                        warn!(path = %target.display(), reason, "Skipping symlink");
                        stats.skipped += 1;
                        None
                    }
                    None => Some(target.is_dir()),
                }
            }
            Ok(metadata) => Some(metadata.is_dir()),
            Err(_) => None,
        };

        let fs_node = on_disk.map(|is_dir| arena.add(parent_node, last, is_dir));
        let db_record = writer.child_named(parent_id, last)?;

        let seed = match (fs_node, db_record) {
            (Some(node), Some(record)) => Diff::Both { node, record },
            (Some(node), None) => Diff::FsOnly { node },
            (None, Some(record)) => Diff::DbOnly { record },
            (None, None) => Diff::Neither,
        };

        let mut diff = TreeDiff::new(arena);
        diff.seed(seed);
        Ok(Some(diff))
    }
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn fs_node(diff: &Diff) -> Option<NodeId> {
    match diff {
        Diff::Both { node, .. } | Diff::FsOnly { node } => Some(*node),
        Diff::DbOnly { .. } | Diff::Neither => None,
    }
}

fn describe(arena: &NodeArena, diff: &Diff) -> String {
    match fs_node(diff) {
        Some(node) => arena.relative_path(node).display().to_string(),
        None => match diff {
            Diff::DbOnly { record } => record.basename(),
            _ => String::new(),
        },
    }
}
