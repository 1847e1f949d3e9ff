use crate::core::config::Config;
use crate::core::error::Result;
use crate::indexing::progress::ProgressSink;
use crate::indexing::sync::{SyncStats, Synchronizer};
use crate::indexing::walk::relative_segments;
use crate::search::engine::{SearchEngine, SearchEntry};
use crate::storage::index::{IndexStats, IndexStore, ROOT_ID};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// An indexed media library: one base directory and its index.
///
/// Reads never wait for each other or for a running update. Updates are
/// serialized, so at most one synchronization writes at a time.
pub struct Library {
    config: Config,
    base_dir: PathBuf,
    store: IndexStore,
    writer_lock: Mutex<()>,
}

impl Library {
    /// Validate the media directory and open (or create) its index
    pub fn initialize(config: Config) -> Result<Self> {
        let base_dir = config.resolve_media_dir()?;
        config.init()?;
        let store = IndexStore::open(&config)?;
        store.bind_base_dir(&base_dir)?;

        info!(
            base_dir = %base_dir.display(),
            index = %config.index_path.display(),
            "Library ready"
        );

        Ok(Self {
            config,
            base_dir,
            store,
            writer_lock: Mutex::new(()),
        })
    }

    /// Canonical base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn full_update(&self, sink: &mut dyn ProgressSink) -> Result<SyncStats> {
        // A panicked writer left nothing behind: its transaction never committed
        let _writer = self.writer_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.synchronizer()?.full_update(sink)
    }

    pub fn partial_update<P: AsRef<Path>>(
        &self,
        paths: &[P],
        sink: &mut dyn ProgressSink,
    ) -> Result<SyncStats> {
        let _writer = self.writer_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.synchronizer()?.partial_update(paths, sink)
    }

    fn synchronizer(&self) -> Result<Synchronizer<'_>> {
        Synchronizer::new(&self.store, &self.base_dir, &self.config.sync)
    }

    /// Basenames of the indexed children of `path`, in name order.
    ///
    /// `path` is relative to the base directory or absolute below it. Paths
    /// that are not indexed directories list as empty. Never touches the disk.
    pub fn listdir(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let Some(segments) = relative_segments(&self.base_dir, path.as_ref()) else {
            return Ok(Vec::new());
        };

        let reader = self.store.begin_read()?;
        let parent = if segments.is_empty() {
            ROOT_ID
        } else {
            match reader.record_at(&segments)? {
                Some(record) if record.is_dir => record.id,
                _ => return Ok(Vec::new()),
            }
        };

        Ok(reader
            .children_of(parent)?
            .iter()
            .map(|record| record.basename())
            .collect())
    }

    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchEntry>> {
        SearchEngine::new(&self.store, &self.config.search).search(query, max_results)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.store.begin_read()?.stats()
    }
}
