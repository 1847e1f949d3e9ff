use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::indexing::tokenize::{prefix_upper_bound, tokenize};
use redb::{Database, ReadTransaction, ReadableTable, Savepoint, WriteTransaction};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub use super::records::{FileId, FileRecord, IndexStats, WordId, ROOT_ID};
use super::records::{
    child_id, children_records, count_postings, has_postings, load_record, resolve_path,
    BASE_DIR_KEY, CHILDREN_TABLE, DICTIONARY_TABLE, FILES_TABLE, FILE_SEQUENCE_KEY,
    FILE_WORDS_TABLE, META_TABLE, POSTINGS_TABLE, SETTINGS_TABLE, WORDS_TABLE,
    WORD_SEQUENCE_KEY,
};

/// Persistent filename index: file records, word dictionary and posting list.
///
/// Cloning shares the same database handle.
#[derive(Clone)]
pub struct IndexStore {
    db: Arc<Database>,
}

impl IndexStore {
    /// Open or create the index at the configured path
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_path(&config.index_path)
    }

    /// Open or create the index at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path.exists() {
            Database::open(path).map_err(|e| {
                let msg = e.to_string();
                if msg.to_lowercase().contains("lock") {
                    Error::Database(
                        "Index database is locked. Another mediadex process may be running. \
                         Close other instances and try again."
                            .to_string(),
                    )
                } else {
                    Error::Database(format!("Failed to open index database: {}", e))
                }
            })?
        } else {
            Database::create(path)
                .map_err(|e| Error::Database(format!("Failed to create index database: {}", e)))?
        };

        // Initialize tables (safe even if they already exist)
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(FILES_TABLE)?;
            write_txn.open_table(CHILDREN_TABLE)?;
            write_txn.open_table(DICTIONARY_TABLE)?;
            write_txn.open_table(WORDS_TABLE)?;
            write_txn.open_table(POSTINGS_TABLE)?;
            write_txn.open_table(FILE_WORDS_TABLE)?;
            write_txn.open_table(META_TABLE)?;
            write_txn.open_table(SETTINGS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Tie the index to the directory it mirrors.
    ///
    /// The first call records `base_dir`. Later calls with another directory
    /// fail with [`Error::Config`], so one index never serves two trees.
    pub fn bind_base_dir(&self, base_dir: &Path) -> Result<()> {
        let wanted = base_dir.to_string_lossy();
        let bound = {
            let txn = self.db.begin_read()?;
            let settings = txn.open_table(SETTINGS_TABLE)?;
            let value = settings.get(BASE_DIR_KEY)?.map(|guard| guard.value().to_string());
            value
        };

        match bound {
            Some(bound) if bound == wanted => Ok(()),
            Some(bound) => Err(Error::Config(format!(
                "Index already mirrors {}, not {}. Use another data directory.",
                bound, wanted
            ))),
            None => {
                let txn = self.db.begin_write()?;
                {
                    let mut settings = txn.open_table(SETTINGS_TABLE)?;
                    settings.insert(BASE_DIR_KEY, &*wanted)?;
                }
                txn.commit()?;
                debug!(base_dir = %wanted, "Index bound to base directory");
                Ok(())
            }
        }
    }

    /// Start one logical write transaction.
    ///
    /// Blocks while another writer is active.
    pub fn begin_write(&self, batch_size: usize) -> Result<IndexWriter<'_>> {
        IndexWriter::begin(&self.db, batch_size)
    }

    /// Open a read-only snapshot of the last committed state
    pub fn begin_read(&self) -> Result<IndexReader<'_>> {
        Ok(IndexReader {
            txn: self.db.begin_read()?,
        })
    }
}

/// A write transaction spanning one synchronization call.
///
/// The underlying redb transaction is committed every `batch_size` additions.
/// An ephemeral savepoint taken at the start lets [`IndexWriter::rollback`]
/// undo every commit made since.
pub struct IndexWriter<'db> {
    db: &'db Database,
    txn: Option<WriteTransaction<'db>>,
    savepoint: Savepoint,
    batch_size: usize,
    pending_additions: usize,
    additions: usize,
    commits: usize,
}

impl<'db> IndexWriter<'db> {
    fn begin(db: &'db Database, batch_size: usize) -> Result<Self> {
        let txn = db.begin_write()?;
        // Must be taken before the transaction writes anything
        let savepoint = txn.ephemeral_savepoint()?;

        Ok(Self {
            db,
            txn: Some(txn),
            savepoint,
            batch_size: batch_size.max(1),
            pending_additions: 0,
            additions: 0,
            commits: 0,
        })
    }

    fn txn(&self) -> Result<&WriteTransaction<'db>> {
        self.txn
            .as_ref()
            .ok_or_else(|| Error::Database("Write transaction already finished".to_string()))
    }

    /// Number of intermediate commits made so far
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Number of records registered so far
    pub fn additions(&self) -> usize {
        self.additions
    }

    fn next_id(&self, key: &str) -> Result<u64> {
        let mut meta = self.txn()?.open_table(META_TABLE)?;
        let next = meta.get(key)?.map(|guard| guard.value()).unwrap_or(0) + 1;
        meta.insert(key, next)?;
        Ok(next)
    }

    /// Insert a file record and return its new id
    pub fn insert_file(
        &mut self,
        parent: FileId,
        name: &str,
        extension: &str,
        is_dir: bool,
    ) -> Result<FileId> {
        let id = self.next_id(FILE_SEQUENCE_KEY)? as FileId;
        let record = FileRecord {
            id,
            parent,
            name: name.to_string(),
            extension: extension.to_string(),
            is_dir,
        };
        let json = record.to_json()?;
        let basename = record.basename();

        let txn = self.txn()?;
        {
            let mut files = txn.open_table(FILES_TABLE)?;
            files.insert(id, json.as_str())?;
        }
        {
            let mut children = txn.open_table(CHILDREN_TABLE)?;
            children.insert((parent, basename.as_str()), id)?;
        }

        Ok(id)
    }

    /// Insert a word, or return the id it already has
    pub fn insert_word(&mut self, word: &str) -> Result<WordId> {
        let existing = {
            let dictionary = self.txn()?.open_table(DICTIONARY_TABLE)?;
            let id = dictionary.get(word)?.map(|guard| guard.value().0);
            id
        };
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = self.next_id(WORD_SEQUENCE_KEY)?;
        let txn = self.txn()?;
        {
            let mut dictionary = txn.open_table(DICTIONARY_TABLE)?;
            dictionary.insert(word, (id, 0))?;
        }
        {
            let mut words = txn.open_table(WORDS_TABLE)?;
            words.insert(id, word)?;
        }

        Ok(id)
    }

    pub fn add_postings(&mut self, file: FileId, words: &[WordId]) -> Result<()> {
        let txn = self.txn()?;
        {
            let mut postings = txn.open_table(POSTINGS_TABLE)?;
            for &word in words {
                postings.insert((word, file), ())?;
            }
        }
        {
            let mut file_words = txn.open_table(FILE_WORDS_TABLE)?;
            for &word in words {
                file_words.insert((file, word), ())?;
            }
        }
        Ok(())
    }

    /// Insert a record and index the words of its name.
    ///
    /// Counts as one addition towards the next incremental commit.
    pub fn register(
        &mut self,
        parent: FileId,
        name: &str,
        extension: &str,
        is_dir: bool,
    ) -> Result<FileId> {
        let id = self.insert_file(parent, name, extension, is_dir)?;

        let mut word_ids = Vec::new();
        for word in tokenize(name) {
            word_ids.push(self.insert_word(&word)?);
        }
        self.add_postings(id, &word_ids)?;

        self.additions += 1;
        self.pending_additions += 1;
        if self.pending_additions >= self.batch_size {
            self.checkpoint()?;
        }

        Ok(id)
    }

    /// Remove every posting of `file`, returning the words they referenced
    pub fn remove_postings_for_file(&mut self, file: FileId) -> Result<BTreeSet<WordId>> {
        let txn = self.txn()?;
        let touched: BTreeSet<WordId> = {
            let file_words = txn.open_table(FILE_WORDS_TABLE)?;
            let mut found = BTreeSet::new();
            for item in file_words.range((file, 0u64)..=(file, u64::MAX))? {
                let (key, _) = item?;
                found.insert(key.value().1);
            }
            found
        };

        {
            let mut file_words = txn.open_table(FILE_WORDS_TABLE)?;
            for &word in &touched {
                file_words.remove((file, word))?;
            }
        }
        {
            let mut postings = txn.open_table(POSTINGS_TABLE)?;
            for &word in &touched {
                postings.remove((word, file))?;
            }
        }

        Ok(touched)
    }

    /// Delete the words no posting references any more. Returns how many went.
    pub fn delete_orphaned_words(&mut self, candidates: &BTreeSet<WordId>) -> Result<usize> {
        let txn = self.txn()?;
        let orphans: Vec<(WordId, String)> = {
            let postings = txn.open_table(POSTINGS_TABLE)?;
            let words = txn.open_table(WORDS_TABLE)?;
            let mut found = Vec::new();
            for &word in candidates {
                if has_postings(&postings, word)? {
                    continue;
                }
                if let Some(guard) = words.get(word)? {
                    found.push((word, guard.value().to_string()));
                }
            }
            found
        };

        {
            let mut words = txn.open_table(WORDS_TABLE)?;
            for (id, _) in &orphans {
                words.remove(*id)?;
            }
        }
        {
            let mut dictionary = txn.open_table(DICTIONARY_TABLE)?;
            for (_, word) in &orphans {
                dictionary.remove(word.as_str())?;
            }
        }

        Ok(orphans.len())
    }

    /// Delete a file record and its entry in the parent index
    pub fn delete_file(&mut self, file: FileId) -> Result<()> {
        let txn = self.txn()?;
        let record = {
            let files = txn.open_table(FILES_TABLE)?;
            load_record(&files, file)?
        };

        let Some(record) = record else {
            debug!(file, "Record already gone");
            return Ok(());
        };

        {
            let mut files = txn.open_table(FILES_TABLE)?;
            files.remove(file)?;
        }
        {
            let mut children = txn.open_table(CHILDREN_TABLE)?;
            children.remove((record.parent, record.basename().as_str()))?;
        }

        Ok(())
    }

    pub fn record(&self, id: FileId) -> Result<Option<FileRecord>> {
        let files = self.txn()?.open_table(FILES_TABLE)?;
        load_record(&files, id)
    }

    /// Direct children of `parent`, ordered by basename
    pub fn children_of(&self, parent: FileId) -> Result<Vec<FileRecord>> {
        let txn = self.txn()?;
        let children = txn.open_table(CHILDREN_TABLE)?;
        let files = txn.open_table(FILES_TABLE)?;
        children_records(&children, &files, parent)
    }

    pub fn child_named(&self, parent: FileId, basename: &str) -> Result<Option<FileRecord>> {
        let txn = self.txn()?;
        let children = txn.open_table(CHILDREN_TABLE)?;
        let files = txn.open_table(FILES_TABLE)?;
        match child_id(&children, parent, basename)? {
            Some(id) => load_record(&files, id),
            None => Ok(None),
        }
    }

    /// Resolve a relative path to its record.
    ///
    /// With `create`, missing segments are registered as directories on the way.
    pub fn record_at(&mut self, segments: &[String], create: bool) -> Result<Option<FileRecord>> {
        if !create {
            let txn = self.txn()?;
            let children = txn.open_table(CHILDREN_TABLE)?;
            let files = txn.open_table(FILES_TABLE)?;
            return resolve_path(&children, &files, segments);
        }

        let mut parent = ROOT_ID;
        let mut record = None;
        for segment in segments {
            let found = match self.child_named(parent, segment)? {
                Some(existing) => existing,
                None => {
                    let id = self.register(parent, segment, "", true)?;
                    debug!(id, segment = segment.as_str(), "Created intermediate directory record");
                    self.record(id)?.ok_or_else(|| {
                        Error::Corrupt(format!("Record {} vanished right after insert", id))
                    })?
                }
            };
            parent = found.id;
            record = Some(found);
        }

        Ok(record)
    }

    /// Refresh the denormalized occurrence count of every dictionary word
    pub fn recompute_word_occurrences(&mut self) -> Result<usize> {
        let txn = self.txn()?;
        let updates: Vec<(String, WordId, u64)> = {
            let dictionary = txn.open_table(DICTIONARY_TABLE)?;
            let postings = txn.open_table(POSTINGS_TABLE)?;
            let mut found = Vec::new();
            for item in dictionary.iter()? {
                let (key, value) = item?;
                let (id, stored) = value.value();
                let actual = count_postings(&postings, id)?;
                if actual != stored {
                    found.push((key.value().to_string(), id, actual));
                }
            }
            found
        };

        let mut dictionary = txn.open_table(DICTIONARY_TABLE)?;
        for (word, id, count) in &updates {
            dictionary.insert(word.as_str(), (*id, *count))?;
        }

        Ok(updates.len())
    }

    /// Commit what has been written so far and continue in a fresh transaction.
    ///
    /// The savepoint from [`IndexWriter::begin`] stays valid across checkpoints.
    pub fn checkpoint(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit()?;
            self.commits += 1;
        }
        self.txn = Some(self.db.begin_write()?);
        self.pending_additions = 0;
        debug!(commits = self.commits, "Index checkpoint committed");
        Ok(())
    }

    /// Commit the remaining writes and end the logical transaction
    pub fn commit(mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit()?;
        }
        Ok(())
    }

    /// Undo every write of this logical transaction, including checkpointed ones
    pub fn rollback(mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.abort()?;
        }
        if self.commits == 0 {
            return Ok(());
        }

        let mut txn = self.db.begin_write()?;
        txn.restore_savepoint(&self.savepoint)?;
        txn.commit()?;
        Ok(())
    }
}

/// A consistent read-only view of the index
pub struct IndexReader<'db> {
    txn: ReadTransaction<'db>,
}

impl<'db> IndexReader<'db> {
    pub fn record(&self, id: FileId) -> Result<Option<FileRecord>> {
        let files = self.txn.open_table(FILES_TABLE)?;
        load_record(&files, id)
    }

    /// Load many records at once; ids without a record are left out
    pub fn records(&self, ids: &[FileId]) -> Result<HashMap<FileId, FileRecord>> {
        let files = self.txn.open_table(FILES_TABLE)?;
        let mut found = HashMap::with_capacity(ids.len());
        for &id in ids {
            if let Some(record) = load_record(&files, id)? {
                found.insert(id, record);
            }
        }
        Ok(found)
    }

    /// Direct children of `parent`, ordered by basename
    pub fn children_of(&self, parent: FileId) -> Result<Vec<FileRecord>> {
        let children = self.txn.open_table(CHILDREN_TABLE)?;
        let files = self.txn.open_table(FILES_TABLE)?;
        children_records(&children, &files, parent)
    }

    pub fn record_at(&self, segments: &[String]) -> Result<Option<FileRecord>> {
        let children = self.txn.open_table(CHILDREN_TABLE)?;
        let files = self.txn.open_table(FILES_TABLE)?;
        resolve_path(&children, &files, segments)
    }

    pub fn lookup_word(&self, word: &str) -> Result<Option<WordId>> {
        let dictionary = self.txn.open_table(DICTIONARY_TABLE)?;
        let id = dictionary.get(word)?.map(|guard| guard.value().0);
        Ok(id)
    }

    /// Stored occurrence count of `word`, as of the last recompute
    pub fn word_occurrences(&self, word: &str) -> Result<Option<u64>> {
        let dictionary = self.txn.open_table(DICTIONARY_TABLE)?;
        let occurrences = dictionary.get(word)?.map(|guard| guard.value().1);
        Ok(occurrences)
    }

    /// File ids of every word starting with `prefix`, at most `limit` of them.
    ///
    /// The dictionary is scanned over `[prefix, bumped prefix)` rather than
    /// filtered, so exact and longer words come from one range read. With
    /// `is_dir` set, only records of that kind are returned and count
    /// towards `limit`.
    pub fn prefix_postings(
        &self,
        prefix: &str,
        limit: usize,
        is_dir: Option<bool>,
    ) -> Result<Vec<FileId>> {
        let dictionary = self.txn.open_table(DICTIONARY_TABLE)?;
        let postings = self.txn.open_table(POSTINGS_TABLE)?;
        let files = self.txn.open_table(FILES_TABLE)?;

        let upper = prefix_upper_bound(prefix);
        let words = match upper.as_deref() {
            Some(upper) => dictionary.range(prefix..upper)?,
            None => dictionary.range(prefix..)?,
        };

        let mut found = Vec::new();
        for item in words {
            if found.len() >= limit {
                break;
            }
            let (_, value) = item?;
            let (word, _) = value.value();
            for posting in postings.range((word, i64::MIN)..=(word, i64::MAX))? {
                if found.len() >= limit {
                    break;
                }
                let (key, _) = posting?;
                let id = key.value().1;
                if let Some(wanted) = is_dir {
                    let kind = load_record(&files, id)?.map(|record| record.is_dir);
                    if kind != Some(wanted) {
                        continue;
                    }
                }
                found.push(id);
            }
        }

        Ok(found)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let files = self.txn.open_table(FILES_TABLE)?;
        let dictionary = self.txn.open_table(DICTIONARY_TABLE)?;
        let postings = self.txn.open_table(POSTINGS_TABLE)?;

        let mut stats = IndexStats {
            words: dictionary.len()?,
            postings: postings.len()?,
            ..IndexStats::default()
        };

        for item in files.iter()? {
            let (key, value) = item?;
            let record = FileRecord::from_json(key.value(), value.value())?;
            if record.is_dir {
                stats.directories += 1;
            } else {
                stats.files += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp_dir: &TempDir) -> IndexStore {
        IndexStore::open_path(&temp_dir.path().join("index.redb")).unwrap()
    }

    #[test]
    fn test_store_open_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir);
            let mut writer = store.begin_write(100).unwrap();
            writer.register(ROOT_ID, "Album", "", true).unwrap();
            writer.commit().unwrap();
        }

        let store = open_store(&temp_dir);
        let reader = store.begin_read().unwrap();
        let roots = reader.children_of(ROOT_ID).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "Album");
    }

    #[test]
    fn test_bind_base_dir_once() {
        let temp_dir = TempDir::new().unwrap();
        let music = temp_dir.path().join("music");
        let video = temp_dir.path().join("video");
        {
            let store = open_store(&temp_dir);
            store.bind_base_dir(&music).unwrap();
            store.bind_base_dir(&music).unwrap();
        }

        let store = open_store(&temp_dir);
        store.bind_base_dir(&music).unwrap();
        assert!(matches!(store.bind_base_dir(&video), Err(Error::Config(_))));
    }

    #[test]
    fn test_insert_word_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        let first = writer.insert_word("commonname").unwrap();
        let again = writer.insert_word("commonname").unwrap();
        let other = writer.insert_word("other").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_children_ordered_by_basename() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        let dir = writer.register(ROOT_ID, "Artist", "", true).unwrap();
        writer.register(dir, "b", ".mp3", false).unwrap();
        writer.register(dir, "a", ".mp3", false).unwrap();
        writer.register(dir, "c", "", true).unwrap();

        let names: Vec<String> = writer
            .children_of(dir)
            .unwrap()
            .iter()
            .map(FileRecord::basename)
            .collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3", "c"]);
        assert!(writer.children_of(ROOT_ID).unwrap().iter().all(|r| r.parent == ROOT_ID));
    }

    #[test]
    fn test_remove_postings_and_orphans() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        let unique = writer.register(ROOT_ID, "commonname_uniquename", "", false).unwrap();
        writer.register(ROOT_ID, "commonname_other", "", false).unwrap();

        let touched = writer.remove_postings_for_file(unique).unwrap();
        assert_eq!(touched.len(), 2);

        let deleted = writer.delete_orphaned_words(&touched).unwrap();
        assert_eq!(deleted, 1);
        writer.delete_file(unique).unwrap();
        writer.commit().unwrap();

        let reader = store.begin_read().unwrap();
        assert!(reader.lookup_word("commonname").unwrap().is_some());
        assert!(reader.lookup_word("uniquename").unwrap().is_none());
        assert!(reader.record(unique).unwrap().is_none());
        assert_eq!(reader.children_of(ROOT_ID).unwrap().len(), 1);
    }

    #[test]
    fn test_record_at_creates_on_demand() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        let path = vec!["Artist".to_string(), "Album".to_string()];
        assert!(writer.record_at(&path, false).unwrap().is_none());

        let created = writer.record_at(&path, true).unwrap().unwrap();
        assert_eq!(created.name, "Album");
        assert!(created.is_dir);
        assert_eq!(writer.additions(), 2);

        let again = writer.record_at(&path, true).unwrap().unwrap();
        assert_eq!(created.id, again.id);
        assert_eq!(writer.additions(), 2);
        writer.commit().unwrap();

        let reader = store.begin_read().unwrap();
        assert_eq!(reader.record_at(&path).unwrap().unwrap().id, created.id);
        assert!(reader.lookup_word("artist").unwrap().is_some());
    }

    #[test]
    fn test_prefix_postings_range() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        let exact = writer.register(ROOT_ID, "abc", ".mp3", false).unwrap();
        let longer = writer.register(ROOT_ID, "abcdef", ".mp3", false).unwrap();
        writer.register(ROOT_ID, "abd", ".mp3", false).unwrap();
        writer.commit().unwrap();

        let reader = store.begin_read().unwrap();
        let mut found = reader.prefix_postings("abc", 10, None).unwrap();
        found.sort();
        assert_eq!(found, vec![exact, longer]);

        assert_eq!(reader.prefix_postings("abc", 1, None).unwrap().len(), 1);
        assert!(reader.prefix_postings("zzz", 10, None).unwrap().is_empty());
    }

    #[test]
    fn test_prefix_postings_by_kind() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        for n in 1..=5 {
            writer.register(ROOT_ID, &format!("live {n}"), ".mp3", false).unwrap();
        }
        let parent = writer.register(ROOT_ID, "zz", "", true).unwrap();
        let dir = writer.register(parent, "live", "", true).unwrap();
        writer.commit().unwrap();

        let reader = store.begin_read().unwrap();
        // Files fill the unfiltered limit before the directory is reached
        assert!(!reader.prefix_postings("live", 3, None).unwrap().contains(&dir));
        assert_eq!(reader.prefix_postings("live", 3, Some(true)).unwrap(), vec![dir]);

        let files = reader.prefix_postings("live", 10, Some(false)).unwrap();
        assert_eq!(files.len(), 5);
        assert!(!files.contains(&dir));
    }

    #[test]
    fn test_recompute_word_occurrences() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        writer.register(ROOT_ID, "live one", "", false).unwrap();
        writer.register(ROOT_ID, "live two", "", false).unwrap();
        assert_eq!(writer.recompute_word_occurrences().unwrap(), 3);
        writer.commit().unwrap();

        let reader = store.begin_read().unwrap();
        assert_eq!(reader.word_occurrences("live").unwrap(), Some(2));
        assert_eq!(reader.word_occurrences("one").unwrap(), Some(1));
    }

    #[test]
    fn test_rollback_undoes_checkpoints() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        let mut writer = store.begin_write(100).unwrap();
        writer.register(ROOT_ID, "kept", "", true).unwrap();
        writer.commit().unwrap();

        let mut writer = store.begin_write(1).unwrap();
        writer.register(ROOT_ID, "first", "", true).unwrap();
        writer.register(ROOT_ID, "second", "", true).unwrap();
        assert_eq!(writer.commits(), 2);

        // Checkpointed writes are visible to readers until the rollback
        assert_eq!(store.begin_read().unwrap().children_of(ROOT_ID).unwrap().len(), 3);

        writer.rollback().unwrap();

        let reader = store.begin_read().unwrap();
        let names: Vec<String> = reader
            .children_of(ROOT_ID)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["kept"]);
        assert!(reader.lookup_word("first").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut writer = store.begin_write(100).unwrap();

        let dir = writer.register(ROOT_ID, "Jazz", "", true).unwrap();
        writer.register(dir, "So What", ".flac", false).unwrap();
        writer.commit().unwrap();

        let stats = store.begin_read().unwrap().stats().unwrap();
        assert_eq!(
            stats,
            IndexStats {
                files: 1,
                directories: 1,
                words: 3,
                postings: 3,
            }
        );
    }
}
