use crate::core::error::{Error, Result};
use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

/// Persisted id of a file or directory record
pub type FileId = i64;
/// Persisted id of a dictionary word
pub type WordId = u64;

/// Parent id of root-level entries. The base directory itself is never stored.
pub const ROOT_ID: FileId = -1;

/// File records, JSON serialized. Key: record id
pub(crate) const FILES_TABLE: TableDefinition<i64, &str> = TableDefinition::new("files");
/// Parent index. Key: (parent id, basename), value: child id
pub(crate) const CHILDREN_TABLE: TableDefinition<(i64, &str), i64> =
    TableDefinition::new("children");
/// Word dictionary. Key: word, value: (word id, occurrences)
pub(crate) const DICTIONARY_TABLE: TableDefinition<&str, (u64, u64)> =
    TableDefinition::new("dictionary");
/// Reverse dictionary. Key: word id, value: word
pub(crate) const WORDS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("words");
/// Posting list. Key: (word id, file id)
pub(crate) const POSTINGS_TABLE: TableDefinition<(u64, i64), ()> = TableDefinition::new("search");
/// Reverse postings. Key: (file id, word id)
pub(crate) const FILE_WORDS_TABLE: TableDefinition<(i64, u64), ()> =
    TableDefinition::new("file_words");
/// Auto-increment sequences
pub(crate) const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");
/// Index-wide settings, such as the directory the index mirrors
pub(crate) const SETTINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("settings");

pub(crate) const FILE_SEQUENCE_KEY: &str = "files_seq";
pub(crate) const WORD_SEQUENCE_KEY: &str = "words_seq";
pub(crate) const BASE_DIR_KEY: &str = "base_dir";

/// A persisted file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Record id (the table key, not part of the stored value)
    #[serde(skip)]
    pub id: FileId,
    /// Parent record id, [`ROOT_ID`] for root-level entries
    pub parent: FileId,
    /// Basename without extension (full basename for directories)
    pub name: String,
    /// Extension including the leading dot, empty for directories
    pub extension: String,
    pub is_dir: bool,
}

impl FileRecord {
    pub fn basename(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    /// Serialize to JSON string
    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Corrupt(format!("Failed to serialize file record: {}", e)))
    }

    /// Deserialize from JSON string
    pub(crate) fn from_json(id: FileId, json: &str) -> Result<Self> {
        let mut record: FileRecord = serde_json::from_str(json).map_err(|e| {
            Error::Corrupt(format!("Failed to deserialize file record {}: {}", id, e))
        })?;
        record.id = id;
        Ok(record)
    }
}

/// Counts of what the index currently holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files: u64,
    pub directories: u64,
    pub words: u64,
    pub postings: u64,
}

// Read helpers shared by read-only and write transactions.

pub(crate) fn load_record<T>(files: &T, id: FileId) -> Result<Option<FileRecord>>
where
    T: ReadableTable<i64, &'static str>,
{
    match files.get(id)? {
        Some(guard) => {
            let json = guard.value().to_string();
            FileRecord::from_json(id, &json).map(Some)
        }
        None => Ok(None),
    }
}

/// Child (basename, id) pairs of `parent`, ordered by basename
pub(crate) fn child_ids<T>(children: &T, parent: FileId) -> Result<Vec<(String, FileId)>>
where
    T: ReadableTable<(i64, &'static str), i64>,
{
    let mut found = Vec::new();
    for item in children.range((parent, "")..(parent + 1, ""))? {
        let (key, value) = item?;
        let (_, name) = key.value();
        found.push((name.to_string(), value.value()));
    }
    Ok(found)
}

pub(crate) fn child_id<T>(children: &T, parent: FileId, basename: &str) -> Result<Option<FileId>>
where
    T: ReadableTable<(i64, &'static str), i64>,
{
    Ok(children.get((parent, basename))?.map(|guard| guard.value()))
}

pub(crate) fn children_records<C, F>(
    children: &C,
    files: &F,
    parent: FileId,
) -> Result<Vec<FileRecord>>
where
    C: ReadableTable<(i64, &'static str), i64>,
    F: ReadableTable<i64, &'static str>,
{
    let mut records = Vec::new();
    for (name, id) in child_ids(children, parent)? {
        let record = load_record(files, id)?.ok_or_else(|| {
            Error::Corrupt(format!(
                "Child '{}' of {} points to missing record {}",
                name, parent, id
            ))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Resolve a relative path one segment at a time through the parent index
pub(crate) fn resolve_path<C, F>(
    children: &C,
    files: &F,
    segments: &[String],
) -> Result<Option<FileRecord>>
where
    C: ReadableTable<(i64, &'static str), i64>,
    F: ReadableTable<i64, &'static str>,
{
    let mut parent = ROOT_ID;
    let mut record = None;

    for segment in segments {
        match child_id(children, parent, segment)? {
            Some(id) => {
                let found = load_record(files, id)?.ok_or_else(|| {
                    Error::Corrupt(format!(
                        "Path segment '{}' points to missing record {}",
                        segment, id
                    ))
                })?;
                parent = found.id;
                record = Some(found);
            }
            None => return Ok(None),
        }
    }

    Ok(record)
}

/// Whether any posting still references `word`
pub(crate) fn has_postings<T>(postings: &T, word: WordId) -> Result<bool>
where
    T: ReadableTable<(u64, i64), ()>,
{
    Ok(postings.range((word, i64::MIN)..=(word, i64::MAX))?.next().is_some())
}

pub(crate) fn count_postings<T>(postings: &T, word: WordId) -> Result<u64>
where
    T: ReadableTable<(u64, i64), ()>,
{
    let mut count = 0;
    for item in postings.range((word, i64::MIN)..=(word, i64::MAX))? {
        item?;
        count += 1;
    }
    Ok(count)
}
