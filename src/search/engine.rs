use crate::core::config::SearchLimits;
use crate::core::error::Result;
use crate::search::query::{parse_query, ParsedQuery};
use crate::search::ranking::rank;
use crate::storage::index::{FileId, FileRecord, IndexReader, IndexStore, ROOT_ID};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    /// Path relative to the base directory, `/`-separated
    pub path: String,
    pub is_dir: bool,
}

impl SearchEntry {
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Read-only query side of the index
pub struct SearchEngine<'a> {
    store: &'a IndexStore,
    limits: SearchLimits,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a IndexStore, limits: &SearchLimits) -> Self {
        Self {
            store,
            limits: limits.clone(),
        }
    }

    /// Find entries whose name words start with the query words, best first.
    ///
    /// Empty queries and conflicting mode flags give no results.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchEntry>> {
        let Some(parsed) = parse_query(query) else {
            debug!(query, "Nothing to search for");
            return Ok(Vec::new());
        };
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let reader = self.store.begin_read()?;
        let candidates = self.candidates(&reader, &parsed)?;

        let records = reader.records(&candidates)?;
        let matching: Vec<FileRecord> = candidates
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|record| parsed.mode.accepts(record.is_dir))
            .cloned()
            .collect();

        let entries = resolve_paths(&reader, matching)?;
        let mut ranked = rank(&parsed.text, entries);
        ranked.truncate(max_results);

        debug!(query, results = ranked.len(), "Search complete");
        Ok(ranked)
    }

    /// Ids matching any query word, most frequent first once over the cap
    fn candidates(&self, reader: &IndexReader<'_>, query: &ParsedQuery) -> Result<Vec<FileId>> {
        let mut found: Vec<FileId> = Vec::new();
        for word in &query.words {
            let cap = if found.len() > self.limits.term_cap {
                self.limits.narrow_term_cap
            } else {
                self.limits.term_cap
            };
            found.extend(reader.prefix_postings(word, cap, query.mode.kind())?);
        }

        let mut frequency: HashMap<FileId, usize> = HashMap::new();
        let mut unique: Vec<FileId> = Vec::new();
        for id in found {
            let count = frequency.entry(id).or_insert(0);
            if *count == 0 {
                unique.push(id);
            }
            *count += 1;
        }

        if unique.len() > self.limits.term_cap {
            debug!(
                candidates = unique.len(),
                cap = self.limits.term_cap,
                "Truncating candidates by word frequency"
            );
            unique.sort_by_key(|id| std::cmp::Reverse(frequency[id]));
            unique.truncate(self.limits.term_cap);
        }

        Ok(unique)
    }
}

/// Rebuild the relative paths of `records`.
///
/// Ancestors are loaded one level at a time, with one batched lookup per
/// level instead of one per entry.
fn resolve_paths(reader: &IndexReader<'_>, records: Vec<FileRecord>) -> Result<Vec<SearchEntry>> {
    let mut known: HashMap<FileId, FileRecord> = HashMap::new();
    let mut pending: Vec<FileId> = unresolved_parents(records.iter(), &known);

    while !pending.is_empty() {
        let level = reader.records(&pending)?;
        if level.len() < pending.len() {
            warn!(missing = pending.len() - level.len(), "Parent records missing from index");
        }
        let next = unresolved_parents(level.values(), &known);
        known.extend(level);
        pending = next.into_iter().filter(|id| !known.contains_key(id)).collect();
    }

    let mut entries = Vec::with_capacity(records.len());
    'records: for record in records {
        let mut segments = vec![record.basename()];
        let mut parent = record.parent;
        while parent != ROOT_ID {
            let Some(ancestor) = known.get(&parent) else {
                continue 'records;
            };
            segments.push(ancestor.basename());
            parent = ancestor.parent;
        }
        segments.reverse();
        entries.push(SearchEntry {
            path: segments.join("/"),
            is_dir: record.is_dir,
        });
    }

    Ok(entries)
}

fn unresolved_parents<'r>(
    records: impl Iterator<Item = &'r FileRecord>,
    known: &HashMap<FileId, FileRecord>,
) -> Vec<FileId> {
    let mut seen = HashSet::new();
    records
        .map(|record| record.parent)
        .filter(|&parent| parent != ROOT_ID && !known.contains_key(&parent))
        .filter(|&parent| seen.insert(parent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(names: &[(&str, &str, bool)]) -> (TempDir, IndexStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open_path(&temp_dir.path().join("index.redb")).unwrap();
        let mut writer = store.begin_write(100).unwrap();
        for (name, extension, is_dir) in names {
            writer.register(ROOT_ID, name, extension, *is_dir).unwrap();
        }
        writer.commit().unwrap();
        (temp_dir, store)
    }

    fn paths(entries: &[SearchEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_search_recall() {
        let (_temp_dir, store) = store_with(&[
            ("SUCHMICH", "", false),
            ("findmich suchmich", "", false),
            ("suchMICH blablub", "", false),
            ("wurst-mit-Suchmich", ".doch-schinken", false),
            ("unrelated", ".mp3", false),
        ]);
        let engine = SearchEngine::new(&store, &SearchLimits::default());

        let results = engine.search("SUCHMICH", 100).unwrap();
        assert_eq!(results.len(), 4);
        assert!(paths(&results).contains(&"wurst-mit-Suchmich.doch-schinken"));
        assert_eq!(results[0].path, "SUCHMICH");
    }

    #[test]
    fn test_search_resolves_nested_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open_path(&temp_dir.path().join("index.redb")).unwrap();
        let mut writer = store.begin_write(100).unwrap();
        let artist = writer.register(ROOT_ID, "Coltrane", "", true).unwrap();
        let album = writer.register(artist, "Blue Train", "", true).unwrap();
        writer.register(album, "01 Blue Train", ".flac", false).unwrap();
        writer.commit().unwrap();

        let engine = SearchEngine::new(&store, &SearchLimits::default());
        let results = engine.search("blue train !f", 10).unwrap();
        assert_eq!(paths(&results), vec!["Coltrane/Blue Train/01 Blue Train.flac"]);
        assert_eq!(results[0].basename(), "01 Blue Train.flac");

        let dirs = engine.search("!d blue", 10).unwrap();
        assert_eq!(
            dirs,
            vec![SearchEntry {
                path: "Coltrane/Blue Train".to_string(),
                is_dir: true,
            }]
        );
    }

    #[test]
    fn test_search_ranks_and_limits() {
        let (_temp_dir, store) = store_with(&[
            ("abcdef", ".mp3", false),
            ("abc", ".mp3", false),
            ("abcabc", ".mp3", false),
        ]);
        let engine = SearchEngine::new(&store, &SearchLimits::default());

        let results = engine.search("abc", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "abc.mp3");
    }

    #[test]
    fn test_degenerate_queries_are_empty() {
        let (_temp_dir, store) = store_with(&[("song", ".mp3", false)]);
        let engine = SearchEngine::new(&store, &SearchLimits::default());

        assert!(engine.search("", 10).unwrap().is_empty());
        assert!(engine.search("   ", 10).unwrap().is_empty());
        assert!(engine.search("!f song !d", 10).unwrap().is_empty());
        assert!(engine.search("song", 0).unwrap().is_empty());
        assert!(engine.search("nomatch", 10).unwrap().is_empty());
    }

    #[test]
    fn test_candidate_cap_prefers_frequent_ids() {
        let (_temp_dir, store) = store_with(&[
            ("red", "", false),
            ("red blue", "", false),
            ("blue", "", false),
        ]);
        let limits = SearchLimits {
            term_cap: 2,
            narrow_term_cap: 2,
        };
        let engine = SearchEngine::new(&store, &limits);

        // "red blue" matches both words, "blue" loses the tie with "red"
        let results = engine.search("red blue", 10).unwrap();
        assert_eq!(paths(&results), vec!["red blue", "red"]);
    }

    #[test]
    fn test_mode_applies_before_term_cap() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open_path(&temp_dir.path().join("index.redb")).unwrap();
        let mut writer = store.begin_write(100).unwrap();
        for n in 1..=5 {
            writer.register(ROOT_ID, &format!("live {n}"), ".mp3", false).unwrap();
        }
        let parent = writer.register(ROOT_ID, "zz", "", true).unwrap();
        writer.register(parent, "live", "", true).unwrap();
        writer.commit().unwrap();

        let limits = SearchLimits {
            term_cap: 3,
            narrow_term_cap: 2,
        };
        let engine = SearchEngine::new(&store, &limits);

        assert_eq!(paths(&engine.search("!d live", 10).unwrap()), vec!["zz/live"]);
        assert_eq!(engine.search("live !f", 10).unwrap().len(), 3);
        assert_eq!(engine.search("live", 10).unwrap().len(), 3);
    }
}
