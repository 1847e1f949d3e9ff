//! Relevance scoring for search results.
//!
//! Scores are plain integers compared in descending order. Ties keep the
//! order in which entries reached the ranker.

use crate::indexing::node::split_name;
use crate::search::engine::SearchEntry;
use std::cmp::Reverse;

const PATH_HIT: i64 = 3;
const BASENAME_HIT: i64 = 10;
const MISS: i64 = -10;
const EXACT_MATCH: i64 = 100;
const STEM_MATCH: i64 = 20;
const STEM_MATCH_DIR: i64 = 5;
const PREFIX_MATCH: i64 = 10;

/// Trailing articles of sorted names, as in "Beatles, The"
const ARTICLE_SUFFIXES: [&str; 2] = [", the", ", die"];

/// Score one entry against the query text
pub fn score(query_text: &str, entry: &SearchEntry) -> i64 {
    let query = query_text.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    let basename = entry.basename().to_lowercase();
    let path = entry.path.to_lowercase();

    let mut score = 0;
    for word in &words {
        score += if path.contains(word) { PATH_HIT } else { MISS };
        score += if basename.contains(word) { BASENAME_HIT } else { MISS };
    }

    let without_article = ARTICLE_SUFFIXES
        .iter()
        .find_map(|suffix| basename.strip_suffix(suffix))
        .unwrap_or(&basename);
    if basename == query || without_article == query {
        return score + EXACT_MATCH;
    }

    let stem = if entry.is_dir {
        basename.as_str()
    } else {
        split_name(&basename).0
    };
    if words.contains(&stem) {
        let dir_bonus = if entry.is_dir { STEM_MATCH_DIR } else { 0 };
        return score + STEM_MATCH + dir_bonus;
    }

    for word in &words {
        if stem.starts_with(word) {
            score += PREFIX_MATCH;
        }
    }

    // Track numbers: "01 Intro" should match "intro"
    let untracked = stem
        .trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim();
    if words.contains(&untracked) {
        return score + PREFIX_MATCH;
    }

    score
}

/// Sort entries by descending score, keeping input order among equals
pub fn rank(query_text: &str, mut entries: Vec<SearchEntry>) -> Vec<SearchEntry> {
    entries.sort_by_cached_key(|entry| Reverse(score(query_text, entry)));
    entries
}
