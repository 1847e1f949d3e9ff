use regex::Regex;
use std::sync::OnceLock;

/// Runs of Unicode letters and digits. Underscores and punctuation separate words.
fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\W_]+").expect("word pattern is valid"))
}

/// Split a name into lowercase words, each unique word once, in order of first appearance.
///
/// Indexing and querying both go through this function so that the words a file
/// is stored under are exactly the words a query can ask for.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut words: Vec<String> = Vec::new();

    for found in word_pattern().find_iter(&lowered) {
        let word = found.as_str();
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }

    words
}

/// Exclusive upper bound for a prefix range scan over sorted words.
///
/// The last character is bumped by one code point, so `[prefix, bound)` covers
/// `prefix` itself and every word that starts with it. Returns `None` when no
/// such bound exists and the scan must stay open-ended.
pub fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();

    while let Some(last) = chars.pop() {
        let mut next = last as u32 + 1;
        // Skip the surrogate gap
        if (0xD800..=0xDFFF).contains(&next) {
            next = 0xE000;
        }
        if let Some(bumped) = char::from_u32(next) {
            chars.push(bumped);
            return Some(chars.into_iter().collect());
        }
    }

    None
}
