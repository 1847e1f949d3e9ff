use crate::indexing::tokenize::tokenize;

const FILES_FLAG: &str = "!f";
const DIRS_FLAG: &str = "!d";

/// Which kinds of entries a query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Any,
    FilesOnly,
    DirsOnly,
}

impl SearchMode {
    fn from_flag(token: &str) -> Option<Self> {
        match token {
            FILES_FLAG => Some(Self::FilesOnly),
            DIRS_FLAG => Some(Self::DirsOnly),
            _ => None,
        }
    }

    pub fn accepts(self, is_dir: bool) -> bool {
        match self {
            Self::Any => true,
            Self::FilesOnly => !is_dir,
            Self::DirsOnly => is_dir,
        }
    }

    /// The only kind this mode accepts, if it restricts one
    pub fn kind(self) -> Option<bool> {
        match self {
            Self::Any => None,
            Self::FilesOnly => Some(false),
            Self::DirsOnly => Some(true),
        }
    }
}

/// A query with its mode flags stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Remaining query text, whitespace-normalized, as typed
    pub text: String,
    pub mode: SearchMode,
    /// Lowercase words used for the dictionary lookup
    pub words: Vec<String>,
}

/// Strip a leading or trailing `!f`/`!d` flag and tokenize the rest.
///
/// Returns `None` for queries with nothing left to search for, and for
/// queries asking for files and directories only at the same time.
pub fn parse_query(raw: &str) -> Option<ParsedQuery> {
    let mut tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut mode = SearchMode::Any;

    if let Some(flag) = tokens.first().and_then(|t| SearchMode::from_flag(t)) {
        mode = flag;
        tokens.remove(0);
    }
    if let Some(flag) = tokens.last().and_then(|t| SearchMode::from_flag(t)) {
        if mode != SearchMode::Any && mode != flag {
            return None;
        }
        mode = flag;
        tokens.pop();
    }

    let text = tokens.join(" ");
    let words = tokenize(&text);
    if words.is_empty() {
        return None;
    }

    Some(ParsedQuery { text, mode, words })
}
