use super::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of additions between incremental commits
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default per-term candidate cap for search
pub const DEFAULT_TERM_CAP: usize = 400;
/// Cap used once a query has already accumulated more than `term_cap` ids
pub const DEFAULT_NARROW_TERM_CAP: usize = 20;

/// Tunables for synchronization runs
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Commit the running transaction after this many additions
    pub batch_size: usize,
    /// Minimum delay between two progress reports
    pub progress_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: Duration::from_secs(2),
        }
    }
}

/// Candidate limits for search queries
#[derive(Debug, Clone)]
pub struct SearchLimits {
    pub term_cap: usize,
    pub narrow_term_cap: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            term_cap: DEFAULT_TERM_CAP,
            narrow_term_cap: DEFAULT_NARROW_TERM_CAP,
        }
    }
}

/// Configuration for mediadex
#[derive(Debug, Clone)]
pub struct Config {
    /// The media library being indexed
    pub media_dir: PathBuf,
    /// Directory for mediadex data
    pub data_dir: PathBuf,
    /// Path to the index database
    pub index_path: PathBuf,
    pub sync: SyncSettings,
    pub search: SearchLimits,
}

impl Config {
    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".mediadex"))
    }

    /// Create a new configuration
    pub fn new(media_dir: impl Into<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(|| {
            Self::default_data_dir().unwrap_or_else(|_| PathBuf::from(".mediadex"))
        });

        Ok(Self {
            media_dir: media_dir.into(),
            index_path: data_dir.join("index.redb"),
            data_dir,
            sync: SyncSettings::default(),
            search: SearchLimits::default(),
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.sync.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.sync.progress_interval = interval;
        self
    }

    pub fn with_search_limits(mut self, term_cap: usize, narrow_term_cap: usize) -> Self {
        self.search = SearchLimits {
            term_cap,
            narrow_term_cap,
        };
        self
    }

    /// Initialize the data directory
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Check if the data directory already exists
    pub fn is_initialized(&self) -> bool {
        self.data_dir.exists()
    }

    /// Validate the media directory and return its canonical form.
    ///
    /// The path must be absolute, exist, and be a directory.
    pub fn resolve_media_dir(&self) -> Result<PathBuf> {
        validate_base_dir(&self.media_dir)
    }
}

pub(crate) fn validate_base_dir(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(Error::Config(format!(
            "Media directory must be an absolute path: {}",
            path.display()
        )));
    }

    if !path.exists() {
        return Err(Error::Config(format!(
            "Media directory does not exist: {}",
            path.display()
        )));
    }

    if !path.is_dir() {
        return Err(Error::Config(format!(
            "Media directory is not a directory: {}",
            path.display()
        )));
    }

    Ok(std::fs::canonicalize(path)?)
}
