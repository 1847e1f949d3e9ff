// Core functionality
pub mod core {
    pub mod config;
    pub mod error;
}

// Data storage
pub mod storage {
    pub mod index;
    pub mod records;
}

// Filesystem walk and synchronization
pub mod indexing {
    pub mod node;
    pub mod progress;
    pub mod sync;
    pub mod tokenize;
    pub mod walk;
}

// Query parsing and ranking
pub mod search {
    pub mod engine;
    pub mod query;
    pub mod ranking;
}

pub mod library;

// User interfaces
pub mod ui {
    pub mod cli;
}

// Re-export commonly used types
pub use core::config::{Config, SearchLimits, SyncSettings};
pub use core::error::{Error, Result};
pub use indexing::progress::{LogSink, ProgressSink, ProgressSnapshot};
pub use indexing::sync::{SyncStats, Synchronizer};
pub use library::Library;
pub use search::engine::{SearchEngine, SearchEntry};
pub use search::query::SearchMode;
pub use storage::index::{FileRecord, IndexStats, IndexStore};
pub use ui::cli::Cli;
