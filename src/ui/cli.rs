use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mediadex - Filename index and search for local media libraries
#[derive(Parser, Debug)]
#[command(name = "mediadex")]
#[command(about = "Index a media library by file name and search it", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom data directory (default: ~/.mediadex). Holds the index of one media directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize the index with the media directory
    Update {
        /// Absolute path to the media directory
        media_dir: PathBuf,
        /// Only synchronize these paths (relative to the media directory or absolute)
        paths: Vec<PathBuf>,
    },
    /// Search indexed file and directory names
    Search {
        /// Absolute path to the media directory
        media_dir: PathBuf,
        /// Search query, optionally starting or ending with !f (files) or !d (directories)
        query: String,
        /// Maximum number of results to return
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// List the indexed children of a directory
    Ls {
        /// Absolute path to the media directory
        media_dir: PathBuf,
        /// Directory to list (default: the media directory itself)
        path: Option<PathBuf>,
    },
    /// Show index statistics
    Stats {
        /// Absolute path to the media directory
        media_dir: PathBuf,
    },
}

impl Commands {
    pub fn media_dir(&self) -> &PathBuf {
        match self {
            Commands::Update { media_dir, .. }
            | Commands::Search { media_dir, .. }
            | Commands::Ls { media_dir, .. }
            | Commands::Stats { media_dir } => media_dir,
        }
    }
}
