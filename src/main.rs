use anyhow::Context;
use clap::Parser;
use mediadex::ui::cli::{Cli, Commands};
use mediadex::{Config, Library, LogSink};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mediadex=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.command.media_dir().clone(), cli.data_dir.clone())?;
    let library = Library::initialize(config).context("Failed to open media library")?;

    match &cli.command {
        Commands::Update { paths, .. } => handle_update(&library, paths),
        Commands::Search { query, limit, .. } => handle_search(&library, query, *limit),
        Commands::Ls { path, .. } => {
            handle_ls(&library, path.as_deref().unwrap_or(Path::new("")))
        }
        Commands::Stats { .. } => handle_stats(&library),
    }
}

fn handle_update(library: &Library, paths: &[PathBuf]) -> anyhow::Result<()> {
    println!("Updating index for: {}", library.base_dir().display());

    let stats = if paths.is_empty() {
        library.full_update(&mut LogSink)?
    } else {
        library.partial_update(paths, &mut LogSink)?
    };

    println!("\nUpdate complete!");
    println!("  Added: {}", stats.added);
    println!("  Removed: {}", stats.removed);
    println!("  Unchanged: {}", stats.unchanged);
    if stats.skipped > 0 {
        println!("  Skipped: {} (see warnings above)", stats.skipped);
    }

    Ok(())
}

fn handle_search(library: &Library, query: &str, limit: usize) -> anyhow::Result<()> {
    let results = library.search(query, limit)?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, entry) in results.iter().enumerate() {
        let marker = if entry.is_dir { "/" } else { "" };
        println!("{:>3}. {}{}", i + 1, entry.path, marker);
    }

    Ok(())
}

fn handle_ls(library: &Library, path: &Path) -> anyhow::Result<()> {
    for name in library.listdir(path)? {
        println!("{}", name);
    }
    Ok(())
}

fn handle_stats(library: &Library) -> anyhow::Result<()> {
    let stats = library.stats()?;
    println!("Index: {}", library.config().index_path.display());
    println!("  Files: {}", stats.files);
    println!("  Directories: {}", stats.directories);
    println!("  Words: {}", stats.words);
    println!("  Postings: {}", stats.postings);
    Ok(())
}
