use mediadex::search::ranking::{rank, score};
use mediadex::{Config, Library, Result, SearchEntry};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn library_with(files: &[&str]) -> Result<(TempDir, PathBuf, Library)> {
    let temp_dir = TempDir::new().unwrap();
    let media = temp_dir.path().join("media");
    fs::create_dir_all(&media)?;
    for file in files {
        let path = media.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "x")?;
    }

    let config = Config::new(media, Some(temp_dir.path().join("data")))?;
    let library = Library::initialize(config)?;
    library.full_update(&mut ())?;
    let media = library.base_dir().to_path_buf();
    Ok((temp_dir, media, library))
}

#[test]
fn test_every_spelling_is_found() -> Result<()> {
    let (_temp_dir, _media, library) = library_with(&[
        "SUCHMICH",
        "findmich suchmich",
        "suchMICH blablub",
        "wurst-mit-Suchmich.doch-schinken",
        "nothing to see.txt",
    ])?;

    let results = library.search("SUCHMICH", 100)?;
    let mut paths: Vec<&str> = results.iter().map(|e| e.path.as_str()).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "SUCHMICH",
            "findmich suchmich",
            "suchMICH blablub",
            "wurst-mit-Suchmich.doch-schinken",
        ]
    );

    Ok(())
}

#[test]
fn test_exact_name_beats_prefix() -> Result<()> {
    let (_temp_dir, _media, library) = library_with(&["abcdef.mp3", "abc.mp3"])?;

    let results = library.search("abc", 10)?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path, "abc.mp3");
    assert_eq!(results[1].path, "abcdef.mp3");

    Ok(())
}

#[test]
fn test_prefix_query_finds_longer_words() -> Result<()> {
    let (_temp_dir, _media, library) =
        library_with(&["Symphony No 9.flac", "Sympathy.mp3", "Other.mp3"])?;

    let results = library.search("symp", 10)?;
    assert_eq!(results.len(), 2);

    Ok(())
}

#[test]
fn test_mode_flags_split_files_and_dirs() -> Result<()> {
    let (_temp_dir, _media, library) = library_with(&["Live/Live at Leeds.mp3", "Live Aid.mkv"])?;

    let dirs = library.search("!d live", 10)?;
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].is_dir);
    assert_eq!(dirs[0].path, "Live");

    let files = library.search("live !f", 10)?;
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|e| !e.is_dir));

    assert!(library.search("!d live !f", 10)?.is_empty());

    Ok(())
}

#[test]
fn test_unicode_names() -> Result<()> {
    let (_temp_dir, _media, library) =
        library_with(&["Björk/Jóga.flac", "Ärzte, Die/Schrei nach Liebe.mp3"])?;

    assert_eq!(library.search("jóga", 10)?[0].path, "Björk/Jóga.flac");
    assert_eq!(library.search("ärzte", 10)?[0].path, "Ärzte, Die");
    assert_eq!(library.search("BJÖRK !d", 10)?[0].path, "Björk");

    Ok(())
}

#[test]
fn test_results_respect_max() -> Result<()> {
    let names: Vec<String> = (0..30).map(|i| format!("take {i}.wav")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (_temp_dir, _media, library) = library_with(&refs)?;

    assert_eq!(library.search("take", 100)?.len(), 30);
    assert_eq!(library.search("take", 7)?.len(), 7);

    Ok(())
}

#[test]
fn test_ranking_function_is_deterministic() {
    let entries = vec![
        SearchEntry {
            path: "abcdef.mp3".to_string(),
            is_dir: false,
        },
        SearchEntry {
            path: "abc.mp3".to_string(),
            is_dir: false,
        },
    ];

    assert!(score("abc", &entries[1]) > score("abc", &entries[0]));
    let first = rank("abc", entries.clone());
    let second = rank("abc", entries);
    assert_eq!(first, second);
    assert_eq!(first[0].path, "abc.mp3");
}

#[test]
fn test_mode_flag_with_small_term_cap() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let media = temp_dir.path().join("media");
    fs::create_dir_all(media.join("zz").join("live"))?;
    for n in 1..=5 {
        fs::write(media.join(format!("live {n}.mp3")), "x")?;
    }

    let config = Config::new(media, Some(temp_dir.path().join("data")))?.with_search_limits(3, 2);
    let library = Library::initialize(config)?;
    library.full_update(&mut ())?;

    let dirs = library.search("!d live", 10)?;
    assert_eq!(dirs.len(), 1);
    assert_eq!(dirs[0].path, "zz/live");
    assert!(dirs[0].is_dir);

    assert_eq!(library.search("live !f", 10)?.len(), 3);

    Ok(())
}
