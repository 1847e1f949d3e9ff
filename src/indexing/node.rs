use crate::storage::index::{FileId, ROOT_ID};
use std::path::{Path, PathBuf};

/// Index of a node inside a [`NodeArena`]
pub type NodeId = usize;

/// One filesystem entry seen during a tree walk.
///
/// Never persisted. The parent link is an arena index, used only to build paths.
#[derive(Debug, Clone)]
pub struct FsNode {
    /// Basename without extension for files, full basename for directories
    pub name: String,
    /// Extension including the leading dot, empty for directories
    pub extension: String,
    pub is_dir: bool,
    pub parent: Option<NodeId>,
    /// Record id once the node is known to the index
    pub id: Option<FileId>,
}

impl FsNode {
    pub fn basename(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}

/// Owns every [`FsNode`] created by one traversal.
///
/// Slot 0 is always the root: the base directory itself, with the sentinel id.
#[derive(Debug)]
pub struct NodeArena {
    root_path: PathBuf,
    nodes: Vec<FsNode>,
}

impl NodeArena {
    pub const ROOT: NodeId = 0;

    pub fn new(root_path: &Path) -> Self {
        let root = FsNode {
            name: String::new(),
            extension: String::new(),
            is_dir: true,
            parent: None,
            id: Some(ROOT_ID),
        };

        Self {
            root_path: root_path.to_path_buf(),
            nodes: vec![root],
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Add a child of `parent` named `basename`
    pub fn add(&mut self, parent: NodeId, basename: &str, is_dir: bool) -> NodeId {
        let (name, extension) = if is_dir {
            (basename.to_string(), String::new())
        } else {
            let (name, ext) = split_name(basename);
            (name.to_string(), ext.to_string())
        };

        self.nodes.push(FsNode {
            name,
            extension,
            is_dir,
            parent: Some(parent),
            id: None,
        });
        self.nodes.len() - 1
    }

    pub fn get(&self, node: NodeId) -> &FsNode {
        &self.nodes[node]
    }

    pub fn set_id(&mut self, node: NodeId, id: FileId) {
        self.nodes[node].id = Some(id);
    }

    pub fn id(&self, node: NodeId) -> Option<FileId> {
        self.nodes[node].id
    }

    /// Absolute filesystem path of a node
    pub fn path(&self, node: NodeId) -> PathBuf {
        let mut path = self.root_path.clone();
        path.push(self.relative_path(node));
        path
    }

    /// Path of a node relative to the root
    pub fn relative_path(&self, node: NodeId) -> PathBuf {
        let mut segments = Vec::new();
        let mut current = Some(node);

        while let Some(index) = current {
            let entry = &self.nodes[index];
            if entry.parent.is_some() {
                segments.push(entry.basename());
            }
            current = entry.parent;
        }

        segments.iter().rev().collect()
    }

    /// Whether `node` is a direct child of the root
    pub fn is_top_level(&self, node: NodeId) -> bool {
        self.nodes[node].parent == Some(Self::ROOT)
    }
}

/// Split a file basename into name and extension.
///
/// Leading dots belong to the name, so `.bashrc` has no extension.
pub fn split_name(basename: &str) -> (&str, &str) {
    let leading_dots = basename.len() - basename.trim_start_matches('.').len();

    match basename.rfind('.') {
        Some(dot) if dot > leading_dots => basename.split_at(dot),
        _ => (basename, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("song.mp3"), ("song", ".mp3"));
        assert_eq!(split_name("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
        assert_eq!(split_name("..hidden.ogg"), ("..hidden", ".ogg"));
        assert_eq!(split_name("noext"), ("noext", ""));
        assert_eq!(split_name("trailing."), ("trailing", "."));
        assert_eq!(
            split_name("wurst-mit-Suchmich.doch-schinken"),
            ("wurst-mit-Suchmich", ".doch-schinken")
        );
    }

    #[test]
    fn test_directories_keep_full_name() {
        let mut arena = NodeArena::new(Path::new("/music"));
        let dir = arena.add(NodeArena::ROOT, "Best.Of", true);

        let node = arena.get(dir);
        assert_eq!(node.name, "Best.Of");
        assert_eq!(node.extension, "");
        assert_eq!(node.basename(), "Best.Of");
    }

    #[test]
    fn test_paths_follow_parent_chain() {
        let mut arena = NodeArena::new(Path::new("/music"));
        let artist = arena.add(NodeArena::ROOT, "Artist", true);
        let album = arena.add(artist, "Album", true);
        let track = arena.add(album, "01 Intro.flac", false);

        assert_eq!(arena.relative_path(track), PathBuf::from("Artist/Album/01 Intro.flac"));
        assert_eq!(arena.path(track), PathBuf::from("/music/Artist/Album/01 Intro.flac"));
        assert_eq!(arena.path(NodeArena::ROOT), PathBuf::from("/music"));
        assert!(arena.is_top_level(artist));
        assert!(!arena.is_top_level(album));
    }

    #[test]
    fn test_root_has_sentinel_id() {
        let arena = NodeArena::new(Path::new("/music"));
        assert_eq!(arena.id(NodeArena::ROOT), Some(ROOT_ID));
        assert!(arena.get(NodeArena::ROOT).parent.is_none());
        assert_eq!(arena.relative_path(NodeArena::ROOT), PathBuf::new());
    }
}
