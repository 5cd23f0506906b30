use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type FileId = u64;

/// Contents bookkeeping for one file. Block `i` holds bytes `[i * B, (i + 1) * B)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub size: u64,
    pub blocks: Vec<u64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileEntry {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            size: 0,
            blocks: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

impl Default for FileEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Directory(DirectoryNode),
    File(FileId),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Directory(_) => NodeKind::Directory,
            Node::File(_) => NodeKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    entries: BTreeMap<String, Node>,
    pub created_at: DateTime<Utc>,
}

impl DirectoryNode {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries.get_mut(name)
    }

    pub fn insert(&mut self, name: String, node: Node) {
        self.entries.insert(name, node);
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.entries.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Names in lexical order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.entries.iter()
    }

    /// Ids of every file at or below this directory.
    pub fn collect_file_ids(&self, out: &mut Vec<FileId>) {
        for node in self.entries.values() {
            match node {
                Node::File(id) => out.push(*id),
                Node::Directory(dir) => dir.collect_file_ids(out),
            }
        }
    }

    pub fn count(&self) -> (usize, usize) {
        let mut directories = 0;
        let mut files = 0;
        for node in self.entries.values() {
            match node {
                Node::File(_) => files += 1,
                Node::Directory(dir) => {
                    let (d, f) = dir.count();
                    directories += d + 1;
                    files += f;
                }
            }
        }
        (directories, files)
    }
}

impl Default for DirectoryNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the container persists in its header region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub root: DirectoryNode,
    pub files: BTreeMap<FileId, FileEntry>,
    pub free_blocks: BTreeSet<u64>,
    pub used_blocks: BTreeMap<u64, FileId>,
    pub block_count: u64,
    pub next_file_id: FileId,
}

impl Header {
    pub fn new() -> Self {
        Self {
            root: DirectoryNode::new(),
            files: BTreeMap::new(),
            free_blocks: BTreeSet::new(),
            used_blocks: BTreeMap::new(),
            block_count: 0,
            next_file_id: 1,
        }
    }

    pub fn allocate_file_id(&mut self) -> FileId {
        let id = self.next_file_id;
        self.next_file_id += 1;
        id
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub kind: NodeKind,
    pub size: u64,
    pub blocks: usize,
    /// Entry count for directories.
    pub entries: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub block_size: u64,
    pub header_size: u64,
    pub header_len: u64,
    pub block_count: u64,
    pub used_blocks: u64,
    pub free_blocks: u64,
    pub files: usize,
    pub directories: usize,
    pub container_len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefragReport {
    pub moved_blocks: u64,
    pub reclaimed_blocks: u64,
    pub container_len: u64,
}
