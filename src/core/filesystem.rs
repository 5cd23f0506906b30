use crate::adapters::FileStore;
use crate::config::FsOptions;
use crate::core::block_handler::BlockHandler;
use crate::core::path::{validate_name, ContainerPath};
use crate::domain::model::{
    ContainerStats, DefragReport, DirectoryNode, FileEntry, FileId, Metadata, Node, NodeKind,
};
use crate::domain::ports::BlockStore;
use crate::utils::error::{FsError, Result};
use crate::utils::validation::Validate;
use std::path::Path;

/// A directory tree stored inside a single container.
///
/// Every mutating call persists the header before it returns. When a call fails,
/// the in-memory tree is left as it was before the call.
pub struct FileSystem<S: BlockStore = FileStore> {
    handler: BlockHandler<S>,
}

impl FileSystem<FileStore> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &FsOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &FsOptions) -> Result<Self> {
        options.validate()?;
        let store = FileStore::open(path)?;
        tracing::info!("Using container {}", store.path().display());
        Self::with_store(store, options)
    }

    /// Closes the container and deletes its file from the host.
    pub fn destroy(self) -> Result<()> {
        self.handler.into_store().delete()
    }
}

impl<S: BlockStore> FileSystem<S> {
    pub fn with_store(store: S, options: &FsOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            handler: BlockHandler::open(store, options)?,
        })
    }

    pub fn sync(&mut self) -> Result<()> {
        self.handler.sync()
    }

    pub fn close(mut self) -> Result<()> {
        self.handler.sync()
    }

    pub fn into_store(self) -> S {
        self.handler.into_store()
    }

    fn root(&self) -> &DirectoryNode {
        &self.handler.header().root
    }

    pub fn create_directory(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let Some((parent, name)) = path.split_last() else {
            return Ok(());
        };

        let parent_dir = directory(self.root(), parent)?;
        match parent_dir.get(name) {
            Some(Node::Directory(_)) => return Ok(()),
            Some(Node::File(_)) => {
                return Err(FsError::AlreadyExists {
                    name: name.to_string(),
                    reason: "exists and it is a file".to_string(),
                })
            }
            None => {}
        }

        self.handler.transaction(|h| {
            directory_mut(&mut h.header_mut().root, parent)?
                .insert(name.to_string(), Node::Directory(DirectoryNode::new()));
            Ok(())
        })?;
        tracing::debug!("Created directory {}", path);
        Ok(())
    }

    /// Creates the directory and any missing parents.
    pub fn create_directories(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        self.handler.transaction(|h| {
            let mut current = &mut h.header_mut().root;
            for component in path.components() {
                if !current.contains(component) {
                    current.insert(component.clone(), Node::Directory(DirectoryNode::new()));
                }
                current = match current.get_mut(component) {
                    Some(Node::Directory(dir)) => dir,
                    _ => {
                        return Err(FsError::AlreadyExists {
                            name: component.clone(),
                            reason: "exists and it is a file".to_string(),
                        })
                    }
                };
            }
            Ok(())
        })?;
        tracing::debug!("Created directories {}", path);
        Ok(())
    }

    pub fn directory_contents(&self, path: &str) -> Result<Vec<String>> {
        let path = ContainerPath::parse(path)?;
        Ok(directory(self.root(), path.components())?.names())
    }

    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let (parent, name) = split_non_root(&path, "remove the root directory")?;

        match directory(self.root(), parent)?.get(name) {
            Some(Node::Directory(dir)) if !dir.is_empty() => {
                return Err(FsError::DirectoryNotEmpty {
                    path: path.to_string(),
                })
            }
            Some(Node::Directory(_)) => {}
            Some(Node::File(_)) => {
                return Err(FsError::NotADirectory {
                    path: path.to_string(),
                })
            }
            None => {
                return Err(FsError::NotFound {
                    path: path.to_string(),
                })
            }
        }

        self.handler.transaction(|h| {
            directory_mut(&mut h.header_mut().root, parent)?.remove(name);
            Ok(())
        })?;
        tracing::debug!("Removed directory {}", path);
        Ok(())
    }

    /// Removes a directory and everything below it.
    pub fn remove_tree(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let (parent, name) = split_non_root(&path, "remove the root directory")?;

        let mut ids = Vec::new();
        match directory(self.root(), parent)?.get(name) {
            Some(Node::Directory(dir)) => dir.collect_file_ids(&mut ids),
            Some(Node::File(_)) => {
                return Err(FsError::NotADirectory {
                    path: path.to_string(),
                })
            }
            None => {
                return Err(FsError::NotFound {
                    path: path.to_string(),
                })
            }
        }

        self.handler.transaction(|h| {
            directory_mut(&mut h.header_mut().root, parent)?.remove(name);
            for id in &ids {
                h.remove(*id)?;
            }
            Ok(())
        })?;
        tracing::debug!("Removed tree {} ({} files)", path, ids.len());
        Ok(())
    }

    pub fn create_file(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let (parent, name) = split_non_root(&path, "create a file at the root path")?;

        match directory(self.root(), parent)?.get(name) {
            Some(Node::File(_)) => return Ok(()),
            Some(Node::Directory(_)) => {
                return Err(FsError::AlreadyExists {
                    name: name.to_string(),
                    reason: "exists and it is a directory".to_string(),
                })
            }
            None => {}
        }

        self.handler.transaction(|h| {
            let id = h.create_entry();
            directory_mut(&mut h.header_mut().root, parent)?.insert(name.to_string(), Node::File(id));
            Ok(())
        })?;
        tracing::debug!("Created file {}", path);
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let id = self.file_id(&path)?;
        let (parent, name) = split_non_root(&path, "remove the root directory")?;

        self.handler.transaction(|h| {
            directory_mut(&mut h.header_mut().root, parent)?.remove(name);
            h.remove(id)?;
            Ok(())
        })?;
        tracing::debug!("Removed file {}", path);
        Ok(())
    }

    /// Renames a node within its directory.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        validate_name(new_name)?;
        let (parent, name) = split_non_root(&path, "rename the root directory")?;

        let parent_dir = directory(self.root(), parent)?;
        if !parent_dir.contains(name) {
            return Err(FsError::NotFound {
                path: path.to_string(),
            });
        }
        if name == new_name {
            return Ok(());
        }
        if parent_dir.contains(new_name) {
            return Err(FsError::AlreadyExists {
                name: new_name.to_string(),
                reason: "already exists".to_string(),
            });
        }

        self.handler.transaction(|h| {
            let dir = directory_mut(&mut h.header_mut().root, parent)?;
            if let Some(node) = dir.remove(name) {
                dir.insert(new_name.to_string(), node);
            }
            Ok(())
        })?;
        tracing::debug!("Renamed {} to {}", path, new_name);
        Ok(())
    }

    /// Moves a node into the directory `destination`, keeping its name.
    pub fn move_to(&mut self, path: &str, destination: &str) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let destination = ContainerPath::parse(destination)?;
        let (parent, name) = split_non_root(&path, "move the root directory")?;

        let source_kind = match directory(self.root(), parent)?.get(name) {
            Some(node) => node.kind(),
            None => {
                return Err(FsError::NotFound {
                    path: path.to_string(),
                })
            }
        };
        if source_kind == NodeKind::Directory && destination.starts_with(&path) {
            return Err(FsError::InvalidOperation {
                message: format!("cannot move {} into itself ({})", path, destination),
            });
        }
        let target = directory(self.root(), destination.components())?;
        if destination.components() == parent {
            return Ok(());
        }
        if target.contains(name) {
            return Err(FsError::AlreadyExists {
                name: name.to_string(),
                reason: format!("already exists in {}", destination),
            });
        }

        self.handler.transaction(|h| {
            let root = &mut h.header_mut().root;
            let node = directory_mut(root, parent)?
                .remove(name)
                .ok_or_else(|| FsError::NotFound {
                    path: path.to_string(),
                })?;
            directory_mut(root, destination.components())?.insert(name.to_string(), node);
            Ok(())
        })?;
        tracing::debug!("Moved {} into {}", path, destination);
        Ok(())
    }

    pub fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let id = self.file_id(&path)?;
        self.handler.transaction(|h| h.write(id, contents))
    }

    pub fn append_file(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        let path = ContainerPath::parse(path)?;
        let id = self.file_id(&path)?;
        self.handler.transaction(|h| h.append(id, contents))
    }

    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let path = ContainerPath::parse(path)?;
        let id = self.file_id(&path)?;
        self.handler.read(id)
    }

    pub fn file_size(&self, path: &str) -> Result<u64> {
        let path = ContainerPath::parse(path)?;
        let id = self.file_id(&path)?;
        Ok(self.file_entry(id)?.size)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let path = ContainerPath::parse(path)?;
        Ok(path.is_root() || lookup(self.root(), path.components()).is_some())
    }

    pub fn metadata(&self, path: &str) -> Result<Metadata> {
        let path = ContainerPath::parse(path)?;
        if path.is_root() {
            return Ok(directory_metadata(self.root()));
        }

        match lookup(self.root(), path.components()) {
            Some(Node::Directory(dir)) => Ok(directory_metadata(dir)),
            Some(Node::File(id)) => {
                let entry = self.file_entry(*id)?;
                Ok(Metadata {
                    kind: NodeKind::File,
                    size: entry.size,
                    blocks: entry.blocks.len(),
                    entries: 0,
                    created_at: entry.created_at,
                    modified_at: entry.modified_at,
                })
            }
            None => Err(FsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Depth-first listing of every node below `path`, parents before children.
    pub fn walk(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        let path = ContainerPath::parse(path)?;
        let mut out = Vec::new();
        walk_into(directory(self.root(), path.components())?, &path, &mut out)?;
        Ok(out)
    }

    pub fn defragment(&mut self) -> Result<DefragReport> {
        self.handler.defragment()
    }

    pub fn stats(&self) -> Result<ContainerStats> {
        let header = self.handler.header();
        let layout = self.handler.layout();
        let (directories, files) = header.root.count();
        Ok(ContainerStats {
            block_size: layout.block_size,
            header_size: layout.header_size,
            header_len: self.handler.header_len(),
            block_count: header.block_count,
            used_blocks: header.used_blocks.len() as u64,
            free_blocks: header.free_blocks.len() as u64,
            files,
            directories,
            container_len: self.handler.store_len()?,
        })
    }

    fn file_id(&self, path: &ContainerPath) -> Result<FileId> {
        match lookup(self.root(), path.components()) {
            Some(Node::File(id)) => Ok(*id),
            Some(Node::Directory(_)) => Err(FsError::NotAFile {
                path: path.to_string(),
            }),
            None if path.is_root() => Err(FsError::NotAFile {
                path: path.to_string(),
            }),
            None => Err(FsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn file_entry(&self, id: FileId) -> Result<&FileEntry> {
        self.handler
            .header()
            .files
            .get(&id)
            .ok_or_else(|| FsError::CorruptContainer {
                message: format!("file entry {} is missing", id),
            })
    }
}

fn split_non_root<'a>(path: &'a ContainerPath, action: &str) -> Result<(&'a [String], &'a str)> {
    path.split_last().ok_or_else(|| FsError::InvalidOperation {
        message: format!("cannot {}", action),
    })
}

fn render(components: &[String]) -> String {
    if components.is_empty() {
        return "/".to_string();
    }
    components.iter().map(|c| format!("/{}", c)).collect()
}

/// Node at `components`; the root itself is not a `Node` and yields `None`.
fn lookup<'a>(root: &'a DirectoryNode, components: &[String]) -> Option<&'a Node> {
    let (last, parents) = components.split_last()?;
    let mut current = root;
    for name in parents {
        current = match current.get(name)? {
            Node::Directory(dir) => dir,
            Node::File(_) => return None,
        };
    }
    current.get(last)
}

fn directory<'a>(root: &'a DirectoryNode, components: &[String]) -> Result<&'a DirectoryNode> {
    let mut current = root;
    for (depth, name) in components.iter().enumerate() {
        current = match current.get(name) {
            Some(Node::Directory(dir)) => dir,
            Some(Node::File(_)) => {
                return Err(FsError::NotADirectory {
                    path: render(&components[..=depth]),
                })
            }
            None => {
                return Err(FsError::NotFound {
                    path: render(&components[..=depth]),
                })
            }
        };
    }
    Ok(current)
}

fn directory_mut<'a>(
    root: &'a mut DirectoryNode,
    components: &[String],
) -> Result<&'a mut DirectoryNode> {
    let mut current = root;
    for (depth, name) in components.iter().enumerate() {
        current = match current.get_mut(name) {
            Some(Node::Directory(dir)) => dir,
            Some(Node::File(_)) => {
                return Err(FsError::NotADirectory {
                    path: render(&components[..=depth]),
                })
            }
            None => {
                return Err(FsError::NotFound {
                    path: render(&components[..=depth]),
                })
            }
        };
    }
    Ok(current)
}

fn directory_metadata(dir: &DirectoryNode) -> Metadata {
    Metadata {
        kind: NodeKind::Directory,
        size: 0,
        blocks: 0,
        entries: dir.len(),
        created_at: dir.created_at,
        modified_at: dir.created_at,
    }
}

fn walk_into(
    dir: &DirectoryNode,
    prefix: &ContainerPath,
    out: &mut Vec<(String, NodeKind)>,
) -> Result<()> {
    for (name, node) in dir.iter() {
        let path = prefix.join(name)?;
        out.push((path.to_string(), node.kind()));
        if let Node::Directory(child) = node {
            walk_into(child, &path, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn memory_fs() -> FileSystem<MemoryStore> {
        let options = FsOptions {
            block_size: 512,
            header_size: 8192,
            sync_on_flush: false,
        };
        FileSystem::with_store(MemoryStore::new(), &options).unwrap()
    }

    #[test]
    fn test_root_operations() {
        let mut fs = memory_fs();
        fs.create_directory("/").unwrap();
        assert!(fs.directory_contents("/").unwrap().is_empty());
        assert!(matches!(
            fs.remove_directory("/"),
            Err(FsError::InvalidOperation { .. })
        ));
        assert!(matches!(
            fs.rename("/", "x"),
            Err(FsError::InvalidOperation { .. })
        ));
        assert!(matches!(fs.read_file("/"), Err(FsError::NotAFile { .. })));
        assert_eq!(fs.metadata("/").unwrap().kind, NodeKind::Directory);
    }

    #[test]
    fn test_missing_parent() {
        let mut fs = memory_fs();
        assert!(matches!(
            fs.create_directory("/usr/bin"),
            Err(FsError::NotFound { ref path }) if path == "/usr"
        ));
        assert!(matches!(
            fs.create_file("/usr/a.txt"),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_directories() {
        let mut fs = memory_fs();
        fs.create_directories("/a/b/c").unwrap();
        fs.create_directories("/a/b/c").unwrap();
        assert_eq!(fs.directory_contents("/a/b").unwrap(), vec!["c"]);

        fs.create_file("/a/f").unwrap();
        assert!(matches!(
            fs.create_directories("/a/f/g"),
            Err(FsError::AlreadyExists { .. })
        ));
        assert!(!fs.exists("/a/f/g").unwrap());
    }

    #[test]
    fn test_move_into_itself_is_rejected() {
        let mut fs = memory_fs();
        fs.create_directories("/etc/bin").unwrap();
        assert!(matches!(
            fs.move_to("/etc", "/etc/bin"),
            Err(FsError::InvalidOperation { .. })
        ));
        assert!(matches!(
            fs.move_to("/etc", "/etc"),
            Err(FsError::InvalidOperation { .. })
        ));
        assert!(fs.exists("/etc/bin").unwrap());
    }

    #[test]
    fn test_move_collision_keeps_source() {
        let mut fs = memory_fs();
        fs.create_directory("/usr").unwrap();
        fs.create_file("/usr/a.txt").unwrap();
        fs.create_file("/a.txt").unwrap();

        assert!(matches!(
            fs.move_to("/a.txt", "/usr"),
            Err(FsError::AlreadyExists { .. })
        ));
        assert!(fs.exists("/a.txt").unwrap());
    }

    #[test]
    fn test_move_into_current_parent_is_noop() {
        let mut fs = memory_fs();
        fs.create_directories("/usr/a").unwrap();
        fs.create_file("/usr/b.txt").unwrap();
        fs.write_file("/usr/b.txt", b"stay").unwrap();

        fs.move_to("/usr/a", "/usr").unwrap();
        fs.move_to("/usr/b.txt", "/usr/").unwrap();

        assert_eq!(fs.directory_contents("/usr").unwrap(), vec!["a", "b.txt"]);
        assert_eq!(fs.read_file("/usr/b.txt").unwrap(), b"stay");
        assert!(matches!(
            fs.move_to("/usr/a", "/missing"),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_walk_lists_parents_first() {
        let mut fs = memory_fs();
        fs.create_directories("/usr/bin").unwrap();
        fs.create_file("/usr/bin/ls").unwrap();
        fs.create_file("/a.txt").unwrap();

        let listing = fs.walk("/").unwrap();
        assert_eq!(
            listing,
            vec![
                ("/a.txt".to_string(), NodeKind::File),
                ("/usr".to_string(), NodeKind::Directory),
                ("/usr/bin".to_string(), NodeKind::Directory),
                ("/usr/bin/ls".to_string(), NodeKind::File),
            ]
        );
    }

    #[test]
    fn test_header_overflow_rolls_back() {
        let options = FsOptions {
            block_size: 512,
            header_size: 4096,
            sync_on_flush: false,
        };
        let mut fs = FileSystem::with_store(MemoryStore::new(), &options).unwrap();

        let mut overflowed = false;
        for i in 0..1000 {
            let name = format!("/directory-with-a-long-name-{:04}", i);
            match fs.create_directory(&name) {
                Ok(()) => {}
                Err(FsError::HeaderOverflow { .. }) => {
                    assert!(!fs.exists(&name).unwrap());
                    overflowed = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(overflowed);

        let count = fs.directory_contents("/").unwrap().len();
        let store = fs.into_store();
        let reopened = FileSystem::with_store(store, &options).unwrap();
        assert_eq!(reopened.directory_contents("/").unwrap().len(), count);
    }
}
