use crate::config::FsOptions;
use crate::core::layout::{self, Layout};
use crate::domain::model::{DefragReport, FileEntry, FileId, Header};
use crate::domain::ports::BlockStore;
use crate::utils::error::{FsError, Result};

/// Owns the backing store and the decoded header, and moves file contents in and
/// out of data blocks.
pub struct BlockHandler<S: BlockStore> {
    store: S,
    layout: Layout,
    header: Header,
    header_len: u64,
    sync_on_flush: bool,
}

impl<S: BlockStore> BlockHandler<S> {
    /// Opens an existing container, or formats an empty store with `options`.
    pub fn open(mut store: S, options: &FsOptions) -> Result<Self> {
        if store.is_empty()? {
            let layout = Layout {
                block_size: options.block_size,
                header_size: options.header_size,
            };
            let header = Header::new();
            store.set_len(layout.header_size)?;
            let header_len = layout::write_header(&mut store, &layout, &header)?;
            if options.sync_on_flush {
                store.sync()?;
            }

            tracing::info!(
                "Formatted new container (block size {}, header size {})",
                layout.block_size,
                layout.header_size
            );
            return Ok(Self {
                store,
                layout,
                header,
                header_len,
                sync_on_flush: options.sync_on_flush,
            });
        }

        let (layout, header) = layout::read_header(&mut store)?;
        if layout.block_size != options.block_size || layout.header_size != options.header_size {
            tracing::debug!(
                "Container geometry (block {}, header {}) overrides configured (block {}, header {})",
                layout.block_size,
                layout.header_size,
                options.block_size,
                options.header_size
            );
        }
        let header_len = bincode::serialized_size(&header)?;

        tracing::info!(
            "Opened container: {} files, {} blocks in use",
            header.files.len(),
            header.used_blocks.len()
        );
        Ok(Self {
            store,
            layout,
            header,
            header_len,
            sync_on_flush: options.sync_on_flush,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    pub fn store_len(&self) -> Result<u64> {
        self.store.len()
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn flush(&mut self) -> Result<()> {
        self.header_len = layout::write_header(&mut self.store, &self.layout, &self.header)?;
        if self.sync_on_flush {
            self.store.sync()?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.store.sync()
    }

    /// Runs `op` and persists the header. On any failure the in-memory header is
    /// restored to its state before `op`.
    pub fn transaction<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.header.clone();
        let result = op(self).and_then(|value| self.flush().map(|_| value));
        if let Err(e) = &result {
            tracing::warn!("Rolling back header after failed operation: {}", e);
            self.header = snapshot;
        }
        result
    }

    fn entry(&self, id: FileId) -> Result<&FileEntry> {
        self.header.files.get(&id).ok_or_else(|| FsError::CorruptContainer {
            message: format!("file entry {} is missing", id),
        })
    }

    fn entry_mut(&mut self, id: FileId) -> Result<&mut FileEntry> {
        self.header
            .files
            .get_mut(&id)
            .ok_or_else(|| FsError::CorruptContainer {
                message: format!("file entry {} is missing", id),
            })
    }

    /// Lowest free block, or a fresh one past the end.
    fn allocate_block(&mut self) -> u64 {
        if let Some(block) = self.header.free_blocks.pop_first() {
            return block;
        }
        let block = self.header.block_count;
        self.header.block_count += 1;
        block
    }

    fn ensure_capacity(&mut self) -> Result<()> {
        let required = self.layout.container_len(self.header.block_count);
        if self.store.len()? < required {
            self.store.set_len(required)?;
        }
        Ok(())
    }

    fn write_new_blocks(&mut self, data: &[u8]) -> Result<Vec<u64>> {
        let mut blocks = Vec::with_capacity(self.layout.blocks_for(data.len() as u64) as usize);
        for chunk in data.chunks(self.layout.block_size as usize) {
            let block = self.allocate_block();
            self.store.write_at(self.layout.block_offset(block, 0), chunk)?;
            blocks.push(block);
        }
        self.ensure_capacity()?;
        Ok(blocks)
    }

    fn release_blocks(&mut self, blocks: &[u64]) {
        for block in blocks {
            self.header.used_blocks.remove(block);
            self.header.free_blocks.insert(*block);
        }
    }

    pub fn create_entry(&mut self) -> FileId {
        let id = self.header.allocate_file_id();
        self.header.files.insert(id, FileEntry::new());
        id
    }

    /// Replaces the contents of a file. New blocks are taken before the old
    /// ones are released.
    pub fn write(&mut self, id: FileId, contents: &[u8]) -> Result<()> {
        self.entry(id)?;
        let blocks = self.write_new_blocks(contents)?;
        for block in &blocks {
            self.header.used_blocks.insert(*block, id);
        }

        let entry = self.entry_mut(id)?;
        let old_blocks = std::mem::replace(&mut entry.blocks, blocks);
        entry.size = contents.len() as u64;
        entry.touch();
        self.release_blocks(&old_blocks);

        tracing::debug!(
            "Wrote {} bytes to file {} ({} blocks released)",
            contents.len(),
            id,
            old_blocks.len()
        );
        Ok(())
    }

    pub fn append(&mut self, id: FileId, contents: &[u8]) -> Result<()> {
        let (size, last_block) = {
            let entry = self.entry(id)?;
            (entry.size, entry.blocks.last().copied())
        };

        let used_in_last = size % self.layout.block_size;
        let mut remaining = contents;
        if let (Some(last), true) = (last_block, used_in_last != 0) {
            let room = (self.layout.block_size - used_in_last) as usize;
            let (head, tail) = remaining.split_at(room.min(remaining.len()));
            self.store
                .write_at(self.layout.block_offset(last, used_in_last), head)?;
            remaining = tail;
        }

        let blocks = self.write_new_blocks(remaining)?;
        for block in &blocks {
            self.header.used_blocks.insert(*block, id);
        }

        let entry = self.entry_mut(id)?;
        entry.blocks.extend(blocks);
        entry.size = size + contents.len() as u64;
        entry.touch();

        tracing::debug!("Appended {} bytes to file {}", contents.len(), id);
        Ok(())
    }

    pub fn read(&mut self, id: FileId) -> Result<Vec<u8>> {
        let entry = self.entry(id)?;
        let size = usize::try_from(entry.size).map_err(|_| FsError::InvalidOperation {
            message: format!("file of {} bytes does not fit in memory", entry.size),
        })?;
        let blocks = entry.blocks.clone();

        let mut contents = vec![0u8; size];
        for (chunk, block) in contents
            .chunks_mut(self.layout.block_size as usize)
            .zip(blocks.iter())
        {
            self.store
                .read_at(self.layout.block_offset(*block, 0), chunk)?;
        }
        Ok(contents)
    }

    /// Drops a file entry and frees its blocks.
    pub fn remove(&mut self, id: FileId) -> Result<FileEntry> {
        let entry = self
            .header
            .files
            .remove(&id)
            .ok_or_else(|| FsError::CorruptContainer {
                message: format!("file entry {} is missing", id),
            })?;
        self.release_blocks(&entry.blocks);
        Ok(entry)
    }

    /// Moves the highest used blocks into the lowest free ones until the used
    /// blocks are contiguous from zero, then truncates the container.
    pub fn defragment(&mut self) -> Result<DefragReport> {
        let before = self.header.block_count;
        let moved = self.transaction(|h| h.compact())?;

        let block_count = self.header.block_count;
        let container_len = self.layout.container_len(block_count);
        self.store.set_len(container_len)?;

        let report = DefragReport {
            moved_blocks: moved,
            reclaimed_blocks: before - block_count,
            container_len,
        };
        tracing::info!(
            "Defragmented container: moved {} blocks, reclaimed {}",
            report.moved_blocks,
            report.reclaimed_blocks
        );
        Ok(report)
    }

    fn compact(&mut self) -> Result<u64> {
        let mut moved = 0u64;
        let mut buffer = vec![0u8; self.layout.block_size as usize];

        loop {
            let Some(&free) = self.header.free_blocks.first() else {
                break;
            };
            let Some((&used, &owner)) = self.header.used_blocks.last_key_value() else {
                break;
            };
            if used < free {
                break;
            }

            self.store
                .read_at(self.layout.block_offset(used, 0), &mut buffer)?;
            self.store
                .write_at(self.layout.block_offset(free, 0), &buffer)?;

            let entry = self.entry_mut(owner)?;
            let slot = entry
                .blocks
                .iter()
                .position(|block| *block == used)
                .ok_or_else(|| FsError::CorruptContainer {
                    message: format!("block {} is not listed by its owner {}", used, owner),
                })?;
            entry.blocks[slot] = free;

            self.header.free_blocks.remove(&free);
            self.header.free_blocks.insert(used);
            self.header.used_blocks.remove(&used);
            self.header.used_blocks.insert(free, owner);
            moved += 1;
        }

        self.header.free_blocks.clear();
        self.header.block_count = self.header.used_blocks.len() as u64;
        Ok(moved)
    }
}
