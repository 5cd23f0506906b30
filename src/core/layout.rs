//! On-disk layout of a container.
//!
//! ```text
//! 0                     superblock (bincode), SUPERBLOCK_LEN reserved bytes
//! SUPERBLOCK_LEN        header (bincode), header_len bytes
//! header_size           data block 0
//! header_size + n * B   data block n
//! ```

use crate::config::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::domain::model::Header;
use crate::domain::ports::BlockStore;
use crate::utils::error::{FsError, Result};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"CFS1";
pub const FORMAT_VERSION: u32 = 1;
pub const SUPERBLOCK_LEN: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    pub magic: [u8; 4],
    pub version: u32,
    pub block_size: u32,
    pub header_size: u64,
    pub header_len: u64,
}

/// Fixed geometry of an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: u64,
    pub header_size: u64,
}

impl Layout {
    pub fn block_offset(&self, block: u64, offset_in_block: u64) -> u64 {
        self.header_size + block * self.block_size + offset_in_block
    }

    pub fn header_capacity(&self) -> u64 {
        self.header_size - SUPERBLOCK_LEN
    }

    pub fn container_len(&self, block_count: u64) -> u64 {
        self.header_size + block_count * self.block_size
    }

    pub fn blocks_for(&self, size: u64) -> u64 {
        size.div_ceil(self.block_size)
    }
}

/// Reads and decodes the superblock and header of an existing container.
pub fn read_header<S: BlockStore>(store: &mut S) -> Result<(Layout, Header)> {
    let store_len = store.len()?;
    if store_len < SUPERBLOCK_LEN {
        return Err(corrupt(format!("file is only {} bytes long", store_len)));
    }

    let mut raw = vec![0u8; SUPERBLOCK_LEN as usize];
    store.read_at(0, &mut raw)?;
    let superblock: Superblock = bincode::deserialize(&raw)?;

    if superblock.magic != MAGIC {
        return Err(corrupt("bad magic number".to_string()));
    }
    if superblock.version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            superblock.version
        )));
    }

    let layout = Layout {
        block_size: u64::from(superblock.block_size),
        header_size: superblock.header_size,
    };
    if !layout.block_size.is_power_of_two()
        || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&layout.block_size)
    {
        return Err(corrupt(format!(
            "block size {} in superblock is out of range",
            layout.block_size
        )));
    }
    if layout.header_size <= SUPERBLOCK_LEN || layout.header_size > store_len {
        return Err(corrupt(format!(
            "header size {} does not fit a {} byte container",
            layout.header_size, store_len
        )));
    }
    if superblock.header_len > layout.header_capacity() {
        return Err(corrupt(format!(
            "header length {} exceeds capacity {}",
            superblock.header_len,
            layout.header_capacity()
        )));
    }

    let mut raw = vec![0u8; superblock.header_len as usize];
    store.read_at(SUPERBLOCK_LEN, &mut raw)?;
    let header: Header = bincode::deserialize(&raw)?;

    let expected = header
        .block_count
        .checked_mul(layout.block_size)
        .and_then(|data| data.checked_add(layout.header_size))
        .ok_or_else(|| corrupt(format!("block count {} is out of range", header.block_count)))?;
    if store_len < expected {
        return Err(corrupt(format!(
            "container is {} bytes but {} blocks need {}",
            store_len, header.block_count, expected
        )));
    }

    Ok((layout, header))
}

fn corrupt(message: String) -> FsError {
    FsError::CorruptContainer { message }
}

/// Encodes and writes the header. Nothing is written when it does not fit.
pub fn write_header<S: BlockStore>(store: &mut S, layout: &Layout, header: &Header) -> Result<u64> {
    let encoded = bincode::serialize(header)?;
    let header_len = encoded.len() as u64;

    if header_len > layout.header_capacity() {
        return Err(FsError::HeaderOverflow {
            required: header_len,
            capacity: layout.header_capacity(),
        });
    }

    let block_size = u32::try_from(layout.block_size).map_err(|_| FsError::ConfigError {
        message: format!("block size {} does not fit in the superblock", layout.block_size),
    })?;
    let superblock = Superblock {
        magic: MAGIC,
        version: FORMAT_VERSION,
        block_size,
        header_size: layout.header_size,
        header_len,
    };

    store.write_at(SUPERBLOCK_LEN, &encoded)?;
    store.write_at(0, &bincode::serialize(&superblock)?)?;

    Ok(header_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn layout() -> Layout {
        Layout {
            block_size: 512,
            header_size: 4096,
        }
    }

    #[test]
    fn test_superblock_fits_reserved_space() {
        let superblock = Superblock {
            magic: MAGIC,
            version: FORMAT_VERSION,
            block_size: 4096,
            header_size: 65536,
            header_len: 100,
        };
        assert!(bincode::serialized_size(&superblock).unwrap() <= SUPERBLOCK_LEN);
    }

    #[test]
    fn test_header_survives_store() {
        let mut store = MemoryStore::new();
        let mut header = Header::new();
        header.block_count = 0;
        header.free_blocks.insert(3);

        store.set_len(4096).unwrap();
        write_header(&mut store, &layout(), &header).unwrap();

        let (read_layout, read_header) = read_header(&mut store).unwrap();
        assert_eq!(read_layout, layout());
        assert_eq!(read_header, header);
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut store = MemoryStore::from_bytes(vec![7u8; 4096]);
        assert!(matches!(
            read_header(&mut store),
            Err(FsError::CorruptContainer { .. }) | Err(FsError::EncodingError(_))
        ));
    }

    #[test]
    fn test_overflow_writes_nothing() {
        let tiny = Layout {
            block_size: 512,
            header_size: SUPERBLOCK_LEN + 8,
        };
        let mut store = MemoryStore::new();
        let result = write_header(&mut store, &tiny, &Header::new());
        assert!(matches!(result, Err(FsError::HeaderOverflow { .. })));
        assert_eq!(store.len().unwrap(), 0);
    }

    /// A valid 8 KiB container image whose superblock has been edited by `patch`.
    fn image_with(patch: impl FnOnce(&mut Superblock)) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set_len(8192).unwrap();
        write_header(&mut store, &layout(), &Header::new()).unwrap();

        let mut bytes = store.into_inner();
        let mut superblock: Superblock =
            bincode::deserialize(&bytes[..SUPERBLOCK_LEN as usize]).unwrap();
        patch(&mut superblock);
        let encoded = bincode::serialize(&superblock).unwrap();
        bytes[..encoded.len()].copy_from_slice(&encoded);
        MemoryStore::from_bytes(bytes)
    }

    fn assert_corrupt(store: &mut MemoryStore) {
        let result = read_header(store);
        assert!(
            matches!(result, Err(FsError::CorruptContainer { .. })),
            "unexpected result: {:?}",
            result.map(|(layout, _)| layout)
        );
    }

    #[test]
    fn test_untouched_image_reads_back() {
        let mut store = image_with(|_| {});
        assert!(read_header(&mut store).is_ok());
    }

    #[test]
    fn test_block_size_out_of_range_is_corrupt() {
        for block_size in [0, 8, 1000, 1 << 21] {
            assert_corrupt(&mut image_with(|sb| sb.block_size = block_size));
        }
    }

    #[test]
    fn test_header_size_beyond_store_is_corrupt() {
        assert_corrupt(&mut image_with(|sb| {
            sb.header_size = 1 << 46;
            sb.header_len = 1 << 45;
        }));
        assert_corrupt(&mut image_with(|sb| sb.header_size = SUPERBLOCK_LEN));
    }

    #[test]
    fn test_header_len_beyond_header_region_is_corrupt() {
        assert_corrupt(&mut image_with(|sb| sb.header_len = 4096));
    }

    #[test]
    fn test_block_count_overflow_is_corrupt() {
        let mut header = Header::new();
        header.block_count = u64::MAX / 2;
        let mut store = MemoryStore::new();
        store.set_len(8192).unwrap();
        write_header(&mut store, &layout(), &header).unwrap();
        assert_corrupt(&mut store);

        header.block_count = 100;
        write_header(&mut store, &layout(), &header).unwrap();
        assert_corrupt(&mut store);
    }

    #[test]
    fn test_offsets() {
        let layout = layout();
        assert_eq!(layout.block_offset(0, 0), 4096);
        assert_eq!(layout.block_offset(2, 10), 4096 + 1024 + 10);
        assert_eq!(layout.blocks_for(0), 0);
        assert_eq!(layout.blocks_for(512), 1);
        assert_eq!(layout.blocks_for(513), 2);
    }
}
