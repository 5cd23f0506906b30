use crate::domain::ports::BlockStore;
use crate::utils::error::{FsError, Result};

/// In-memory store, used for tests and scratch containers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

fn range(offset: u64, len: usize) -> Result<(usize, usize)> {
    let start = usize::try_from(offset).map_err(|_| FsError::InvalidOperation {
        message: format!("offset {} does not fit in memory", offset),
    })?;
    Ok((start, start + len))
}

impl BlockStore for MemoryStore {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let (start, end) = range(offset, buf.len())?;
        let src = self.bytes.get(start..end).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read of {}..{} past end {}", start, end, self.bytes.len()),
            )
        })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let (start, end) = range(offset, data.len())?;
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        let (len, _) = range(len, 0)?;
        self.bytes.resize(len, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_past_end_fail() {
        let mut store = MemoryStore::new();
        store.write_at(2, b"ab").unwrap();
        assert_eq!(store.len().unwrap(), 4);

        let mut buf = [0u8; 4];
        store.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"\0\0ab");

        let mut buf = [0u8; 3];
        assert!(store.read_at(2, &mut buf).is_err());
    }
}
