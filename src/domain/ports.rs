use crate::utils::error::Result;

/// Byte-addressable backing store for a container.
///
/// Offsets are absolute. Reads past the current length are errors; writes past it
/// extend the store.
pub trait BlockStore: Send {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;
    fn len(&self) -> Result<u64>;
    fn set_len(&mut self, len: u64) -> Result<()>;
    fn sync(&mut self) -> Result<()>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Source of container settings (command line or configuration file).
pub trait ConfigProvider {
    fn container_path(&self) -> Option<&str>;
    fn block_size(&self) -> Option<u64>;
    fn header_size(&self) -> Option<u64>;
    fn sync_on_flush(&self) -> Option<bool>;
}
