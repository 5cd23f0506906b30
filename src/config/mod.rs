#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::TomlConfig;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BLOCK_SIZE: u64 = 4096;
pub const DEFAULT_HEADER_SIZE: u64 = 64 * 1024;
pub const MIN_BLOCK_SIZE: u64 = 512;
pub const MAX_BLOCK_SIZE: u64 = 1024 * 1024;
pub const MIN_HEADER_SIZE: u64 = 4096;

/// Geometry used when formatting a new container, plus runtime behaviour.
///
/// Existing containers keep the geometry stored in their superblock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsOptions {
    pub block_size: u64,
    pub header_size: u64,
    /// fsync after every header flush.
    pub sync_on_flush: bool,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            header_size: DEFAULT_HEADER_SIZE,
            sync_on_flush: false,
        }
    }
}

impl FsOptions {
    /// Layers providers in order; later providers override earlier ones.
    pub fn from_providers(providers: &[&dyn ConfigProvider]) -> Self {
        let mut options = Self::default();
        for provider in providers {
            if let Some(block_size) = provider.block_size() {
                options.block_size = block_size;
            }
            if let Some(header_size) = provider.header_size() {
                options.header_size = header_size;
            }
            if let Some(sync) = provider.sync_on_flush() {
                options.sync_on_flush = sync;
            }
        }
        options
    }
}

impl Validate for FsOptions {
    fn validate(&self) -> Result<()> {
        validation::validate_power_of_two("block_size", self.block_size)?;
        validation::validate_range("block_size", self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        validation::validate_multiple_of("header_size", self.header_size, 512)?;
        validation::validate_range("header_size", self.header_size, MIN_HEADER_SIZE, u64::from(u32::MAX))?;
        Ok(())
    }
}
