pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileStore, MemoryStore};
pub use config::{FsOptions, TomlConfig};
pub use crate::core::{
    filesystem::FileSystem, BlockStore, ContainerStats, DefragReport, Metadata, NodeKind,
};
pub use utils::error::{FsError, Result};
