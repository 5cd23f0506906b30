pub mod block_handler;
pub mod filesystem;
pub mod layout;
pub mod path;
pub mod transfer;

pub use crate::domain::model::{ContainerStats, DefragReport, Metadata, NodeKind};
pub use crate::domain::ports::{BlockStore, ConfigProvider};
pub use crate::utils::error::Result;
