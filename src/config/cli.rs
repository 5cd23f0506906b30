use crate::domain::ports::ConfigProvider;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cfs")]
#[command(about = "Store a directory tree inside a single container file")]
pub struct CliConfig {
    /// Container file (created if missing)
    #[arg(short, long)]
    pub container: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Block size used when formatting a new container
    #[arg(long)]
    pub block_size: Option<u64>,

    /// Header region size used when formatting a new container
    #[arg(long)]
    pub header_size: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Print results as JSON")]
    pub json: bool,

    #[arg(long, help = "Log process CPU and memory usage")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
    },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Create an empty file
    Touch { path: String },
    /// Remove a file, or a directory tree with -r
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Move a node into another directory
    Mv { path: String, destination: String },
    /// Rename a node in place
    Rename { path: String, new_name: String },
    /// Replace a file's contents with a host file (or stdin)
    Write {
        path: String,
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Append a host file (or stdin) to a file
    Append {
        path: String,
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Show node metadata
    Stat { path: String },
    /// Print a file's size in bytes
    Size { path: String },
    /// Recursively list a directory
    Tree {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Compact the container and release unused space
    Defrag,
    /// Show container usage
    Stats,
    /// Copy a host directory into the container
    Import {
        source: PathBuf,
        #[arg(default_value = "/")]
        destination: String,
    },
    /// Copy a container directory to the host, or into a zip archive
    Export {
        source: String,
        destination: PathBuf,
        #[arg(long)]
        zip: bool,
    },
}

impl ConfigProvider for CliConfig {
    fn container_path(&self) -> Option<&str> {
        self.container.as_deref()
    }

    fn block_size(&self) -> Option<u64> {
        self.block_size
    }

    fn header_size(&self) -> Option<u64> {
        self.header_size
    }

    fn sync_on_flush(&self) -> Option<bool> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand() {
        let config =
            CliConfig::try_parse_from(["cfs", "-c", "data.cfs", "mkdir", "-p", "/usr/bin"]).unwrap();
        assert_eq!(config.container_path(), Some("data.cfs"));
        assert!(matches!(
            config.command,
            Command::Mkdir { ref path, parents: true } if path == "/usr/bin"
        ));
    }

    #[test]
    fn test_export_zip_flag() {
        let config = CliConfig::try_parse_from([
            "cfs", "-c", "data.cfs", "export", "/docs", "out.zip", "--zip",
        ])
        .unwrap();
        assert!(matches!(config.command, Command::Export { zip: true, .. }));
    }
}
