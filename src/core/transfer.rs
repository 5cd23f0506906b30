//! Copying trees between the host filesystem and a container.

use crate::core::filesystem::FileSystem;
use crate::core::path::ContainerPath;
use crate::domain::model::NodeKind;
use crate::domain::ports::BlockStore;
use crate::utils::error::{FsError, Result};
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

fn host_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| FsError::InvalidName {
            name: path.display().to_string(),
            reason: "host file name is not valid UTF-8".to_string(),
        })
}

/// Recursively copies `host_dir` into the existing container directory `container_dir`.
pub fn import_dir<S: BlockStore>(
    fs: &mut FileSystem<S>,
    host_dir: &Path,
    container_dir: &str,
) -> Result<TransferSummary> {
    let target = ContainerPath::parse(container_dir)?;
    let mut summary = TransferSummary::default();
    import_into(fs, host_dir, &target, &mut summary)?;

    tracing::info!(
        "Imported {} files ({} bytes) and {} directories from {}",
        summary.files,
        summary.bytes,
        summary.directories,
        host_dir.display()
    );
    Ok(summary)
}

fn import_into<S: BlockStore>(
    fs: &mut FileSystem<S>,
    host_dir: &Path,
    target: &ContainerPath,
    summary: &mut TransferSummary,
) -> Result<()> {
    let mut entries = std::fs::read_dir(host_dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let host_path = entry.path();
        let path = target.join(&host_name(&host_path)?)?;
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            fs.create_directory(&path.to_string())?;
            summary.directories += 1;
            import_into(fs, &host_path, &path, summary)?;
        } else if file_type.is_file() {
            let contents = std::fs::read(&host_path)?;
            let path = path.to_string();
            fs.create_file(&path)?;
            fs.write_file(&path, &contents)?;
            summary.files += 1;
            summary.bytes += contents.len() as u64;
        } else {
            tracing::debug!("Skipping {} (not a regular file)", host_path.display());
        }
    }
    Ok(())
}

/// Writes the container subtree `container_dir` below `host_dir`, creating it if needed.
pub fn export_dir<S: BlockStore>(
    fs: &mut FileSystem<S>,
    container_dir: &str,
    host_dir: &Path,
) -> Result<TransferSummary> {
    let base = ContainerPath::parse(container_dir)?;
    let mut summary = TransferSummary::default();
    std::fs::create_dir_all(host_dir)?;

    for (path, kind) in fs.walk(container_dir)? {
        let relative = relative_components(&base, &path)?;
        let host_path = relative.iter().fold(host_dir.to_path_buf(), |acc, c| acc.join(c));
        match kind {
            NodeKind::Directory => {
                std::fs::create_dir_all(&host_path)?;
                summary.directories += 1;
            }
            NodeKind::File => {
                let contents = fs.read_file(&path)?;
                std::fs::write(&host_path, &contents)?;
                summary.files += 1;
                summary.bytes += contents.len() as u64;
            }
        }
    }

    tracing::info!(
        "Exported {} files ({} bytes) to {}",
        summary.files,
        summary.bytes,
        host_dir.display()
    );
    Ok(summary)
}

/// Writes the container subtree into a zip archive. Entry names are relative to
/// `container_dir`.
pub fn export_zip<S: BlockStore, W: Write + Seek>(
    fs: &mut FileSystem<S>,
    container_dir: &str,
    writer: W,
) -> Result<(W, TransferSummary)> {
    let base = ContainerPath::parse(container_dir)?;
    let mut summary = TransferSummary::default();
    let mut zip = ZipWriter::new(writer);

    for (path, kind) in fs.walk(container_dir)? {
        let name = relative_components(&base, &path)?.join("/");
        match kind {
            NodeKind::Directory => {
                zip.add_directory::<_, ()>(format!("{}/", name), FileOptions::default())?;
                summary.directories += 1;
            }
            NodeKind::File => {
                let contents = fs.read_file(&path)?;
                zip.start_file::<_, ()>(name, FileOptions::default())?;
                zip.write_all(&contents)?;
                summary.files += 1;
                summary.bytes += contents.len() as u64;
            }
        }
    }

    let writer = zip.finish()?;
    tracing::info!("Wrote {} files to zip archive", summary.files);
    Ok((writer, summary))
}

/// Paths (relative to `container_dir`) whose contents differ from the host tree,
/// or that exist on only one side.
pub fn verify_against_host<S: BlockStore>(
    fs: &mut FileSystem<S>,
    container_dir: &str,
    host_dir: &Path,
) -> Result<Vec<String>> {
    let base = ContainerPath::parse(container_dir)?;
    let mut mismatches = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for (path, kind) in fs.walk(container_dir)? {
        let relative = relative_components(&base, &path)?;
        let host_path = relative.iter().fold(host_dir.to_path_buf(), |acc, c| acc.join(c));
        let key = relative.join("/");
        seen.insert(key.clone());

        let matches = match kind {
            NodeKind::Directory => host_path.is_dir(),
            NodeKind::File => {
                host_path.is_file() && std::fs::read(&host_path)? == fs.read_file(&path)?
            }
        };
        if !matches {
            mismatches.push(key);
        }
    }

    collect_host_only(host_dir, host_dir, &seen, &mut mismatches)?;
    Ok(mismatches)
}

fn collect_host_only(
    root: &Path,
    dir: &Path,
    seen: &std::collections::BTreeSet<String>,
    out: &mut Vec<String>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| FsError::InvalidOperation {
                message: e.to_string(),
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if !seen.contains(&relative) {
            out.push(relative);
        } else if entry.file_type()?.is_dir() {
            collect_host_only(root, &path, seen, out)?;
        }
    }
    Ok(())
}

fn relative_components(base: &ContainerPath, path: &str) -> Result<Vec<String>> {
    let path = ContainerPath::parse(path)?;
    path.components()
        .get(base.components().len()..)
        .map(<[String]>::to_vec)
        .ok_or_else(|| FsError::InvalidOperation {
            message: format!("{} is not below {}", path, base),
        })
}
