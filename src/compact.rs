//! Compaction of a single hot file into its archive container.
//!
//! The container is staged as a temporary file in the destination directory,
//! synced, read back and compared byte for byte against the source, and only
//! then renamed into place. The hot file is removed last. Every failure mode
//! short of losing the disk leaves the source file intact; a crash can leave
//! a stale container behind, never a missing recording.

use crate::config::CollisionPolicy;
use crate::datepath::{self, MalformedPath};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A container successfully written and its source removed.
#[derive(Debug)]
pub struct ArchiveFile {
    pub container: PathBuf,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

#[derive(Debug)]
pub enum CompactOutcome {
    Archived(ArchiveFile),
    /// A container already existed and the skip policy left both files alone.
    SkippedExisting { container: PathBuf },
}

#[derive(Debug)]
pub enum CompactError {
    /// The file does not sit at `year/month/day/name` under the storage root.
    Malformed(MalformedPath),
    /// A container already exists and the policy treats that as fatal.
    Collision { container: PathBuf },
    CreateDir { dir: PathBuf, source: std::io::Error },
    ReadSource { path: PathBuf, source: std::io::Error },
    Write { path: PathBuf, source: std::io::Error },
    Container { container: PathBuf, source: zip::result::ZipError },
    /// The staged container did not decompress back to the source bytes.
    Verify { container: PathBuf },
    Rename { container: PathBuf, source: std::io::Error },
    RemoveSource { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for CompactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompactError::Malformed(e) => write!(f, "{e}"),
            CompactError::Collision { container } => {
                write!(f, "container already exists at {}", container.display())
            }
            CompactError::CreateDir { dir, source } => {
                write!(f, "failed to create {}: {source}", dir.display())
            }
            CompactError::ReadSource { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            CompactError::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            CompactError::Container { container, source } => {
                write!(f, "container error for {}: {source}", container.display())
            }
            CompactError::Verify { container } => {
                write!(
                    f,
                    "staged container {} did not read back to the source bytes",
                    container.display()
                )
            }
            CompactError::Rename { container, source } => {
                write!(
                    f,
                    "failed to move container into place at {}: {source}",
                    container.display()
                )
            }
            CompactError::RemoveSource { path, source } => {
                write!(f, "failed to remove {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CompactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompactError::Malformed(e) => Some(e),
            CompactError::Collision { .. } | CompactError::Verify { .. } => None,
            CompactError::CreateDir { source, .. }
            | CompactError::ReadSource { source, .. }
            | CompactError::Write { source, .. }
            | CompactError::Rename { source, .. }
            | CompactError::RemoveSource { source, .. } => Some(source),
            CompactError::Container { source, .. } => Some(source),
        }
    }
}

/// Compact one hot file into `<archive_root>/year/month/day/basename.zip`,
/// mirroring the file's partition segments exactly as they appear on disk,
/// then remove the hot file.
///
/// The source is deleted only after the container has been written, synced
/// and verified at its final path. Calling this twice on the same arguments
/// after a partial failure is safe.
pub fn compact(
    storage_root: &Path,
    file: &Path,
    archive_root: &Path,
    on_collision: CollisionPolicy,
) -> Result<CompactOutcome, CompactError> {
    let rel = file.strip_prefix(storage_root).unwrap_or(file);
    let dp = datepath::decompose(rel).map_err(CompactError::Malformed)?;
    let container = archive_root.join(dp.archive_rel());

    tracing::info!(
        file = %file.display(),
        container = %container.display(),
        "compacting"
    );

    if container.exists() {
        match on_collision {
            CollisionPolicy::Overwrite => {
                tracing::warn!(
                    container = %container.display(),
                    "replacing existing container"
                );
            }
            CollisionPolicy::Skip => {
                return Ok(CompactOutcome::SkippedExisting { container });
            }
            CollisionPolicy::Fail => {
                return Err(CompactError::Collision { container });
            }
        }
    }

    let dest_dir = match container.parent() {
        Some(parent) => parent.to_path_buf(),
        None => archive_root.to_path_buf(),
    };
    std::fs::create_dir_all(&dest_dir).map_err(|e| CompactError::CreateDir {
        dir: dest_dir.clone(),
        source: e,
    })?;

    let original = std::fs::read(file).map_err(|e| CompactError::ReadSource {
        path: file.to_path_buf(),
        source: e,
    })?;

    // Staged in the destination directory so the final rename cannot cross
    // a filesystem boundary.
    let mut staged = NamedTempFile::new_in(&dest_dir).map_err(|e| CompactError::Write {
        path: dest_dir.clone(),
        source: e,
    })?;
    write_container(&mut staged, &container, &dp.entry_name(), &original)?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| CompactError::Write {
            path: container.clone(),
            source: e,
        })?;
    verify_container(&staged, &container, &original)?;

    let persisted = staged.persist(&container).map_err(|e| CompactError::Rename {
        container: container.clone(),
        source: e.error,
    })?;
    let compressed_bytes = persisted.metadata().map(|m| m.len()).unwrap_or(0);
    drop(persisted);

    std::fs::remove_file(file).map_err(|e| CompactError::RemoveSource {
        path: file.to_path_buf(),
        source: e,
    })?;

    Ok(CompactOutcome::Archived(ArchiveFile {
        container,
        original_bytes: original.len() as u64,
        compressed_bytes,
    }))
}

fn write_container(
    staged: &mut NamedTempFile,
    container: &Path,
    entry_name: &str,
    payload: &[u8],
) -> Result<(), CompactError> {
    let zip_err = |source| CompactError::Container {
        container: container.to_path_buf(),
        source,
    };
    let mut writer = ZipWriter::new(staged.as_file_mut());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(entry_name, options).map_err(zip_err)?;
    writer.write_all(payload).map_err(|e| CompactError::Write {
        path: container.to_path_buf(),
        source: e,
    })?;
    writer.finish().map_err(zip_err)?;
    Ok(())
}

/// Read the staged container back through an independent handle and make
/// sure its single entry decompresses to exactly the source bytes.
fn verify_container(
    staged: &NamedTempFile,
    container: &Path,
    expected: &[u8],
) -> Result<(), CompactError> {
    let zip_err = |source| CompactError::Container {
        container: container.to_path_buf(),
        source,
    };
    let reopened = staged
        .reopen()
        .map_err(|e| zip_err(zip::result::ZipError::Io(e)))?;
    let mut archive = ZipArchive::new(reopened).map_err(zip_err)?;
    if archive.len() != 1 {
        return Err(CompactError::Verify {
            container: container.to_path_buf(),
        });
    }
    let mut entry = archive.by_index(0).map_err(zip_err)?;
    let mut decompressed = Vec::with_capacity(expected.len());
    entry
        .read_to_end(&mut decompressed)
        .map_err(|e| zip_err(zip::result::ZipError::Io(e)))?;
    if decompressed != expected {
        return Err(CompactError::Verify {
            container: container.to_path_buf(),
        });
    }
    Ok(())
}
