use crate::error::ScanError;
use std::fs::{FileType, Metadata};
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    NamedPipe,
    Other,
}

impl EntryKind {
    pub fn classify(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_fifo() {
            EntryKind::NamedPipe
        } else if file_type.is_file() {
            EntryKind::Regular
        } else {
            EntryKind::Other
        }
    }
}

/// Permission lookups accept either a path (one extra stat) or metadata the
/// caller already holds.
pub enum PermCheck<'a> {
    ByPath(&'a Path),
    ByMeta(&'a Metadata),
}

const OWNER_EXEC: u32 = 0o100;

pub fn is_owner_executable(check: PermCheck<'_>) -> Result<bool, ScanError> {
    let mode = match check {
        PermCheck::ByPath(path) => std::fs::symlink_metadata(path)
            .map_err(|e| ScanError::Stat {
                path: path.to_path_buf(),
                source: e,
            })?
            .permissions()
            .mode(),
        PermCheck::ByMeta(meta) => meta.permissions().mode(),
    };
    Ok(mode & OWNER_EXEC != 0)
}

/// Walks `root` eagerly and returns every regular file with the owner-execute
/// bit set. Symlinks are not followed; directories, links and special files
/// are skipped; a regular file without the bit is skipped silently. The first
/// stat failure aborts the whole walk.
///
/// File names are sorted within each directory so the traversal order is
/// deterministic.
pub fn walk(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let cancel = AtomicBool::new(false);
    walk_until(root, &cancel)
}

/// Same as [`walk`] with a cooperative cancellation flag, checked once per
/// entry. Directory trees come from images and users, so a caller must be
/// able to stop an unbounded walk.
pub fn walk_until(root: &Path, cancel: &AtomicBool) -> Result<Vec<PathBuf>, ScanError> {
    let mut executables = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        if cancel.load(Ordering::Relaxed) {
            return Err(ScanError::Cancelled);
        }

        let entry = entry?;
        if EntryKind::classify(entry.file_type()) != EntryKind::Regular {
            continue;
        }

        let meta = entry.metadata()?;
        if is_owner_executable(PermCheck::ByMeta(&meta))? {
            executables.push(entry.into_path());
        }
    }

    tracing::debug!(
        root = %root.display(),
        count = executables.len(),
        "scanned tree for executables"
    );
    Ok(executables)
}
