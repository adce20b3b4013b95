//! Create the data-volume layout, fix permissions and ownership.

use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt, lchown};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::entries::{EntryKind, VolumePathEntry};
use crate::error::Result;
use crate::security::{Owner, ensure_real_dir, reject_symlink, resolve_under};

const SECRET_FILE_MODE: u32 = 0o600;
const SECRET_DIR_MODE: u32 = 0o700;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub target: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LayoutReport {
    pub created: Vec<PathBuf>,
    pub seeded: Vec<PathBuf>,
    pub skipped: Vec<SkippedEntry>,
    /// Entries that passed every guard.
    pub ready: Vec<PathBuf>,
}

/// Provision `entries` under `data_root`.
///
/// A bad entry is skipped and reported; the batch continues. Only a data
/// root that is missing or not a real directory aborts.
pub fn ensure_layout(data_root: &Path, entries: &[VolumePathEntry], owner: Option<Owner>) -> Result<LayoutReport> {
    ensure_real_dir(data_root)?;
    let mut report = LayoutReport::default();
    let mut ready: Vec<(&VolumePathEntry, PathBuf)> = Vec::new();

    for entry in entries {
        match provision(data_root, entry, &mut report) {
            Ok(path) => ready.push((entry, path)),
            Err(reason) => {
                warn!("skipping {}: {}", entry.relative_target.display(), reason);
                report.skipped.push(SkippedEntry {
                    target: entry.relative_target.clone(),
                    reason,
                });
            }
        }
    }

    for (entry, path) in &ready {
        if let Err(e) = finalize(entry, path, owner) {
            warn!("permission fix failed for {}: {}", path.display(), e);
            report.skipped.push(SkippedEntry {
                target: entry.relative_target.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        report.ready.push(path.clone());
    }

    debug!(
        "layout: {} created, {} seeded, {} skipped",
        report.created.len(),
        report.seeded.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn provision(data_root: &Path, entry: &VolumePathEntry, report: &mut LayoutReport) -> std::result::Result<PathBuf, String> {
    entry.validate().map_err(|e| e.to_string())?;
    let path = resolve_under(data_root, &entry.relative_target).map_err(|e| e.to_string())?;
    reject_symlink(&path).map_err(|e| e.to_string())?;

    match entry.kind {
        EntryKind::Dir => {
            if path.symlink_metadata().is_err() {
                fs::create_dir_all(&path).map_err(|e| e.to_string())?;
                info!("created {}", path.display());
                report.created.push(path.clone());
            } else if !path.is_dir() {
                return Err("exists and is not a directory".to_string());
            }
        }
        EntryKind::File => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            // Parents may have changed while they were being created.
            let path = resolve_under(data_root, &entry.relative_target).map_err(|e| e.to_string())?;
            match path.symlink_metadata() {
                Ok(meta) if meta.file_type().is_symlink() => return Err("is a symlink".to_string()),
                Ok(meta) if !meta.is_file() => return Err("exists and is not a regular file".to_string()),
                Ok(meta) if meta.len() > 0 || !entry.seed_json => {}
                Ok(_) => {
                    if seed_file(&path, entry.seed_json, FileState::Empty).map_err(|e| e.to_string())? {
                        report.seeded.push(path.clone());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if seed_file(&path, entry.seed_json, FileState::Absent).map_err(|e| e.to_string())? {
                        info!("created {}", path.display());
                        report.created.push(path.clone());
                    }
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    Absent,
    Empty,
}

/// Create or fill a file that was `state` when last checked. Never truncates
/// and never follows a symlink at the leaf. Returns false when the file
/// turned out to exist or gained content in the meantime.
fn seed_file(path: &Path, seed_json: bool, state: FileState) -> io::Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true).custom_flags(libc::O_NOFOLLOW);
    if state == FileState::Absent {
        options.create_new(true);
    }
    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!("{} appeared concurrently; leaving it", path.display());
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    let meta = file.metadata()?;
    if !meta.is_file() || meta.len() > 0 {
        debug!("{} changed concurrently; leaving it", path.display());
        return Ok(false);
    }
    if seed_json {
        file.write_all(b"{}")?;
    }
    Ok(true)
}

fn finalize(entry: &VolumePathEntry, path: &Path, owner: Option<Owner>) -> io::Result<()> {
    let meta = path.symlink_metadata()?;
    if meta.file_type().is_symlink() {
        return Err(io::Error::other("became a symlink"));
    }

    if entry.secret {
        let mode = if meta.is_dir() { SECRET_DIR_MODE } else { SECRET_FILE_MODE };
        fs::set_permissions(path, Permissions::from_mode(mode))?;
    }

    if let Some(owner) = owner {
        if entry.kind == EntryKind::Dir && !entry.exclude_system_dir {
            chown_tree(path, owner)?;
        } else {
            lchown(path, Some(owner.uid), Some(owner.gid))?;
        }
    }
    Ok(())
}

/// `lchown` every node under `path`, never descending through a symlink.
fn chown_tree(path: &Path, owner: Owner) -> io::Result<()> {
    lchown(path, Some(owner.uid), Some(owner.gid))?;
    let meta = path.symlink_metadata()?;
    if !meta.is_dir() {
        return Ok(());
    }
    for child in fs::read_dir(path)? {
        let child = child?;
        if child.file_type()?.is_dir() {
            chown_tree(&child.path(), owner)?;
        } else {
            lchown(child.path(), Some(owner.uid), Some(owner.gid))?;
        }
    }
    Ok(())
}
