//! Temp-file-then-rename writes with a last-moment guard.

use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::{PermissionsExt, fchown};
use std::path::Path;
use tempfile::NamedTempFile;

use super::Owner;
use super::path_guard::{ensure_real_dir, reject_symlink};
use crate::error::{GuardError, Result};

/// Write `content` to `dest` atomically with `mode` and, when given, `owner`.
///
/// The destination directory must be a real directory both before the temp
/// file is created and again right before the rename; the temp file itself
/// is re-checked too. On any failure the temp file is dropped and `dest` is
/// left untouched.
pub fn write_atomic(dest: &Path, content: &[u8], mode: u32, owner: Option<Owner>) -> Result<()> {
    let dir = dest.parent().ok_or_else(|| GuardError::NotDirectory {
        path: dest.to_path_buf(),
    })?;
    ensure_real_dir(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().set_permissions(Permissions::from_mode(mode))?;
    if let Some(owner) = owner {
        fchown(tmp.as_file(), Some(owner.uid), Some(owner.gid))?;
    }
    tmp.as_file().sync_all()?;

    ensure_real_dir(dir)?;
    reject_symlink(tmp.path())?;

    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
