//! Symlink and containment checks.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::GuardError;

/// `rel` must be non-empty, relative, and free of `..` and root components.
pub fn check_relative(rel: &Path) -> Result<(), GuardError> {
    if rel.as_os_str().is_empty() {
        return Err(GuardError::NotRelative(rel.to_path_buf()));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(GuardError::NotRelative(rel.to_path_buf()));
            }
        }
    }
    Ok(())
}

/// Fails if `path` itself is a symlink. A missing path passes.
pub fn reject_symlink(path: &Path) -> Result<(), GuardError> {
    match path.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => Err(GuardError::Symlink(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(unresolvable(path, &e)),
    }
}

/// `path` must exist and be a directory, not a symlink to one.
pub fn ensure_real_dir(path: &Path) -> Result<(), GuardError> {
    let meta = path.symlink_metadata().map_err(|e| unresolvable(path, &e))?;
    if meta.file_type().is_symlink() {
        return Err(GuardError::Symlink(path.to_path_buf()));
    }
    if !meta.is_dir() {
        return Err(GuardError::NotDirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Resolve `root/rel` the way the kernel would when creating it: existing
/// parent symlinks are followed, the final component is not. The result must
/// equal or nest under the canonical root.
pub fn resolve_under(root: &Path, rel: &Path) -> Result<PathBuf, GuardError> {
    check_relative(rel)?;
    let root = root.canonicalize().map_err(|e| unresolvable(root, &e))?;
    let joined = root.join(rel);

    let resolved = match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(leaf)) => resolve_existing_prefix(parent)?.join(leaf),
        _ => joined.clone(),
    };

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(GuardError::Escape { path: resolved, root })
    }
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// components that do not exist yet.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, GuardError> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match current.canonicalize() {
            Ok(real) => {
                let mut out = real;
                for part in missing.iter().rev() {
                    out.push(part);
                }
                return Ok(out);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (current.parent(), current.file_name()) else {
                    return Err(unresolvable(path, &e));
                };
                missing.push(name.to_os_string());
                current = parent;
            }
            Err(e) => return Err(unresolvable(path, &e)),
        }
    }
}

fn unresolvable(path: &Path, e: &io::Error) -> GuardError {
    GuardError::Unresolvable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
