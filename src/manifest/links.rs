//! Home-directory symlinks into the data volume, plus the link-spec JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::paths::ContainerRoots;
use crate::security::{resolve_under, write_atomic};
use crate::volume::VolumePathEntry;

pub const LINK_SPEC_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub link: PathBuf,
    pub target: PathBuf,
    pub remove_first: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSpec {
    pub version: u32,
    pub data_root: PathBuf,
    pub home_root: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSkip {
    pub link: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct LinkReport {
    pub spec: LinkSpec,
    pub spec_path: PathBuf,
    pub skipped: Vec<LinkSkip>,
}

/// Create or refresh the symlink for every mirrored entry, then write the
/// link spec. Entries without a home link are ignored; a failing entry is
/// skipped without affecting the others.
pub fn apply_links(roots: &ContainerRoots, entries: &[VolumePathEntry]) -> Result<LinkReport> {
    let mut links = Vec::new();
    let mut skipped = Vec::new();

    for entry in entries {
        let Some(rel_link) = entry.link() else {
            continue;
        };
        match apply_one(roots, entry, rel_link) {
            Ok(record) => links.push(record),
            Err(reason) => {
                warn!("skipping link {}: {}", rel_link.display(), reason);
                skipped.push(LinkSkip {
                    link: rel_link.to_path_buf(),
                    reason,
                });
            }
        }
    }

    let spec = LinkSpec {
        version: LINK_SPEC_VERSION,
        data_root: roots.data_root.clone(),
        home_root: roots.home_root.clone(),
        generated_at: Utc::now(),
        links,
    };
    let spec_path = roots.link_spec_file();
    write_spec(&spec, &spec_path)?;
    info!("linked {} path(s); spec at {}", spec.links.len(), spec_path.display());

    Ok(LinkReport {
        spec,
        spec_path,
        skipped,
    })
}

fn apply_one(roots: &ContainerRoots, entry: &VolumePathEntry, rel_link: &Path) -> std::result::Result<LinkRecord, String> {
    entry.validate().map_err(|e| e.to_string())?;
    let target = resolve_under(&roots.data_root, &entry.relative_target).map_err(|e| e.to_string())?;
    let link = resolve_under(&roots.home_root, rel_link).map_err(|e| e.to_string())?;

    match link.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(&link).map_err(|e| e.to_string())? == target {
                debug!("{} already points at {}", link.display(), target.display());
                return Ok(record(link, target, entry.replace));
            }
        }
        Ok(meta) if meta.is_dir() => {
            if !entry.replace {
                return Err("a real directory is in the way (set 'replace' to remove it)".to_string());
            }
            fs::remove_dir_all(&link).map_err(|e| e.to_string())?;
            info!("removed directory {} to make room for link", link.display());
        }
        Ok(_) => return Err("a regular file is in the way".to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.to_string()),
    }

    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    replace_symlink(&target, &link).map_err(|e| e.to_string())?;
    Ok(record(link, target, entry.replace))
}

fn record(link: PathBuf, target: PathBuf, remove_first: bool) -> LinkRecord {
    LinkRecord {
        link,
        target,
        remove_first,
    }
}

/// Create the link under a temporary name and rename it into place, so an
/// existing link is swapped rather than removed first.
fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let name = link.file_name().ok_or_else(|| io::Error::other("link has no file name"))?;
    let tmp = link.with_file_name(format!(".{}.agentbox-{}", name.to_string_lossy(), uuid::Uuid::new_v4().simple()));
    symlink(target, &tmp)?;
    if let Err(e) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn write_spec(spec: &LinkSpec, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut json = serde_json::to_vec_pretty(spec).map_err(io::Error::other)?;
    json.push(b'\n');
    write_atomic(path, &json, 0o644, None)
}
