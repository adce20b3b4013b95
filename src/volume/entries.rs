//! Paths provisioned on the data volume.

use std::path::{Path, PathBuf};

use crate::error::GuardError;
use crate::security::check_relative;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Whether a home-directory symlink points at the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorMode {
    Link,
    VolumeOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePathEntry {
    /// Relative to the data root.
    pub relative_target: PathBuf,
    /// Relative to the home root. `None` for volume-only entries.
    pub container_link: Option<PathBuf>,
    pub kind: EntryKind,
    /// Owner-only permissions (0600 files, 0700 dirs).
    pub secret: bool,
    pub mirror_mode: MirrorMode,
    /// Fix ownership on the entry itself only, never its contents.
    pub exclude_system_dir: bool,
    /// New or empty files are seeded with `{}`.
    pub seed_json: bool,
    /// A real directory at the link path is removed before linking.
    pub replace: bool,
}

impl VolumePathEntry {
    pub fn dir(target: impl Into<PathBuf>) -> Self {
        Self::new(target.into(), EntryKind::Dir)
    }

    pub fn file(target: impl Into<PathBuf>) -> Self {
        Self::new(target.into(), EntryKind::File)
    }

    fn new(relative_target: PathBuf, kind: EntryKind) -> Self {
        Self {
            relative_target,
            container_link: None,
            kind,
            secret: false,
            mirror_mode: MirrorMode::VolumeOnly,
            exclude_system_dir: false,
            seed_json: false,
            replace: false,
        }
    }

    pub fn linked(mut self, link: impl Into<PathBuf>) -> Self {
        self.container_link = Some(link.into());
        self.mirror_mode = MirrorMode::Link;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn seed_json(mut self) -> Self {
        self.seed_json = true;
        self
    }

    pub fn exclude_system_dir(mut self) -> Self {
        self.exclude_system_dir = true;
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Both paths relative, no traversal, and a link exactly when mirrored.
    pub fn validate(&self) -> Result<(), GuardError> {
        check_relative(&self.relative_target)?;
        match (&self.container_link, self.mirror_mode) {
            (Some(link), MirrorMode::Link) => check_relative(link),
            (None, MirrorMode::VolumeOnly) => Ok(()),
            (Some(link), MirrorMode::VolumeOnly) => Err(GuardError::NotRelative(link.clone())),
            (None, MirrorMode::Link) => Err(GuardError::NotRelative(PathBuf::new())),
        }
    }

    pub fn link(&self) -> Option<&Path> {
        match self.mirror_mode {
            MirrorMode::Link => self.container_link.as_deref(),
            MirrorMode::VolumeOnly => None,
        }
    }
}

/// Layout every data volume carries, before any manifest entries.
pub fn builtin_entries() -> Vec<VolumePathEntry> {
    vec![
        VolumePathEntry::dir("claude").linked(".claude"),
        VolumePathEntry::file("claude.json").linked(".claude.json").seed_json(),
        VolumePathEntry::dir("codex").linked(".codex"),
        VolumePathEntry::dir("gh").linked(".config/gh").secret(),
        VolumePathEntry::file("git/gitconfig").linked(".gitconfig"),
        VolumePathEntry::dir("ssh").linked(".ssh").secret(),
        VolumePathEntry::file("history/bash_history").linked(".bash_history"),
        VolumePathEntry::dir("env").secret(),
        VolumePathEntry::dir("manifests"),
        VolumePathEntry::dir("generated"),
        VolumePathEntry::dir("cache").exclude_system_dir(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid_and_unique() {
        let entries = builtin_entries();
        for entry in &entries {
            entry.validate().unwrap();
        }
        let mut targets: Vec<_> = entries.iter().map(|e| e.relative_target.clone()).collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), entries.len());
    }

    #[test]
    fn secret_and_volume_only_builtins() {
        let entries = builtin_entries();
        let find = |t: &str| entries.iter().find(|e| e.relative_target == Path::new(t)).unwrap();
        assert!(find("ssh").secret);
        assert_eq!(find("ssh").link(), Some(Path::new(".ssh")));
        assert!(find("env").secret);
        assert_eq!(find("env").link(), None);
        assert!(find("claude.json").seed_json);
        assert!(find("cache").exclude_system_dir);
    }

    #[test]
    fn traversal_is_invalid() {
        assert!(VolumePathEntry::dir("../up").validate().is_err());
        assert!(VolumePathEntry::dir("ok").linked("../../etc").validate().is_err());
        assert!(VolumePathEntry::dir("ok").linked("/abs").validate().is_err());
    }
}
