//! User manifests under `<data root>/manifests/*.toml`.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::paths::ContainerRoots;
use crate::security::{check_relative, resolve_under};
use crate::volume::{EntryKind, VolumePathEntry};

#[derive(Debug, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    link: Vec<RawLink>,
    agent: Option<AgentWrapper>,
}

/// Fields are optional so a missing one rejects only its own entry.
#[derive(Debug, Default, Deserialize)]
struct RawLink {
    target: Option<String>,
    container_link: Option<String>,
    flags: Option<String>,
}

/// `[agent]` section: shell functions wrapping an executable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentWrapper {
    pub name: String,
    pub binary: String,
    #[serde(default)]
    pub default_args: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFlags {
    pub kind: EntryKind,
    pub secret: bool,
    pub seed_json: bool,
    pub replace: bool,
    pub volume_only: bool,
}

impl EntryFlags {
    /// Comma-separated tokens; exactly one of `file`/`dir` is required.
    pub fn parse(flags: &str) -> std::result::Result<Self, String> {
        let mut kind = None;
        let mut parsed = EntryFlags {
            kind: EntryKind::File,
            secret: false,
            seed_json: false,
            replace: false,
            volume_only: false,
        };
        for token in flags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let next = match token {
                "file" => Some(EntryKind::File),
                "dir" => Some(EntryKind::Dir),
                "secret" => {
                    parsed.secret = true;
                    None
                }
                "seed-json" => {
                    parsed.seed_json = true;
                    None
                }
                "replace" => {
                    parsed.replace = true;
                    None
                }
                "volume-only" => {
                    parsed.volume_only = true;
                    None
                }
                other => return Err(format!("unknown flag '{}'", other)),
            };
            if let Some(next) = next {
                if kind.is_some_and(|k| k != next) {
                    return Err("both 'file' and 'dir' given".to_string());
                }
                kind = Some(next);
            }
        }
        parsed.kind = kind.ok_or_else(|| "flags need a type marker ('file' or 'dir')".to_string())?;
        if parsed.seed_json && parsed.kind == EntryKind::Dir {
            return Err("'seed-json' applies to files only".to_string());
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserManifestEntry {
    pub target: PathBuf,
    pub container_link: PathBuf,
    pub flags: EntryFlags,
    /// Manifest the entry came from.
    pub source: PathBuf,
}

impl UserManifestEntry {
    pub fn to_volume_entry(&self) -> VolumePathEntry {
        let base = match self.flags.kind {
            EntryKind::Dir => VolumePathEntry::dir(&self.target),
            EntryKind::File => VolumePathEntry::file(&self.target),
        };
        let mut entry = if self.flags.volume_only {
            base
        } else {
            base.linked(&self.container_link)
        };
        entry.secret = self.flags.secret;
        entry.seed_json = self.flags.seed_json;
        entry.replace = self.flags.replace;
        entry
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSkip {
    pub file: PathBuf,
    /// Index of the `[[link]]` entry; `None` when the whole file was skipped.
    pub entry: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ManifestSet {
    pub entries: Vec<UserManifestEntry>,
    pub agents: Vec<AgentWrapper>,
    pub skipped: Vec<ManifestSkip>,
}

impl ManifestSet {
    pub fn volume_entries(&self) -> Vec<VolumePathEntry> {
        self.entries.iter().map(UserManifestEntry::to_volume_entry).collect()
    }
}

/// Load every manifest in lexicographic order.
pub fn load_manifests(roots: &ContainerRoots) -> Result<ManifestSet> {
    let dir = roots.manifests_dir();
    let mut set = ManifestSet::default();
    if !dir.is_dir() {
        debug!("no manifest directory at {}", dir.display());
        return Ok(set);
    }

    let pattern = format!("{}/*.toml", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| std::io::Error::other(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();

    for file in files {
        load_one(&file, roots, &mut set);
    }
    Ok(set)
}

fn load_one(file: &Path, roots: &ContainerRoots, set: &mut ManifestSet) {
    let parsed = fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str::<ManifestFile>(&content).map_err(|e| e.to_string()));
    let manifest = match parsed {
        Ok(m) => m,
        Err(reason) => {
            warn!("skipping manifest {}: {}", file.display(), reason);
            set.skipped.push(ManifestSkip {
                file: file.to_path_buf(),
                entry: None,
                reason,
            });
            return;
        }
    };

    for (index, raw) in manifest.link.into_iter().enumerate() {
        match validate_link(raw, roots) {
            Ok((target, container_link, flags)) => set.entries.push(UserManifestEntry {
                target,
                container_link,
                flags,
                source: file.to_path_buf(),
            }),
            Err(reason) => {
                warn!("skipping {} link #{}: {}", file.display(), index + 1, reason);
                set.skipped.push(ManifestSkip {
                    file: file.to_path_buf(),
                    entry: Some(index),
                    reason,
                });
            }
        }
    }

    if let Some(agent) = manifest.agent {
        set.agents.push(agent);
    }
}

fn validate_link(raw: RawLink, roots: &ContainerRoots) -> std::result::Result<(PathBuf, PathBuf, EntryFlags), String> {
    let target = raw.target.filter(|t| !t.is_empty()).ok_or("missing 'target'")?;
    let link = raw
        .container_link
        .filter(|l| !l.is_empty())
        .ok_or("missing 'container_link'")?;
    let flags = raw.flags.filter(|f| !f.trim().is_empty()).ok_or("missing 'flags'")?;

    let target = PathBuf::from(target);
    let link = PathBuf::from(link);
    check_relative(&link).map_err(|e| e.to_string())?;
    resolve_under(&roots.data_root, &target).map_err(|e| e.to_string())?;
    resolve_under(&roots.home_root, &link).map_err(|e| e.to_string())?;
    let flags = EntryFlags::parse(&flags)?;

    Ok((target, link, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::MirrorMode;

    fn roots() -> (tempfile::TempDir, ContainerRoots) {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        let home = tmp.path().join("home");
        fs::create_dir_all(data.join("manifests")).unwrap();
        fs::create_dir_all(&home).unwrap();
        (tmp, ContainerRoots::new(data, home))
    }

    #[test]
    fn flag_grammar() {
        let f = EntryFlags::parse("dir, secret,replace").unwrap();
        assert_eq!(f.kind, EntryKind::Dir);
        assert!(f.secret && f.replace && !f.volume_only);

        let f = EntryFlags::parse("file,seed-json,volume-only").unwrap();
        assert!(f.seed_json && f.volume_only);

        assert!(EntryFlags::parse("").is_err());
        assert!(EntryFlags::parse("secret").is_err());
        assert!(EntryFlags::parse("file,dir").is_err());
        assert!(EntryFlags::parse("dir,seed-json").is_err());
        assert!(EntryFlags::parse("dir,bogus").is_err());
    }

    #[test]
    fn entries_validated_independently() {
        let (_tmp, roots) = roots();
        fs::write(
            roots.manifests_dir().join("10-tools.toml"),
            r#"
[[link]]
target = "tools/aider"
container_link = ".aider"
flags = "dir,secret"

[[link]]
target = "../escape"
container_link = ".escape"
flags = "dir"

[[link]]
target = "tools/x"
container_link = "../../etc/x"
flags = "file"

[[link]]
target = "tools/y"
container_link = ".y"

[agent]
name = "aider"
binary = "aider"
default_args = ["--no-auto-commits"]
"#,
        )
        .unwrap();

        let set = load_manifests(&roots).unwrap();
        assert_eq!(set.entries.len(), 1);
        assert_eq!(set.entries[0].container_link, PathBuf::from(".aider"));
        assert_eq!(set.skipped.len(), 3);
        assert!(set.skipped.iter().all(|s| s.entry.is_some()));
        assert_eq!(set.agents[0].name, "aider");
        assert!(!set.agents[0].optional);
    }

    #[test]
    fn invalid_file_skipped_whole_and_order_is_lexicographic() {
        let (_tmp, roots) = roots();
        let dir = roots.manifests_dir();
        fs::write(dir.join("b.toml"), "[[link]]\ntarget = \"b\"\ncontainer_link = \".b\"\nflags = \"dir\"\n").unwrap();
        fs::write(dir.join("a.toml"), "[[link]]\ntarget = \"a\"\ncontainer_link = \".a\"\nflags = \"dir\"\n").unwrap();
        fs::write(dir.join("c.toml"), "[[link]\nbroken").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let set = load_manifests(&roots).unwrap();
        let targets: Vec<_> = set.entries.iter().map(|e| e.target.clone()).collect();
        assert_eq!(targets, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].entry, None);
    }

    #[test]
    fn volume_only_entries_have_no_link() {
        let entry = UserManifestEntry {
            target: PathBuf::from("store"),
            container_link: PathBuf::from(".store"),
            flags: EntryFlags::parse("dir,volume-only").unwrap(),
            source: PathBuf::from("m.toml"),
        };
        let v = entry.to_volume_entry();
        assert_eq!(v.mirror_mode, MirrorMode::VolumeOnly);
        assert_eq!(v.link(), None);
        v.validate().unwrap();
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = ContainerRoots::new(tmp.path().join("none"), tmp.path());
        assert!(load_manifests(&roots).unwrap().entries.is_empty());
    }
}
