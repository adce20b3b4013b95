//! Deterministic container naming from VCS context.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{AgentboxError, Result};

/// Last-resort name when nothing usable can be derived.
pub const FALLBACK_NAME: &str = "agentbox-sandbox";

const MAX_NAME_BYTES: usize = 63;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("valid regex"));

/// Derive the container name for a workspace.
///
/// Inside a git work tree the name is `<repo-root-basename>-<branch>`, with a
/// detached HEAD rendered as `detached-<short-sha>`. Outside a work tree it is
/// the workspace basename.
pub fn derive_container_name(workspace: &Path) -> String {
    let basename = basename(workspace);
    let raw = match git_context(workspace) {
        Some(ctx) => format!("{}-{}", ctx.repo_name, ctx.branch),
        None => basename.clone(),
    };
    name_from_parts(&raw, &basename)
}

/// Sanitize `raw`, falling back to `sandbox-<basename>` and then the constant.
pub fn name_from_parts(raw: &str, basename: &str) -> String {
    let primary = sanitize(raw);
    if !primary.is_empty() {
        return primary;
    }
    let base = sanitize(basename);
    if !base.is_empty() {
        return sanitize(&format!("sandbox-{}", base));
    }
    FALLBACK_NAME.to_string()
}

/// Lowercase, map non `[a-z0-9]` to `-`, collapse runs, trim, cap at 63 bytes.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    // Output is pure ASCII, so byte truncation is char-safe.
    let capped = &trimmed[..trimmed.len().min(MAX_NAME_BYTES)];
    capped.trim_end_matches('-').to_string()
}

pub fn validate_container_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_BYTES || !NAME_RE.is_match(name) {
        return Err(AgentboxError::validation(
            "container name",
            name,
            "must match ^[a-z0-9]([a-z0-9-]*[a-z0-9])?$ and be at most 63 bytes",
        ));
    }
    Ok(())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

struct GitContext {
    repo_name: String,
    branch: String,
}

fn git_context(workspace: &Path) -> Option<GitContext> {
    let inside = git(workspace, &["rev-parse", "--is-inside-work-tree"])?;
    if inside != "true" {
        return None;
    }
    let top = git(workspace, &["rev-parse", "--show-toplevel"])?;
    let repo_name = basename(Path::new(&top));

    let branch = match git(workspace, &["symbolic-ref", "--quiet", "--short", "HEAD"]) {
        Some(branch) if !branch.is_empty() => branch,
        _ => {
            let short = git(workspace, &["rev-parse", "--short", "HEAD"]).unwrap_or_default();
            format!("detached-{}", short)
        }
    };
    debug!("git context: repo={} branch={}", repo_name, branch);
    Some(GitContext { repo_name, branch })
}

/// Run git, returning trimmed stdout on success. A missing git binary reads as
/// "not a work tree".
fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).current_dir(dir).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(name: &str) {
        assert!(NAME_RE.is_match(name), "invalid name: {name:?}");
        assert!(name.len() <= MAX_NAME_BYTES, "too long: {name:?}");
    }

    #[test]
    fn sanitize_basics() {
        assert_eq!(sanitize("My_Repo-feature/Login"), "my-repo-feature-login");
        assert_eq!(sanitize("--a..b--"), "a-b");
        assert_eq!(sanitize("ÄÖÜ"), "");
        assert_eq!(sanitize("repo-detached-abc1234"), "repo-detached-abc1234");
    }

    #[test]
    fn truncates_and_retrims() {
        let raw = format!("{}-{}", "a".repeat(62), "b");
        let name = sanitize(&raw);
        assert_eq!(name, "a".repeat(62));
        assert_valid(&name);
    }

    #[test]
    fn falls_back_when_empty() {
        assert_eq!(name_from_parts("---", "Proj"), "sandbox-proj");
        assert_eq!(name_from_parts("???", "???"), FALLBACK_NAME);
        assert_eq!(name_from_parts("", ""), FALLBACK_NAME);
    }

    #[test]
    fn deterministic_and_well_formed() {
        let long = "z-".repeat(80);
        for raw in ["x", "UPPER case", "a/b/c", "émoji-🚀-name", long.as_str()] {
            let a = name_from_parts(raw, "base");
            let b = name_from_parts(raw, "base");
            assert_eq!(a, b);
            assert_valid(&a);
        }
    }

    #[test]
    fn non_repo_uses_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("My Project");
        std::fs::create_dir_all(&ws).unwrap();
        let name = derive_container_name(&ws);
        // The temp dir may itself sit inside a work tree on some hosts.
        assert_valid(&name);
    }

    #[test]
    fn repo_uses_root_and_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("Widget");
        std::fs::create_dir_all(&repo).unwrap();
        let run = |args: &[&str]| {
            Command::new("git").args(args).current_dir(&repo).output().map(|o| o.status.success())
        };
        if !matches!(run(&["init", "-q", "-b", "Feature/X"]), Ok(true)) {
            // git unavailable or too old for -b
            return;
        }
        let sub = repo.join("src");
        std::fs::create_dir_all(&sub).unwrap();
        assert_eq!(derive_container_name(&sub), "widget-feature-x");
    }

    #[test]
    fn validate_rejects_bad_names() {
        assert!(validate_container_name("ok-name-1").is_ok());
        assert!(validate_container_name("-bad").is_err());
        assert!(validate_container_name("Bad").is_err());
        assert!(validate_container_name(&"a".repeat(64)).is_err());
    }
}
