//! Shell functions generated from manifest `[agent]` sections.
//!
//! The fragment is sourced by the container's interactive shell. Every name
//! and argument is checked against a strict grammar so nothing in a manifest
//! can inject shell syntax.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::parse::AgentWrapper;
use crate::error::Result;
use crate::security::write_atomic;

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
static ARG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").expect("valid regex"));

/// Keywords and builtins a function must not shadow.
const RESERVED: &[&str] = &[
    "case", "do", "done", "elif", "else", "esac", "fi", "for", "function", "if", "in", "select", "then", "time",
    "until", "while", "alias", "builtin", "cd", "command", "eval", "exec", "exit", "export", "return", "set",
    "shift", "source", "trap", "unalias", "unset",
];

const HEADER: &str = "# Generated by agentbox. Do not edit; changes are overwritten.\n";

#[derive(Debug, Default)]
pub struct WrapperScript {
    pub script: String,
    /// Functions emitted, in order.
    pub functions: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

/// Render wrappers for `agents`. `path_var` is the `PATH` to search.
pub fn render_wrappers(agents: &[AgentWrapper], path_var: &str) -> WrapperScript {
    let mut out = WrapperScript {
        script: HEADER.to_string(),
        ..Default::default()
    };

    for agent in agents {
        if let Err(reason) = validate(agent) {
            warn!("skipping wrapper '{}': {}", agent.name, reason);
            out.skipped.push((agent.name.clone(), reason));
            continue;
        }
        let Some(resolved) = find_executable(&agent.binary, path_var) else {
            if agent.optional {
                debug!("optional agent '{}': '{}' not on PATH", agent.name, agent.binary);
            } else {
                warn!("agent '{}': '{}' not on PATH; skipping wrapper", agent.name, agent.binary);
            }
            out.skipped.push((agent.name.clone(), format!("'{}' not found", agent.binary)));
            continue;
        };
        debug!("agent '{}' -> {}", agent.name, resolved.display());

        let mut call = vec!["command".to_string(), agent.binary.clone()];
        call.extend(agent.default_args.iter().cloned());
        out.script
            .push_str(&format!("{}() {{ {} \"$@\"; }}\n", agent.name, call.join(" ")));
        out.functions.push(agent.name.clone());

        for alias in &agent.aliases {
            out.script.push_str(&format!("{}() {{ {} \"$@\"; }}\n", alias, agent.name));
            out.functions.push(alias.clone());
        }
    }

    out
}

fn validate(agent: &AgentWrapper) -> std::result::Result<(), String> {
    let mut seen: Vec<&str> = Vec::new();
    for ident in std::iter::once(&agent.name).chain(&agent.aliases) {
        if !IDENT_RE.is_match(ident) {
            return Err(format!("invalid identifier '{}'", ident));
        }
        if RESERVED.contains(&ident.as_str()) {
            return Err(format!("'{}' is a shell keyword or builtin", ident));
        }
        if seen.contains(&ident.as_str()) {
            return Err(format!("'{}' is defined twice", ident));
        }
        seen.push(ident);
    }
    for arg in std::iter::once(&agent.binary).chain(&agent.default_args) {
        if !ARG_RE.is_match(arg) {
            return Err(format!("unsafe argument '{}'", arg));
        }
    }
    Ok(())
}

/// Look `binary` up like a shell would. Names containing `/` are used as-is.
pub fn find_executable(binary: &str, path_var: &str) -> Option<PathBuf> {
    if binary.contains('/') {
        let path = PathBuf::from(binary);
        return is_executable(&path).then_some(path);
    }
    std::env::split_paths(path_var)
        .filter(|dir| dir.is_absolute())
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Render and write the fragment atomically.
pub fn write_wrappers(dest: &Path, agents: &[AgentWrapper], path_var: &str) -> Result<WrapperScript> {
    let rendered = render_wrappers(agents, path_var);
    if let Some(dir) = dest.parent() {
        fs::create_dir_all(dir)?;
    }
    write_atomic(dest, rendered.script.as_bytes(), 0o644, None)?;
    info!("wrote {} wrapper function(s) to {}", rendered.functions.len(), dest.display());
    Ok(rendered)
}
