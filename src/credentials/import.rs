//! Merge host and file sources and persist the result.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::parse::{SkipReason, SkippedEnv, parse_env_file};
use crate::error::Result;
use crate::security::{Owner, reject_symlink, resolve_under, write_atomic};

const ENV_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSource {
    Host,
    File,
}

impl fmt::Display for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvSource::Host => "host",
            EnvSource::File => "file",
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ImportedValue {
    pub value: String,
    pub source: EnvSource,
}

impl fmt::Debug for ImportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedValue")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct EnvImportResult {
    pub merged: BTreeMap<String, ImportedValue>,
    pub skipped: Vec<SkippedEnv>,
    /// Allow-listed keys found in neither source.
    pub missing: Vec<String>,
    /// Set once the env file has been replaced.
    pub written: Option<PathBuf>,
}

impl EnvImportResult {
    /// `KEY (source)` per merged key, for dry runs.
    pub fn summary_lines(&self) -> Vec<String> {
        self.merged
            .iter()
            .map(|(key, imported)| format!("{} ({})", key, imported.source))
            .collect()
    }

    fn render(&self) -> String {
        self.merged
            .iter()
            .map(|(key, imported)| format!("{}={}\n", key, imported.value))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub allowlist: &'a [String],
    pub from_host: bool,
    /// Relative to `workspace_root`.
    pub env_file: Option<&'a Path>,
    pub workspace_root: &'a Path,
    /// Persisted env file, normally `<data root>/env/agent.env`.
    pub destination: &'a Path,
    pub owner: Option<Owner>,
    pub dry_run: bool,
}

/// Run the whole pipeline: read, parse, merge, and (unless dry-run) write.
pub fn import_env<F>(request: &ImportRequest<'_>, host_env: F) -> Result<EnvImportResult>
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    let mut result = EnvImportResult::default();
    if request.allowlist.is_empty() {
        debug!("env allowlist is empty; nothing to import");
        return Ok(result);
    }

    if let Some(rel) = request.env_file {
        let content = read_workspace_file(request.workspace_root, rel)?;
        if let Some(content) = content {
            let parsed = parse_env_file(&content, request.allowlist);
            result.skipped.extend(parsed.skipped);
            for (key, value) in parsed.entries {
                result.merged.insert(
                    key,
                    ImportedValue {
                        value,
                        source: EnvSource::File,
                    },
                );
            }
        }
    }

    if request.from_host {
        for key in request.allowlist {
            let Ok(value) = host_env(key) else {
                continue;
            };
            if value.contains('\n') || value.contains('\r') {
                warn!("host value for '{}' spans multiple lines; not importing it", key);
                result.skipped.push(SkippedEnv {
                    key: key.clone(),
                    line_number: 0,
                    reason: SkipReason::MultilineValue,
                });
                continue;
            }
            result.merged.insert(
                key.clone(),
                ImportedValue {
                    value,
                    source: EnvSource::Host,
                },
            );
        }
    }

    for key in request.allowlist {
        if !result.merged.contains_key(key) && !result.skipped.iter().any(|s| &s.key == key) {
            warn!("allow-listed key '{}' not found in any source", key);
            result.missing.push(key.clone());
        }
    }

    if request.dry_run {
        return Ok(result);
    }

    write_atomic(
        request.destination,
        result.render().as_bytes(),
        ENV_FILE_MODE,
        request.owner,
    )?;
    info!(
        "wrote {} key(s) to {}",
        result.merged.len(),
        request.destination.display()
    );
    result.written = Some(request.destination.to_path_buf());
    Ok(result)
}

/// `Ok(None)` when the file does not exist.
fn read_workspace_file(workspace_root: &Path, rel: &Path) -> Result<Option<String>> {
    let path = resolve_under(workspace_root, rel)?;
    reject_symlink(&path)?;

    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(&path);
    let mut file = match file {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("env file {} not found; using host values only", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentboxError;
    use std::collections::HashMap;
    use std::fs;
    use std::os::unix::fs::{MetadataExt, PermissionsExt, symlink};

    struct Fixture {
        _tmp: tempfile::TempDir,
        workspace: PathBuf,
        dest: PathBuf,
    }

    fn fixture(env_file: &str) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = tmp.path().join("ws");
        let env_dir = tmp.path().join("data/env");
        fs::create_dir_all(&workspace).unwrap();
        fs::create_dir_all(&env_dir).unwrap();
        fs::write(workspace.join(".env.agent"), env_file).unwrap();
        Fixture {
            workspace,
            dest: env_dir.join("agent.env"),
            _tmp: tmp,
        }
    }

    fn make_env(map: HashMap<&str, &str>) -> impl Fn(&str) -> std::result::Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    fn request<'a>(fx: &'a Fixture, allow: &'a [String], from_host: bool) -> ImportRequest<'a> {
        ImportRequest {
            allowlist: allow,
            from_host,
            env_file: Some(Path::new(".env.agent")),
            workspace_root: &fx.workspace,
            destination: &fx.dest,
            owner: Some(Owner::current()),
            dry_run: false,
        }
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn host_overrides_file_when_enabled() {
        let fx = fixture("K=from-file\n");
        let allow = keys(&["K"]);
        let result = import_env(&request(&fx, &allow, true), make_env(HashMap::from([("K", "from-host")]))).unwrap();
        assert_eq!(result.merged["K"].source, EnvSource::Host);
        assert_eq!(fs::read_to_string(&fx.dest).unwrap(), "K=from-host\n");
    }

    #[test]
    fn file_only_when_host_disabled() {
        let fx = fixture("K=from-file\n");
        let allow = keys(&["K"]);
        let result = import_env(&request(&fx, &allow, false), make_env(HashMap::from([("K", "from-host")]))).unwrap();
        assert_eq!(result.merged["K"].source, EnvSource::File);
        assert_eq!(fs::read_to_string(&fx.dest).unwrap(), "K=from-file\n");
    }

    #[test]
    fn multiline_values_never_written() {
        let fx = fixture("A=\"line1\nline2\"\nB=file-b\n");
        let allow = keys(&["A", "B", "C", "D"]);
        let host = make_env(HashMap::from([("C", "bad\nvalue"), ("D", "good")]));
        let result = import_env(&request(&fx, &allow, true), host).unwrap();

        let written = fs::read_to_string(&fx.dest).unwrap();
        assert_eq!(written, "B=file-b\nD=good\n");
        assert!(result.missing.is_empty());
        // A (unclosed quote), the stray `line2"` and C from the host.
        assert_eq!(result.skipped.len(), 3);
    }

    #[test]
    fn multiline_host_value_falls_back_to_file() {
        let fx = fixture("K=from-file\n");
        let allow = keys(&["K"]);
        import_env(&request(&fx, &allow, true), make_env(HashMap::from([("K", "a\r\nb")]))).unwrap();
        assert_eq!(fs::read_to_string(&fx.dest).unwrap(), "K=from-file\n");
    }

    #[test]
    fn output_is_owner_only() {
        let fx = fixture("K=v\n");
        let allow = keys(&["K"]);
        import_env(&request(&fx, &allow, false), make_env(HashMap::new())).unwrap();
        let meta = fs::metadata(&fx.dest).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(meta.uid(), Owner::current().uid);
    }

    #[test]
    fn dry_run_never_touches_destination() {
        let fx = fixture("K=v\n");
        let allow = keys(&["K", "H"]);
        let mut req = request(&fx, &allow, true);
        req.dry_run = true;
        let result = import_env(&req, make_env(HashMap::from([("H", "secret")]))).unwrap();
        assert!(!fx.dest.exists());
        assert_eq!(result.summary_lines(), vec!["H (host)", "K (file)"]);
        assert!(!format!("{result:?}").contains("secret"));

        fs::write(&fx.dest, "OLD=1\n").unwrap();
        import_env(&req, make_env(HashMap::new())).unwrap();
        assert_eq!(fs::read_to_string(&fx.dest).unwrap(), "OLD=1\n");
    }

    #[test]
    fn missing_keys_are_reported() {
        let fx = fixture("");
        let allow = keys(&["NOPE"]);
        let result = import_env(&request(&fx, &allow, true), make_env(HashMap::new())).unwrap();
        assert_eq!(result.missing, vec!["NOPE"]);
        assert_eq!(fs::read_to_string(&fx.dest).unwrap(), "");
    }

    #[test]
    fn empty_allowlist_is_a_no_op() {
        let fx = fixture("K=v\n");
        let req = request(&fx, &[], true);
        let result = import_env(&req, make_env(HashMap::from([("K", "x")]))).unwrap();
        assert!(result.merged.is_empty());
        assert!(!fx.dest.exists());
    }

    #[test]
    fn env_file_guards() {
        let fx = fixture("K=v\n");
        let allow = keys(&["K"]);

        let mut req = request(&fx, &allow, false);
        req.env_file = Some(Path::new("../outside.env"));
        assert!(matches!(import_env(&req, make_env(HashMap::new())), Err(AgentboxError::SecurityGuard(_))));

        symlink(fx.workspace.join(".env.agent"), fx.workspace.join("linked.env")).unwrap();
        req.env_file = Some(Path::new("linked.env"));
        assert!(matches!(import_env(&req, make_env(HashMap::new())), Err(AgentboxError::SecurityGuard(_))));
        assert!(!fx.dest.exists());
    }

    #[test]
    fn symlinked_destination_dir_aborts_without_write() {
        let fx = fixture("K=v\n");
        let allow = keys(&["K"]);
        let env_dir = fx.dest.parent().unwrap().to_path_buf();
        let real = env_dir.with_file_name("real-env");
        fs::rename(&env_dir, &real).unwrap();
        symlink(&real, &env_dir).unwrap();

        let err = import_env(&request(&fx, &allow, false), make_env(HashMap::new())).unwrap_err();
        assert!(matches!(err, AgentboxError::SecurityGuard(_)), "{err:?}");
        assert_eq!(fs::read_dir(&real).unwrap().count(), 0);
    }
}
