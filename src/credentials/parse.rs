//! Line-oriented `KEY=VALUE` parsing.

use std::collections::BTreeMap;
use tracing::warn;

use super::is_valid_env_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingEquals,
    InvalidKey,
    MultilineValue,
    NotAllowlisted,
}

/// Key recorded for a line with no `=`; the line itself is never kept.
pub const NO_KEY: &str = "<no key>";

/// A rejected line. Carries the key token, never the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEnv {
    pub key: String,
    /// 1-based line in the env file; 0 for host-sourced values.
    pub line_number: usize,
    pub reason: SkipReason,
}

#[derive(Default)]
pub struct ParsedEnvFile {
    pub entries: BTreeMap<String, String>,
    pub skipped: Vec<SkippedEnv>,
}

impl std::fmt::Debug for ParsedEnvFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedEnvFile")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// Parse an env file, keeping only allow-listed keys.
///
/// Every line stands alone. A value opening with a quote that does not
/// close on the same line is skipped as a multi-line value; the lines after
/// it are parsed as usual.
pub fn parse_env_file(content: &str, allowlist: &[String]) -> ParsedEnvFile {
    let mut parsed = ParsedEnvFile::default();

    for (idx, raw) in content.split('\n').enumerate() {
        let line_number = idx + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);

        let Some((key, value)) = trimmed.split_once('=') else {
            skip(&mut parsed, NO_KEY, line_number, SkipReason::MissingEquals);
            continue;
        };
        let key = key.trim();

        if !is_valid_env_key(key) {
            skip(&mut parsed, key, line_number, SkipReason::InvalidKey);
            continue;
        }

        if opens_unterminated_quote(value) || value.contains('\r') {
            skip(&mut parsed, key, line_number, SkipReason::MultilineValue);
            continue;
        }

        if !allowlist.iter().any(|k| k == key) {
            skip(&mut parsed, key, line_number, SkipReason::NotAllowlisted);
            continue;
        }

        parsed.entries.insert(key.to_string(), value.to_string());
    }

    parsed
}

fn opens_unterminated_quote(value: &str) -> bool {
    match value.chars().next() {
        Some(quote @ ('"' | '\'')) => !value[1..].trim_end().ends_with(quote),
        _ => false,
    }
}

fn skip(parsed: &mut ParsedEnvFile, key: &str, line_number: usize, reason: SkipReason) {
    match reason {
        SkipReason::NotAllowlisted => {}
        SkipReason::MissingEquals => warn!("env file line {}: no '=' ({:?})", line_number, reason),
        _ => warn!("env file line {}: skipping '{}' ({:?})", line_number, key, reason),
    }
    parsed.skipped.push(SkippedEnv {
        key: key.to_string(),
        line_number,
        reason,
    });
}
